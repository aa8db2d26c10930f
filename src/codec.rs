/// Hex encoding of envelope record fields.
///
/// Output is always lowercase without separators. Decoding failures name the
/// record field they came from.
use crate::error::{EnvelopeError, RecordField, Result};

pub fn encode(bytes: impl AsRef<[u8]>) -> String {
    hex::encode(bytes)
}

pub fn decode(field: RecordField, value: &str) -> Result<Vec<u8>> {
    hex::decode(value).map_err(|e| EnvelopeError::Decode {
        field,
        reason: e.to_string(),
    })
}
