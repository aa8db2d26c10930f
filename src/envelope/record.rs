/// Exported envelope record.
///
/// A flat, inert structure of three lowercase hex strings:
/// - `k`: password-wrapped private key
/// - `p`: SPKI DER public key
/// - `s`: 16-byte salt
///
/// No password or algorithm metadata is carried.
use serde::{Deserialize, Serialize};

use crate::codec;
use crate::crypto::kdf::{Salt, SALT_LEN};
use crate::crypto::keys::PublicKey;
use crate::error::{EnvelopeError, RecordField, Result};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EnvelopeRecord {
    pub k: String,
    pub p: String,
    pub s: String,
}

/// Raw bytes of a record after hex decoding.
pub struct DecodedRecord {
    pub wrapped_key: Vec<u8>,
    pub spki: Vec<u8>,
    pub salt: Salt,
}

/// Password-free description of a record.
#[derive(Debug, Clone, Serialize)]
pub struct RecordSummary {
    /// SHA-256 of the SPKI public key, hex.
    pub fingerprint: String,
    pub modulus_bits: usize,
    pub salt: String,
    pub wrapped_key_len: usize,
}

impl EnvelopeRecord {
    pub fn encode(wrapped_key: &[u8], spki: &[u8], salt: &Salt) -> Self {
        Self {
            k: codec::encode(wrapped_key),
            p: codec::encode(spki),
            s: codec::encode(salt.as_bytes()),
        }
    }

    /// Hex-decode all three fields. Any failure is a
    /// [`EnvelopeError::Decode`] naming the offending field.
    pub fn decode(&self) -> Result<DecodedRecord> {
        let wrapped_key = codec::decode(RecordField::K, &self.k)?;
        let spki = codec::decode(RecordField::P, &self.p)?;
        let salt_bytes = codec::decode(RecordField::S, &self.s)?;

        let salt = Salt::from_slice(&salt_bytes).ok_or_else(|| EnvelopeError::Decode {
            field: RecordField::S,
            reason: format!("expected {SALT_LEN} bytes, got {}", salt_bytes.len()),
        })?;

        Ok(DecodedRecord {
            wrapped_key,
            spki,
            salt,
        })
    }

    /// Summarise the record without a password.
    pub fn inspect(&self, modulus_bits: usize) -> Result<RecordSummary> {
        let decoded = self.decode()?;
        let public_key = PublicKey::from_spki_der(&decoded.spki, modulus_bits)?;

        Ok(RecordSummary {
            fingerprint: codec::encode(public_key.fingerprint()?),
            modulus_bits: public_key.modulus_bits(),
            salt: codec::encode(decoded.salt.as_bytes()),
            wrapped_key_len: decoded.wrapped_key.len(),
        })
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| EnvelopeError::Serialization(e.to_string()))
    }

    pub fn from_json(data: &str) -> Result<Self> {
        serde_json::from_str(data).map_err(|e| EnvelopeError::Serialization(e.to_string()))
    }
}
