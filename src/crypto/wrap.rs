/// Password-based wrapping of envelope private keys.
///
/// Wrapped key format:
/// [version(1B) | nonce(24B) | sealed_pkcs8(+16B tag)]
///
/// The sealing key is Argon2id(password, salt). The private key is sealed as
/// PKCS#8 DER with XChaCha20-Poly1305, so a wrong password or any corruption
/// of the blob or salt fails authentication instead of yielding a key.
use tracing::warn;

use crate::crypto::aead::{self, NONCE_LEN, TAG_LEN};
use crate::crypto::kdf::{self, KdfParams, Salt};
use crate::crypto::keys::{KeyUsages, PrivateKey};
use crate::crypto::sensitive::SensitiveVec;
use crate::error::{EnvelopeError, Result};
use crate::password::Password;

pub const WRAP_VERSION: u8 = 0x01;
pub const HEADER_LEN: usize = 1 + NONCE_LEN;

/// Domain separator bound into every sealed key.
const KEY_WRAP_AAD: &[u8] = b"keyenvelope-wrap-v1";

/// Wraps and unwraps private keys under a password and salt.
pub trait KeyWrapper: Send + Sync {
    fn wrap(&self, password: &Password, key: &PrivateKey, salt: &Salt) -> Result<Vec<u8>>;

    /// Recover a private key. Must fail rather than return unchecked key
    /// material.
    fn unwrap(&self, password: &Password, wrapped: &[u8], salt: &Salt) -> Result<PrivateKey>;
}

/// Parsed wrapped-key blob.
struct WrappedKey {
    nonce: [u8; NONCE_LEN],
    sealed: Vec<u8>,
}

impl WrappedKey {
    fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(HEADER_LEN + self.sealed.len());
        out.push(WRAP_VERSION);
        out.extend_from_slice(&self.nonce);
        out.extend_from_slice(&self.sealed);
        out
    }

    fn from_bytes(data: &[u8]) -> Result<Self> {
        if data.len() < HEADER_LEN + TAG_LEN {
            return Err(EnvelopeError::Unwrap(format!(
                "wrapped key too short: {} bytes (minimum {})",
                data.len(),
                HEADER_LEN + TAG_LEN
            )));
        }

        let version = data[0];
        if version != WRAP_VERSION {
            return Err(EnvelopeError::Unwrap(format!(
                "unsupported wrapped key version: {version}"
            )));
        }

        let mut nonce = [0u8; NONCE_LEN];
        nonce.copy_from_slice(&data[1..HEADER_LEN]);

        Ok(Self {
            nonce,
            sealed: data[HEADER_LEN..].to_vec(),
        })
    }
}

/// Argon2id + XChaCha20-Poly1305 key wrapper.
#[derive(Debug, Clone, Default)]
pub struct PassphraseKeyWrapper {
    params: KdfParams,
}

impl PassphraseKeyWrapper {
    pub fn new(params: KdfParams) -> Self {
        Self { params }
    }
}

impl KeyWrapper for PassphraseKeyWrapper {
    fn wrap(&self, password: &Password, key: &PrivateKey, salt: &Salt) -> Result<Vec<u8>> {
        let sealing_key = kdf::derive_key(password.as_bytes(), salt, &self.params)?;
        let pkcs8 = key.to_pkcs8_der()?;

        let (nonce, sealed) = aead::encrypt(&sealing_key, pkcs8.as_bytes(), KEY_WRAP_AAD)?;

        Ok(WrappedKey { nonce, sealed }.to_bytes())
    }

    fn unwrap(&self, password: &Password, wrapped: &[u8], salt: &Salt) -> Result<PrivateKey> {
        let blob = WrappedKey::from_bytes(wrapped)?;
        let sealing_key = kdf::derive_key(password.as_bytes(), salt, &self.params)?;

        let pkcs8 = aead::decrypt(&sealing_key, &blob.nonce, &blob.sealed, KEY_WRAP_AAD)
            .map(SensitiveVec::new)
            .map_err(|_| {
                warn!("Wrapped key failed authentication");
                EnvelopeError::Unwrap(
                    "authentication failed (wrong password or corrupted record)".to_string(),
                )
            })?;

        PrivateKey::from_pkcs8_der(pkcs8.as_bytes(), KeyUsages::UNWRAPPED_PRIVATE)
    }
}
