/// Argon2id password-based key derivation and envelope salts.
///
/// A 32-byte wrapping key is derived from the password and the envelope's
/// 16-byte salt. The salt is only ever used as KDF input.
use std::fmt;

use argon2::{Algorithm, Argon2, Params, Version};
use rand::RngCore;
use zeroize::Zeroizing;

use crate::crypto::sensitive::SensitiveBytes32;
use crate::error::{EnvelopeError, Result};

pub const SALT_LEN: usize = 16;
pub const DERIVED_KEY_LEN: usize = 32;

// Argon2id defaults: m=65536 (64 MiB), t=3, p=4
const ARGON2_MEMORY_KIB: u32 = 65_536;
const ARGON2_TIME_COST: u32 = 3;
const ARGON2_PARALLELISM: u32 = 4;

/// Random salt bound to a key envelope for its whole lifetime.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Salt([u8; SALT_LEN]);

impl Salt {
    /// Draw a fresh salt from the operating system RNG.
    pub fn generate() -> Result<Self> {
        let mut salt = [0u8; SALT_LEN];
        rand::rngs::OsRng
            .try_fill_bytes(&mut salt)
            .map_err(|e| EnvelopeError::Generation(format!("salt: {e}")))?;
        Ok(Self(salt))
    }

    pub fn from_bytes(bytes: [u8; SALT_LEN]) -> Self {
        Self(bytes)
    }

    /// Returns `None` unless `slice` is exactly [`SALT_LEN`] bytes.
    pub fn from_slice(slice: &[u8]) -> Option<Self> {
        let bytes: [u8; SALT_LEN] = slice.try_into().ok()?;
        Some(Self(bytes))
    }

    pub fn as_bytes(&self) -> &[u8; SALT_LEN] {
        &self.0
    }
}

impl fmt::Debug for Salt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Salt({})", hex::encode(self.0))
    }
}

/// Argon2id cost parameters.
///
/// These are not stored in exported records; both ends must agree on them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KdfParams {
    pub memory_kib: u32,
    pub time_cost: u32,
    pub parallelism: u32,
}

impl Default for KdfParams {
    fn default() -> Self {
        Self {
            memory_kib: ARGON2_MEMORY_KIB,
            time_cost: ARGON2_TIME_COST,
            parallelism: ARGON2_PARALLELISM,
        }
    }
}

impl KdfParams {
    /// Reduced parameters for tests (fast but insecure).
    #[cfg(test)]
    pub fn fast() -> Self {
        Self {
            memory_kib: 1024,
            time_cost: 1,
            parallelism: 1,
        }
    }

    fn to_argon2(self) -> Result<Params> {
        Params::new(
            self.memory_kib,
            self.time_cost,
            self.parallelism,
            Some(DERIVED_KEY_LEN),
        )
        .map_err(|e| EnvelopeError::KeyDerivation(format!("invalid Argon2 params: {e}")))
    }

    pub fn validate(&self) -> Result<()> {
        self.to_argon2().map(|_| ())
    }
}

/// Derive a 32-byte wrapping key from a password and salt using Argon2id.
pub fn derive_key(password: &[u8], salt: &Salt, params: &KdfParams) -> Result<SensitiveBytes32> {
    let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params.to_argon2()?);

    let mut output = Zeroizing::new([0u8; DERIVED_KEY_LEN]);
    argon2
        .hash_password_into(password, salt.as_bytes(), &mut *output)
        .map_err(|e| EnvelopeError::KeyDerivation(format!("Argon2id hash failed: {e}")))?;

    Ok(SensitiveBytes32::new(*output))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derive_key_deterministic() {
        let salt = Salt::from_bytes([0x42; SALT_LEN]);
        let k1 = derive_key(b"my password", &salt, &KdfParams::fast()).unwrap();
        let k2 = derive_key(b"my password", &salt, &KdfParams::fast()).unwrap();
        assert_eq!(k1.as_bytes(), k2.as_bytes());
    }

    #[test]
    fn test_derive_key_different_password() {
        let salt = Salt::from_bytes([0x42; SALT_LEN]);
        let k1 = derive_key(b"password1", &salt, &KdfParams::fast()).unwrap();
        let k2 = derive_key(b"password2", &salt, &KdfParams::fast()).unwrap();
        assert_ne!(k1.as_bytes(), k2.as_bytes());
    }

    #[test]
    fn test_derive_key_different_salt() {
        let params = KdfParams::fast();
        let k1 = derive_key(b"password", &Salt::from_bytes([0x01; SALT_LEN]), &params).unwrap();
        let k2 = derive_key(b"password", &Salt::from_bytes([0x02; SALT_LEN]), &params).unwrap();
        assert_ne!(k1.as_bytes(), k2.as_bytes());
    }

    #[test]
    fn test_generate_salt_unique() {
        let s1 = Salt::generate().unwrap();
        let s2 = Salt::generate().unwrap();
        assert_ne!(s1, s2);
        assert_eq!(s1.as_bytes().len(), SALT_LEN);
    }

    #[test]
    fn test_salt_from_slice_length() {
        assert!(Salt::from_slice(&[0u8; 16]).is_some());
        assert!(Salt::from_slice(&[0u8; 15]).is_none());
        assert!(Salt::from_slice(&[0u8; 32]).is_none());
    }

    #[test]
    fn test_invalid_params_rejected() {
        let params = KdfParams {
            memory_kib: 1,
            time_cost: 0,
            parallelism: 0,
        };
        assert!(params.validate().is_err());
        let salt = Salt::from_bytes([0u8; SALT_LEN]);
        assert!(matches!(
            derive_key(b"pw", &salt, &params),
            Err(EnvelopeError::KeyDerivation(_))
        ));
    }
}
