/// Envelope configuration.
///
/// Neither the RSA modulus size nor the Argon2id parameters are recorded in
/// an exported record, so both ends of an export/import must share them.
/// They are fixed at [`MODULUS_BITS`] and [`KdfParams::default`] and cannot
/// be set from a config file; only tests may override them.
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::crypto::kdf::KdfParams;
use crate::crypto::keys::MODULUS_BITS;
use crate::error::{EnvelopeError, Result};

/// Environment variable consulted for the ambient password by default.
pub const DEFAULT_PASSWORD_ENV: &str = "KEYENVELOPE_PASSWORD";

const MIN_MODULUS_BITS: usize = 1024;
const MAX_MODULUS_BITS: usize = 4096;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EnvelopeConfig {
    /// RSA modulus size for generated and imported keys.
    #[serde(skip)]
    modulus_bits: usize,
    /// Argon2id parameters for the password-derived wrapping key.
    #[serde(skip)]
    kdf: KdfParams,
    /// Environment variable holding the ambient password.
    pub password_env: String,
}

impl Default for EnvelopeConfig {
    fn default() -> Self {
        Self {
            modulus_bits: MODULUS_BITS,
            kdf: KdfParams::default(),
            password_env: DEFAULT_PASSWORD_ENV.to_string(),
        }
    }
}

impl EnvelopeConfig {
    /// Load and validate a JSON config file. Missing fields take defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let data = std::fs::read(path.as_ref())?;
        let config: Self = serde_json::from_slice(&data)
            .map_err(|e| EnvelopeError::Config(format!("{}: {e}", path.as_ref().display())))?;
        config.validate()?;
        Ok(config)
    }

    pub fn modulus_bits(&self) -> usize {
        self.modulus_bits
    }

    pub fn kdf(&self) -> &KdfParams {
        &self.kdf
    }

    pub fn validate(&self) -> Result<()> {
        if !(MIN_MODULUS_BITS..=MAX_MODULUS_BITS).contains(&self.modulus_bits)
            || self.modulus_bits % 8 != 0
        {
            return Err(EnvelopeError::Config(format!(
                "modulus_bits must be a multiple of 8 between {MIN_MODULUS_BITS} and {MAX_MODULUS_BITS}, got {}",
                self.modulus_bits
            )));
        }
        self.kdf
            .validate()
            .map_err(|e| EnvelopeError::Config(e.to_string()))?;
        if self.password_env.is_empty() {
            return Err(EnvelopeError::Config("password_env must not be empty".into()));
        }
        Ok(())
    }

    /// Small keys and cheap KDF for tests.
    #[cfg(test)]
    pub(crate) fn for_tests() -> Self {
        Self::default()
            .with_modulus_bits(crate::crypto::keys::test_keys::TEST_BITS)
            .with_kdf(KdfParams::fast())
    }

    #[cfg(test)]
    pub(crate) fn with_modulus_bits(mut self, modulus_bits: usize) -> Self {
        self.modulus_bits = modulus_bits;
        self
    }

    #[cfg(test)]
    pub(crate) fn with_kdf(mut self, kdf: KdfParams) -> Self {
        self.kdf = kdf;
        self
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    fn write_config(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_defaults() {
        let config = EnvelopeConfig::default();
        assert_eq!(config.modulus_bits(), 4096);
        assert_eq!(*config.kdf(), KdfParams::default());
        assert_eq!(config.password_env, DEFAULT_PASSWORD_ENV);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_password_env_from_file() {
        let file = write_config(r#"{"password_env": "MY_ENVELOPE_PASSWORD"}"#);

        let config = EnvelopeConfig::from_json_file(file.path()).unwrap();
        assert_eq!(config.password_env, "MY_ENVELOPE_PASSWORD");
        assert_eq!(config.modulus_bits(), MODULUS_BITS);
        assert_eq!(*config.kdf(), KdfParams::default());
    }

    #[test]
    fn test_compatibility_parameters_not_loadable() {
        for contents in [
            r#"{"modulus_bits": 1024}"#,
            r#"{"kdf": {"memory_kib": 8, "time_cost": 1, "parallelism": 1}}"#,
            r#"{"modulus_bits": 1024, "kdf": {"memory_kib": 8, "time_cost": 1, "parallelism": 1}}"#,
        ] {
            let file = write_config(contents);
            assert!(
                matches!(
                    EnvelopeConfig::from_json_file(file.path()),
                    Err(EnvelopeError::Config(_))
                ),
                "{contents} should be rejected"
            );
        }
    }

    #[test]
    fn test_unknown_field_rejected() {
        let file = write_config(r#"{"modulus": 4096}"#);

        assert!(matches!(
            EnvelopeConfig::from_json_file(file.path()),
            Err(EnvelopeError::Config(_))
        ));
    }

    #[test]
    fn test_invalid_modulus_rejected() {
        for bits in [512, 4097, 8192] {
            let config = EnvelopeConfig::default().with_modulus_bits(bits);
            assert!(config.validate().is_err(), "{bits} should be rejected");
        }
    }

    #[test]
    fn test_empty_password_env_rejected() {
        let file = write_config(r#"{"password_env": ""}"#);
        assert!(matches!(
            EnvelopeConfig::from_json_file(file.path()),
            Err(EnvelopeError::Config(_))
        ));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        assert!(matches!(
            EnvelopeConfig::from_json_file("/nonexistent/keyenvelope.json"),
            Err(EnvelopeError::Io(_))
        ));
    }
}
