use std::fmt;

use thiserror::Error;

use crate::crypto::keys::KeyUsage;

/// One of the three fields of an envelope record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordField {
    /// Wrapped private key.
    K,
    /// SPKI public key.
    P,
    /// Salt.
    S,
}

impl fmt::Display for RecordField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            RecordField::K => "k",
            RecordField::P => "p",
            RecordField::S => "s",
        })
    }
}

#[derive(Error, Debug)]
pub enum EnvelopeError {
    #[error("Key generation failed: {0}")]
    Generation(String),

    #[error("No password available: {0}")]
    PasswordUnavailable(String),

    #[error("Malformed record field `{field}`: {reason}")]
    Decode { field: RecordField, reason: String },

    #[error("Private key unwrap failed: {0}")]
    Unwrap(String),

    #[error("Public key import failed: {0}")]
    PublicKeyImport(String),

    #[error("Private key does not match public key")]
    KeyPairMismatch,

    #[error("Key usage not permitted: {0}")]
    UsageNotPermitted(KeyUsage),

    #[error("Encryption failed: {0}")]
    Encryption(String),

    #[error("Decryption failed: {0}")]
    Decryption(String),

    #[error("Key derivation failed: {0}")]
    KeyDerivation(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Background task failed: {0}")]
    Task(String),
}

/// Coarse classification of an [`EnvelopeError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Generation,
    PasswordUnavailable,
    Decode,
    Unwrap,
    PublicKeyImport,
    Other,
}

impl EnvelopeError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            EnvelopeError::Generation(_) => ErrorKind::Generation,
            EnvelopeError::PasswordUnavailable(_) => ErrorKind::PasswordUnavailable,
            EnvelopeError::Decode { .. } => ErrorKind::Decode,
            EnvelopeError::Unwrap(_) => ErrorKind::Unwrap,
            EnvelopeError::PublicKeyImport(_) => ErrorKind::PublicKeyImport,
            _ => ErrorKind::Other,
        }
    }
}

pub type Result<T> = std::result::Result<T, EnvelopeError>;
