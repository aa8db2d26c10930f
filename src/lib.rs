pub mod codec;
pub mod config;
pub mod crypto;
pub mod envelope;
pub mod error;
pub mod password;

pub use config::EnvelopeConfig;
pub use envelope::{EnvelopeManager, EnvelopeRecord, KeyEnvelope};
pub use error::{EnvelopeError, ErrorKind, Result};
pub use password::{Password, PasswordProvider};
