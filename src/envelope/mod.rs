/// Key envelopes: an RSA-OAEP key pair bound to a random salt.
///
/// Lifecycle:
/// 1. `generate()` draws a salt and a key pair concurrently
/// 2. `export()` wraps the private key under a password and emits an
///    [`EnvelopeRecord`] of hex strings
/// 3. `import()` decodes a record, unwraps the private key and re-imports
///    the public key, then checks the two still form a pair
///
/// Independent sub-operations run on the blocking pool and are joined; the
/// first failure fails the whole call. Envelopes are immutable.
pub mod record;

use std::sync::Arc;

use tracing::{info, warn};

use crate::codec;
use crate::config::EnvelopeConfig;
use crate::crypto::kdf::Salt;
use crate::crypto::keys::{self, PrivateKey, PublicKey};
use crate::crypto::wrap::{KeyWrapper, PassphraseKeyWrapper};
use crate::error::{EnvelopeError, Result};
use crate::password::{resolve_password, Password, PasswordProvider};

pub use record::{DecodedRecord, EnvelopeRecord, RecordSummary};

/// A private key, its public key and the salt used to wrap the private key.
#[derive(Debug)]
pub struct KeyEnvelope {
    private_key: Arc<PrivateKey>,
    public_key: Arc<PublicKey>,
    salt: Salt,
}

impl KeyEnvelope {
    fn new(private_key: PrivateKey, public_key: PublicKey, salt: Salt) -> Self {
        Self {
            private_key: Arc::new(private_key),
            public_key: Arc::new(public_key),
            salt,
        }
    }

    pub fn private_key(&self) -> &PrivateKey {
        &self.private_key
    }

    pub fn public_key(&self) -> &PublicKey {
        &self.public_key
    }

    pub fn salt(&self) -> &Salt {
        &self.salt
    }
}

/// Run CPU-bound crypto on the blocking pool.
async fn blocking<T, F>(f: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| EnvelopeError::Task(e.to_string()))?
}

/// Generates, exports and imports key envelopes.
pub struct EnvelopeManager {
    config: EnvelopeConfig,
    passwords: Arc<dyn PasswordProvider>,
    wrapper: Arc<dyn KeyWrapper>,
}

impl EnvelopeManager {
    /// Manager using the Argon2id/XChaCha20-Poly1305 wrapper from `config`.
    pub fn new(config: EnvelopeConfig, passwords: Arc<dyn PasswordProvider>) -> Result<Self> {
        config.validate()?;
        let wrapper: Arc<dyn KeyWrapper> = Arc::new(PassphraseKeyWrapper::new(*config.kdf()));
        Ok(Self {
            config,
            passwords,
            wrapper,
        })
    }

    /// Manager with a custom key wrapper.
    pub fn with_wrapper(
        config: EnvelopeConfig,
        passwords: Arc<dyn PasswordProvider>,
        wrapper: Arc<dyn KeyWrapper>,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            passwords,
            wrapper,
        })
    }

    pub fn config(&self) -> &EnvelopeConfig {
        &self.config
    }

    /// Create a fresh envelope.
    pub async fn generate(&self) -> Result<KeyEnvelope> {
        let bits = self.config.modulus_bits();

        let (salt, (private_key, public_key)) = tokio::try_join!(
            blocking(Salt::generate),
            blocking(move || keys::generate_key_pair(bits)),
        )?;

        let fingerprint = public_key
            .fingerprint()
            .map(codec::encode)
            .unwrap_or_default();
        info!(modulus_bits = bits, %fingerprint, "Generated key envelope");

        Ok(KeyEnvelope::new(private_key, public_key, salt))
    }

    /// Export an envelope as a password-protected record.
    ///
    /// With `password` absent the provider's ambient password is used.
    /// Wrapping uses a fresh nonce, so repeated exports differ byte-wise.
    pub async fn export(
        &self,
        envelope: &KeyEnvelope,
        password: Option<Password>,
    ) -> Result<EnvelopeRecord> {
        let password = resolve_password(password, self.passwords.as_ref()).await?;

        let wrapper = Arc::clone(&self.wrapper);
        let private_key = Arc::clone(&envelope.private_key);
        let public_key = Arc::clone(&envelope.public_key);
        let salt = envelope.salt;

        let (wrapped_key, spki) = tokio::try_join!(
            blocking(move || wrapper.wrap(&password, &private_key, &salt)),
            blocking(move || public_key.to_spki_der()),
        )?;

        info!(
            fingerprint = %codec::encode(keys::spki_fingerprint(&spki)),
            "Exported key envelope"
        );

        Ok(EnvelopeRecord::encode(&wrapped_key, &spki, &envelope.salt))
    }

    /// Rebuild an envelope from a record.
    ///
    /// Fails with [`EnvelopeError::Decode`] for malformed fields,
    /// [`EnvelopeError::Unwrap`] for a wrong password or corrupted key,
    /// [`EnvelopeError::PublicKeyImport`] for bad SPKI data and
    /// [`EnvelopeError::KeyPairMismatch`] when `k` and `p` are not a pair.
    pub async fn import(
        &self,
        record: &EnvelopeRecord,
        password: Option<Password>,
    ) -> Result<KeyEnvelope> {
        let DecodedRecord {
            wrapped_key,
            spki,
            salt,
        } = record.decode()?;
        let password = resolve_password(password, self.passwords.as_ref()).await?;

        let fingerprint = codec::encode(keys::spki_fingerprint(&spki));
        let wrapper = Arc::clone(&self.wrapper);
        let bits = self.config.modulus_bits();

        let (private_key, public_key) = tokio::try_join!(
            blocking(move || wrapper.unwrap(&password, &wrapped_key, &salt)),
            blocking(move || PublicKey::from_spki_der(&spki, bits)),
        )?;

        if !private_key.matches(&public_key) {
            warn!("Unwrapped private key does not match record public key");
            return Err(EnvelopeError::KeyPairMismatch);
        }

        info!(%fingerprint, "Imported key envelope");

        Ok(KeyEnvelope::new(private_key, public_key, salt))
    }
}
