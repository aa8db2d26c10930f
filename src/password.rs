/// Password values and the providers that supply them when a caller does not.
///
/// Envelope operations accept `Option<Password>`. An explicit password always
/// wins; otherwise the configured [`PasswordProvider`] is asked to recall one.
use std::fmt;
use std::sync::Mutex;

use async_trait::async_trait;
use tracing::debug;
use zeroize::Zeroizing;

use crate::error::{EnvelopeError, Result};

/// A password held in memory that is wiped when dropped.
#[derive(Clone)]
pub struct Password(Zeroizing<String>);

impl Password {
    pub fn new(password: impl Into<String>) -> Self {
        Self(Zeroizing::new(password.into()))
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<&str> for Password {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for Password {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

impl fmt::Debug for Password {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Password(<redacted>)")
    }
}

/// Source of a password when none is passed explicitly.
///
/// Implementations may suspend, e.g. while waiting for a user prompt.
#[async_trait]
pub trait PasswordProvider: Send + Sync {
    /// Recall the ambient password, or fail with
    /// [`EnvelopeError::PasswordUnavailable`].
    async fn recall(&self) -> Result<Password>;
}

/// Resolve the password for one envelope operation.
///
/// An empty password, explicit or recalled, counts as unavailable.
pub async fn resolve_password(
    supplied: Option<Password>,
    provider: &dyn PasswordProvider,
) -> Result<Password> {
    let (password, source) = match supplied {
        Some(password) => (password, "explicit"),
        None => (provider.recall().await?, "ambient"),
    };
    if password.is_empty() {
        return Err(EnvelopeError::PasswordUnavailable(format!(
            "{source} password is empty"
        )));
    }
    debug!(source, "Password resolved");
    Ok(password)
}

/// Provider with no ambient password. Every operation must pass one.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoAmbientPassword;

#[async_trait]
impl PasswordProvider for NoAmbientPassword {
    async fn recall(&self) -> Result<Password> {
        Err(EnvelopeError::PasswordUnavailable(
            "no password supplied and none remembered".to_string(),
        ))
    }
}

/// Keeps the most recently remembered password in memory for the session.
#[derive(Default)]
pub struct RememberedPassword {
    slot: Mutex<Option<Password>>,
}

impl RememberedPassword {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_password(password: Password) -> Self {
        Self {
            slot: Mutex::new(Some(password)),
        }
    }

    pub fn remember(&self, password: Password) {
        *self.lock() = Some(password);
    }

    pub fn forget(&self) {
        *self.lock() = None;
    }

    pub fn is_remembered(&self) -> bool {
        self.lock().is_some()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Option<Password>> {
        // A panic while holding the lock cannot leave the slot half-written.
        self.slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl PasswordProvider for RememberedPassword {
    async fn recall(&self) -> Result<Password> {
        self.lock().clone().ok_or_else(|| {
            EnvelopeError::PasswordUnavailable("no password has been remembered".to_string())
        })
    }
}

/// Reads the password from an environment variable at recall time.
#[derive(Debug, Clone)]
pub struct EnvPasswordProvider {
    var: String,
}

impl EnvPasswordProvider {
    pub fn new(var: impl Into<String>) -> Self {
        Self { var: var.into() }
    }
}

#[async_trait]
impl PasswordProvider for EnvPasswordProvider {
    async fn recall(&self) -> Result<Password> {
        match std::env::var(&self.var) {
            Ok(value) if !value.is_empty() => Ok(Password::new(value)),
            Ok(_) => Err(EnvelopeError::PasswordUnavailable(format!(
                "{} is empty",
                self.var
            ))),
            Err(e) => Err(EnvelopeError::PasswordUnavailable(format!(
                "{}: {e}",
                self.var
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[tokio::test]
    async fn test_explicit_password_wins() {
        let provider = RememberedPassword::with_password("ambient".into());
        let resolved = resolve_password(Some("explicit".into()), &provider)
            .await
            .unwrap();
        assert_eq!(resolved.as_bytes(), b"explicit");
    }

    #[tokio::test]
    async fn test_absent_password_recalled() {
        let provider = RememberedPassword::with_password("ambient".into());
        let resolved = resolve_password(None, &provider).await.unwrap();
        assert_eq!(resolved.as_bytes(), b"ambient");
    }

    #[tokio::test]
    async fn test_recall_failure_propagates() {
        let err = resolve_password(None, &NoAmbientPassword).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::PasswordUnavailable);
    }

    #[tokio::test]
    async fn test_empty_password_unavailable() {
        let provider = RememberedPassword::with_password("ambient".into());
        let err = resolve_password(Some("".into()), &provider).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::PasswordUnavailable);

        let provider = RememberedPassword::with_password("".into());
        let err = resolve_password(None, &provider).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::PasswordUnavailable);
    }

    #[tokio::test]
    async fn test_remember_and_forget() {
        let provider = RememberedPassword::new();
        assert!(!provider.is_remembered());
        assert!(provider.recall().await.is_err());

        provider.remember("hunter2".into());
        assert!(provider.is_remembered());
        assert_eq!(provider.recall().await.unwrap().as_bytes(), b"hunter2");

        provider.forget();
        assert!(matches!(
            provider.recall().await,
            Err(EnvelopeError::PasswordUnavailable(_))
        ));
    }

    #[tokio::test]
    async fn test_env_provider() {
        let var = "KEYENVELOPE_TEST_PASSWORD_ENV_PROVIDER";
        let provider = EnvPasswordProvider::new(var);

        std::env::remove_var(var);
        assert!(matches!(
            provider.recall().await,
            Err(EnvelopeError::PasswordUnavailable(_))
        ));

        std::env::set_var(var, "");
        assert!(provider.recall().await.is_err());

        std::env::set_var(var, "from-env");
        assert_eq!(provider.recall().await.unwrap().as_bytes(), b"from-env");
        std::env::remove_var(var);
    }

    #[test]
    fn test_debug_redacts() {
        let password = Password::new("hunter2");
        assert!(!format!("{password:?}").contains("hunter2"));
    }
}
