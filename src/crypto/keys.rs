/// RSA-OAEP key handles.
///
/// Keys are generated and imported with fixed parameters: RSA-OAEP with
/// SHA-256 and public exponent 65537. Each handle carries the set of
/// operations it was created with and refuses anything else.
use std::fmt;

use rand::rngs::OsRng;
use rsa::pkcs8::{DecodePrivateKey, DecodePublicKey, EncodePrivateKey, EncodePublicKey};
use rsa::traits::PublicKeyParts;
use rsa::{BigUint, Oaep, RsaPrivateKey, RsaPublicKey};
use sha2::{Digest, Sha256};

use crate::crypto::sensitive::SensitiveVec;
use crate::error::{EnvelopeError, Result};

/// Default modulus size in bits.
pub const MODULUS_BITS: usize = 4096;

/// Public exponent used for every envelope key.
pub const PUBLIC_EXPONENT: u32 = 65_537;

/// Operations a key handle may be used for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyUsage {
    Encrypt,
    Decrypt,
    WrapKey,
    UnwrapKey,
}

impl KeyUsage {
    const ALL: [KeyUsage; 4] = [
        KeyUsage::Encrypt,
        KeyUsage::Decrypt,
        KeyUsage::WrapKey,
        KeyUsage::UnwrapKey,
    ];

    fn bit(self) -> u8 {
        match self {
            KeyUsage::Encrypt => 0b0001,
            KeyUsage::Decrypt => 0b0010,
            KeyUsage::WrapKey => 0b0100,
            KeyUsage::UnwrapKey => 0b1000,
        }
    }
}

impl fmt::Display for KeyUsage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            KeyUsage::Encrypt => "encrypt",
            KeyUsage::Decrypt => "decrypt",
            KeyUsage::WrapKey => "wrapKey",
            KeyUsage::UnwrapKey => "unwrapKey",
        })
    }
}

/// A set of [`KeyUsage`]s.
#[derive(Clone, Copy, PartialEq, Eq, Default)]
pub struct KeyUsages(u8);

impl KeyUsages {
    /// Usages of a freshly generated public key.
    pub const PUBLIC: KeyUsages = KeyUsages(0b0101);
    /// Usages of a freshly generated private key.
    pub const PRIVATE: KeyUsages = KeyUsages(0b1010);
    /// Usages granted to a private key recovered by unwrapping.
    pub const UNWRAPPED_PRIVATE: KeyUsages = KeyUsages(0b0010);

    pub fn of(usages: &[KeyUsage]) -> Self {
        Self(usages.iter().fold(0, |acc, u| acc | u.bit()))
    }

    pub fn contains(&self, usage: KeyUsage) -> bool {
        self.0 & usage.bit() != 0
    }

    pub fn iter(&self) -> impl Iterator<Item = KeyUsage> {
        let set = *self;
        KeyUsage::ALL.into_iter().filter(move |u| set.contains(*u))
    }

    fn require(&self, usage: KeyUsage) -> Result<()> {
        if self.contains(usage) {
            Ok(())
        } else {
            Err(EnvelopeError::UsageNotPermitted(usage))
        }
    }
}

impl fmt::Debug for KeyUsages {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

/// SHA-256 fingerprint of SPKI DER bytes.
pub fn spki_fingerprint(der: &[u8]) -> [u8; 32] {
    Sha256::digest(der).into()
}

fn oaep() -> Oaep {
    Oaep::new::<Sha256>()
}

/// Public half of an envelope key pair.
pub struct PublicKey {
    inner: RsaPublicKey,
    usages: KeyUsages,
}

impl PublicKey {
    /// Import a public key from SPKI DER, enforcing the expected modulus size
    /// and exponent. The imported key may encrypt and wrap keys.
    pub fn from_spki_der(der: &[u8], modulus_bits: usize) -> Result<Self> {
        let inner = RsaPublicKey::from_public_key_der(der)
            .map_err(|e| EnvelopeError::PublicKeyImport(e.to_string()))?;

        let bits = inner.n().bits();
        if bits != modulus_bits {
            return Err(EnvelopeError::PublicKeyImport(format!(
                "expected {modulus_bits}-bit modulus, found {bits}"
            )));
        }
        if *inner.e() != BigUint::from(PUBLIC_EXPONENT) {
            return Err(EnvelopeError::PublicKeyImport(format!(
                "unexpected public exponent {}",
                inner.e()
            )));
        }

        Ok(Self {
            inner,
            usages: KeyUsages::PUBLIC,
        })
    }

    /// Encode as SubjectPublicKeyInfo DER.
    pub fn to_spki_der(&self) -> Result<Vec<u8>> {
        self.inner
            .to_public_key_der()
            .map(|doc| doc.as_bytes().to_vec())
            .map_err(|e| EnvelopeError::Serialization(format!("SPKI encoding: {e}")))
    }

    /// SHA-256 over the SPKI encoding.
    pub fn fingerprint(&self) -> Result<[u8; 32]> {
        Ok(spki_fingerprint(&self.to_spki_der()?))
    }

    pub fn modulus_bits(&self) -> usize {
        self.inner.n().bits()
    }

    pub fn usages(&self) -> KeyUsages {
        self.usages
    }

    /// RSA-OAEP encrypt application data.
    pub fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>> {
        self.usages.require(KeyUsage::Encrypt)?;
        self.oaep_encrypt(plaintext)
    }

    /// RSA-OAEP encrypt a symmetric key.
    pub fn wrap_key(&self, key: &[u8]) -> Result<Vec<u8>> {
        self.usages.require(KeyUsage::WrapKey)?;
        self.oaep_encrypt(key)
    }

    fn oaep_encrypt(&self, data: &[u8]) -> Result<Vec<u8>> {
        self.inner
            .encrypt(&mut OsRng, oaep(), data)
            .map_err(|e| EnvelopeError::Encryption(e.to_string()))
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PublicKey")
            .field("modulus_bits", &self.modulus_bits())
            .field("usages", &self.usages)
            .finish()
    }
}

/// Private half of an envelope key pair. The underlying key is zeroized on
/// drop by the `rsa` crate.
pub struct PrivateKey {
    inner: RsaPrivateKey,
    usages: KeyUsages,
}

impl PrivateKey {
    /// RSA-OAEP decrypt application data.
    pub fn decrypt(&self, ciphertext: &[u8]) -> Result<SensitiveVec> {
        self.usages.require(KeyUsage::Decrypt)?;
        self.oaep_decrypt(ciphertext)
    }

    /// RSA-OAEP decrypt a wrapped symmetric key.
    pub fn unwrap_key(&self, wrapped: &[u8]) -> Result<SensitiveVec> {
        self.usages.require(KeyUsage::UnwrapKey)?;
        self.oaep_decrypt(wrapped)
    }

    pub fn usages(&self) -> KeyUsages {
        self.usages
    }

    pub fn modulus_bits(&self) -> usize {
        self.inner.n().bits()
    }

    /// Whether `public` is the public half of this key.
    pub fn matches(&self, public: &PublicKey) -> bool {
        self.inner.n() == public.inner.n() && self.inner.e() == public.inner.e()
    }

    /// PKCS#8 DER of the private key. Only key wrappers need this.
    pub(crate) fn to_pkcs8_der(&self) -> Result<SensitiveVec> {
        let doc = self
            .inner
            .to_pkcs8_der()
            .map_err(|e| EnvelopeError::Serialization(format!("PKCS#8 encoding: {e}")))?;
        Ok(SensitiveVec::new(doc.as_bytes().to_vec()))
    }

    /// Rebuild a private key from PKCS#8 DER with the given usages.
    pub(crate) fn from_pkcs8_der(der: &[u8], usages: KeyUsages) -> Result<Self> {
        let inner = RsaPrivateKey::from_pkcs8_der(der)
            .map_err(|e| EnvelopeError::Unwrap(format!("invalid PKCS#8 payload: {e}")))?;
        inner
            .validate()
            .map_err(|e| EnvelopeError::Unwrap(format!("inconsistent private key: {e}")))?;
        Ok(Self { inner, usages })
    }

    fn oaep_decrypt(&self, ciphertext: &[u8]) -> Result<SensitiveVec> {
        self.inner
            .decrypt(oaep(), ciphertext)
            .map(SensitiveVec::new)
            .map_err(|e| EnvelopeError::Decryption(e.to_string()))
    }
}

impl fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PrivateKey")
            .field("modulus_bits", &self.modulus_bits())
            .field("usages", &self.usages)
            .finish_non_exhaustive()
    }
}

/// Generate an RSA-OAEP key pair with exponent 65537.
pub fn generate_key_pair(modulus_bits: usize) -> Result<(PrivateKey, PublicKey)> {
    let exponent = BigUint::from(PUBLIC_EXPONENT);
    let private = RsaPrivateKey::new_with_exp(&mut OsRng, modulus_bits, &exponent)
        .map_err(|e| EnvelopeError::Generation(format!("RSA-{modulus_bits}: {e}")))?;
    let public = RsaPublicKey::from(&private);

    Ok((
        PrivateKey {
            inner: private,
            usages: KeyUsages::PRIVATE,
        },
        PublicKey {
            inner: public,
            usages: KeyUsages::PUBLIC,
        },
    ))
}

#[cfg(test)]
pub(crate) mod test_keys {
    use std::sync::OnceLock;

    use super::*;

    pub const TEST_BITS: usize = 1024;

    /// PKCS#8 of a single 1024-bit key shared across tests; key generation
    /// dominates test time otherwise.
    fn shared_pkcs8() -> &'static [u8] {
        static DER: OnceLock<Vec<u8>> = OnceLock::new();
        DER.get_or_init(|| {
            let (private, _) = generate_key_pair(TEST_BITS).unwrap();
            private.to_pkcs8_der().unwrap().as_bytes().to_vec()
        })
    }

    /// A fresh pair of handles over the shared test key.
    pub fn key_pair() -> (PrivateKey, PublicKey) {
        let private = PrivateKey::from_pkcs8_der(shared_pkcs8(), KeyUsages::PRIVATE).unwrap();
        let public = PublicKey {
            inner: RsaPublicKey::from(&private.inner),
            usages: KeyUsages::PUBLIC,
        };
        (private, public)
    }
}
