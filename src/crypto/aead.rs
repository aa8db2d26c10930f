/// XChaCha20-Poly1305 AEAD used to seal wrapped private keys.
///
/// The 24-byte nonce is large enough for random generation
/// without practical collision risk.
use chacha20poly1305::{
    aead::{Aead, KeyInit, Payload},
    XChaCha20Poly1305, XNonce,
};
use rand::RngCore;

use crate::crypto::sensitive::SensitiveBytes32;
use crate::error::{EnvelopeError, Result};

pub const NONCE_LEN: usize = 24;
pub const TAG_LEN: usize = 16;

/// Generate a random 24-byte nonce.
pub fn generate_nonce() -> Result<[u8; NONCE_LEN]> {
    let mut nonce = [0u8; NONCE_LEN];
    rand::rngs::OsRng
        .try_fill_bytes(&mut nonce)
        .map_err(|e| EnvelopeError::Generation(format!("nonce: {e}")))?;
    Ok(nonce)
}

/// Encrypt plaintext under a fresh random nonce.
///
/// Returns (nonce, ciphertext_with_tag).
pub fn encrypt(
    key: &SensitiveBytes32,
    plaintext: &[u8],
    aad: &[u8],
) -> Result<([u8; NONCE_LEN], Vec<u8>)> {
    let cipher = XChaCha20Poly1305::new_from_slice(key.as_bytes())
        .map_err(|e| EnvelopeError::Encryption(e.to_string()))?;

    let nonce_bytes = generate_nonce()?;
    let nonce = XNonce::from_slice(&nonce_bytes);

    let ciphertext = cipher
        .encrypt(
            nonce,
            Payload {
                msg: plaintext,
                aad,
            },
        )
        .map_err(|e| EnvelopeError::Encryption(e.to_string()))?;

    Ok((nonce_bytes, ciphertext))
}

/// Decrypt and authenticate. Fails if the key, nonce, AAD or ciphertext differ
/// from what was sealed.
pub fn decrypt(
    key: &SensitiveBytes32,
    nonce: &[u8; NONCE_LEN],
    ciphertext: &[u8],
    aad: &[u8],
) -> Result<Vec<u8>> {
    let cipher = XChaCha20Poly1305::new_from_slice(key.as_bytes())
        .map_err(|e| EnvelopeError::Decryption(e.to_string()))?;

    cipher
        .decrypt(
            XNonce::from_slice(nonce),
            Payload {
                msg: ciphertext,
                aad,
            },
        )
        .map_err(|e| EnvelopeError::Decryption(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(byte: u8) -> SensitiveBytes32 {
        SensitiveBytes32::new([byte; 32])
    }

    #[test]
    fn test_encrypt_decrypt_roundtrip() {
        let plaintext = b"private key bytes";
        let aad = b"keyenvelope-test";

        let (nonce, ciphertext) = encrypt(&key(1), plaintext, aad).unwrap();
        assert_eq!(ciphertext.len(), plaintext.len() + TAG_LEN);
        let decrypted = decrypt(&key(1), &nonce, &ciphertext, aad).unwrap();

        assert_eq!(&decrypted, plaintext);
    }

    #[test]
    fn test_wrong_key_fails() {
        let (nonce, ciphertext) = encrypt(&key(1), b"secret", b"").unwrap();
        assert!(decrypt(&key(2), &nonce, &ciphertext, b"").is_err());
    }

    #[test]
    fn test_wrong_aad_fails() {
        let (nonce, ciphertext) = encrypt(&key(1), b"secret", b"correct aad").unwrap();
        assert!(decrypt(&key(1), &nonce, &ciphertext, b"wrong aad").is_err());
    }

    #[test]
    fn test_tampered_ciphertext_fails() {
        let (nonce, mut ciphertext) = encrypt(&key(1), b"secret", b"").unwrap();
        ciphertext[0] ^= 0xFF;
        assert!(decrypt(&key(1), &nonce, &ciphertext, b"").is_err());
    }

    #[test]
    fn test_nonces_differ() {
        let (n1, c1) = encrypt(&key(1), b"same", b"").unwrap();
        let (n2, c2) = encrypt(&key(1), b"same", b"").unwrap();
        assert_ne!(n1, n2);
        assert_ne!(c1, c2);
    }
}
