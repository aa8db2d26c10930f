/// Cryptographic building blocks for key envelopes.
///
/// - `keys`: RSA-OAEP key handles with usage restrictions
/// - `kdf`: Argon2id derivation of wrapping keys from passwords
/// - `aead`: XChaCha20-Poly1305 sealing
/// - `wrap`: password-based private key wrapping
/// - `sensitive`: zeroize-on-drop buffers
pub mod aead;
pub mod kdf;
pub mod keys;
pub mod sensitive;
pub mod wrap;
