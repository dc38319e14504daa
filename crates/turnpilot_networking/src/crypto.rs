//! # Payload Crypto
//!
//! The game encrypts every payload with a secret shared during pairing. The
//! cipher itself lives outside this crate; the link only needs something
//! that can encrypt and decrypt, and that tells a wrong secret apart.

use crate::error::CryptoResult;

/// Encrypts outgoing and decrypts incoming payloads.
pub trait ConnectionCrypto: Send + Sync {
    /// Encrypts a payload before it is framed.
    ///
    /// # Errors
    ///
    /// [`CryptoError::Encryption`](crate::CryptoError::Encryption) if the
    /// payload can't be encrypted.
    fn encrypt(&self, plaintext: &[u8]) -> CryptoResult<Vec<u8>>;

    /// Decrypts a payload taken out of a frame.
    ///
    /// # Errors
    ///
    /// [`CryptoError::Decryption`](crate::CryptoError::Decryption) when the
    /// shared secret doesn't match.
    fn decrypt(&self, ciphertext: &[u8]) -> CryptoResult<Vec<u8>>;
}

/// Pass-through for links paired without a shared secret.
#[derive(Clone, Copy, Debug, Default)]
pub struct Plaintext;

impl ConnectionCrypto for Plaintext {
    fn encrypt(&self, plaintext: &[u8]) -> CryptoResult<Vec<u8>> {
        Ok(plaintext.to_vec())
    }

    fn decrypt(&self, ciphertext: &[u8]) -> CryptoResult<Vec<u8>> {
        Ok(ciphertext.to_vec())
    }
}
