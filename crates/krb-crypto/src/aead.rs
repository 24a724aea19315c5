//! XChaCha20-Poly1305 encryption of opaque byte strings
//!
//! Output format (binary):
//! ```text
//! [24 bytes: random nonce][N bytes: ciphertext][16 bytes: Poly1305 tag]
//! ```
//!
//! No associated data is bound. Every call draws a fresh nonce; with a
//! 192-bit nonce, random generation keeps the collision probability
//! negligible for any realistic number of messages per key.

use chacha20poly1305::{
    aead::{Aead, KeyInit},
    XChaCha20Poly1305, XNonce,
};
use rand::RngCore;
use thiserror::Error;

use crate::keys::SecretKey;
use crate::{NONCE_SIZE, TAG_SIZE};

#[derive(Debug, Error)]
pub enum AeadError {
    #[error("ciphertext too short: {len} bytes (minimum {min})")]
    TooShort { len: usize, min: usize },

    #[error("encryption failed")]
    Encrypt,

    #[error("decryption failed: invalid key or corrupted data")]
    Decrypt,
}

/// Encrypt `plaintext` under `key`.
///
/// Returns: `[24-byte nonce][ciphertext][16-byte tag]`
pub fn encrypt(key: &SecretKey, plaintext: &[u8]) -> Result<Vec<u8>, AeadError> {
    let cipher = XChaCha20Poly1305::new(key.as_bytes().into());

    let mut nonce_bytes = [0u8; NONCE_SIZE];
    rand::thread_rng().fill_bytes(&mut nonce_bytes);
    let nonce = XNonce::from_slice(&nonce_bytes);

    let ciphertext = cipher
        .encrypt(nonce, plaintext)
        .map_err(|_| AeadError::Encrypt)?;

    let mut result = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
    result.extend_from_slice(&nonce_bytes);
    result.extend_from_slice(&ciphertext);
    Ok(result)
}

/// Decrypt the output of [`encrypt`]. Nothing is returned unless the tag
/// verifies.
pub fn decrypt(key: &SecretKey, encrypted: &[u8]) -> Result<Vec<u8>, AeadError> {
    if encrypted.len() < NONCE_SIZE + TAG_SIZE {
        return Err(AeadError::TooShort {
            len: encrypted.len(),
            min: NONCE_SIZE + TAG_SIZE,
        });
    }

    let (nonce_bytes, ciphertext) = encrypted.split_at(NONCE_SIZE);
    let nonce = XNonce::from_slice(nonce_bytes);
    let cipher = XChaCha20Poly1305::new(key.as_bytes().into());

    cipher
        .decrypt(nonce, ciphertext)
        .map_err(|_| AeadError::Decrypt)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::generate_key;

    #[test]
    fn test_encrypt_decrypt_roundtrip() {
        let key = generate_key();
        let plaintext = b"hello, encrypted world!";

        let encrypted = encrypt(&key, plaintext).unwrap();
        let decrypted = decrypt(&key, &encrypted).unwrap();

        assert_eq!(&decrypted, plaintext);
    }

    #[test]
    fn test_encrypt_decrypt_empty() {
        let key = generate_key();

        let encrypted = encrypt(&key, b"").unwrap();
        assert_eq!(encrypted.len(), NONCE_SIZE + TAG_SIZE);
        assert_eq!(decrypt(&key, &encrypted).unwrap(), b"");
    }

    #[test]
    fn test_decrypt_wrong_key() {
        let key1 = generate_key();
        let key2 = generate_key();

        let encrypted = encrypt(&key1, b"secret data").unwrap();
        assert!(matches!(decrypt(&key2, &encrypted), Err(AeadError::Decrypt)));
    }

    #[test]
    fn test_nonces_are_fresh() {
        let key = generate_key();
        let a = encrypt(&key, b"same input").unwrap();
        let b = encrypt(&key, b"same input").unwrap();

        assert_ne!(a[..NONCE_SIZE], b[..NONCE_SIZE]);
        assert_ne!(a, b);
    }

    #[test]
    fn test_encrypted_size() {
        let key = generate_key();
        let encrypted = encrypt(&key, &[0u8; 1000]).unwrap();

        // nonce (24) + plaintext (1000) + tag (16) = 1040
        assert_eq!(encrypted.len(), 24 + 1000 + 16);
    }

    #[test]
    fn test_too_short() {
        let key = generate_key();
        let result = decrypt(&key, &[0u8; NONCE_SIZE + TAG_SIZE - 1]);
        assert!(matches!(result, Err(AeadError::TooShort { len: 39, min: 40 })));
    }

    #[test]
    fn test_tampered_ciphertext() {
        let key = generate_key();

        let mut encrypted = encrypt(&key, b"secret data").unwrap();
        // Flip a byte in the ciphertext (after nonce)
        encrypted[NONCE_SIZE + 1] ^= 0xFF;

        assert!(decrypt(&key, &encrypted).is_err(), "tampered ciphertext must fail");
    }

    #[test]
    fn test_tampered_tag() {
        let key = generate_key();

        let mut encrypted = encrypt(&key, b"secret data").unwrap();
        let last = encrypted.len() - 1;
        encrypted[last] ^= 0x01;

        assert!(decrypt(&key, &encrypted).is_err(), "tampered tag must fail");
    }
}
