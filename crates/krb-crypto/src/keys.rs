//! 256-bit key type shared by user keys, service-pair keys and session keys

use base64::{engine::general_purpose::STANDARD, Engine as _};
use rand::RngCore;
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use zeroize::Zeroize;

use crate::KEY_SIZE;

/// A 256-bit symmetric key. Zeroized on drop.
///
/// Serializes as a base64 string so it can travel inside tickets and sit in
/// the credential database.
#[derive(Clone, PartialEq, Eq)]
pub struct SecretKey {
    bytes: [u8; KEY_SIZE],
}

impl SecretKey {
    pub fn from_bytes(bytes: [u8; KEY_SIZE]) -> Self {
        Self { bytes }
    }

    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.bytes
    }

    /// Parse a key from a byte slice, rejecting anything but exactly 32 bytes.
    pub fn from_slice(slice: &[u8]) -> Result<Self, KeyDecodeError> {
        let bytes: [u8; KEY_SIZE] = slice
            .try_into()
            .map_err(|_| KeyDecodeError::Length(slice.len()))?;
        Ok(Self::from_bytes(bytes))
    }

    pub fn to_base64(&self) -> String {
        STANDARD.encode(self.bytes)
    }

    pub fn from_base64(encoded: &str) -> Result<Self, KeyDecodeError> {
        let mut decoded = STANDARD
            .decode(encoded)
            .map_err(|e| KeyDecodeError::Base64(e.to_string()))?;
        let key = Self::from_slice(&decoded);
        decoded.zeroize();
        key
    }
}

impl Drop for SecretKey {
    fn drop(&mut self) {
        self.bytes.zeroize();
    }
}

impl std::fmt::Debug for SecretKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecretKey")
            .field("bytes", &"[REDACTED]")
            .finish()
    }
}

impl Serialize for SecretKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_base64())
    }
}

impl<'de> Deserialize<'de> for SecretKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        Self::from_base64(&encoded).map_err(de::Error::custom)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum KeyDecodeError {
    #[error("key must be 32 bytes, got {0}")]
    Length(usize),

    #[error("key is not valid base64: {0}")]
    Base64(String),
}

/// Generate a random 256-bit key from the thread-local CSPRNG.
pub fn generate_key() -> SecretKey {
    let mut bytes = [0u8; KEY_SIZE];
    rand::thread_rng().fill_bytes(&mut bytes);
    SecretKey::from_bytes(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_generation() {
        let k1 = generate_key();
        let k2 = generate_key();
        assert_ne!(k1.as_bytes(), k2.as_bytes(), "random keys must differ");
    }

    #[test]
    fn test_base64_roundtrip() {
        let key = generate_key();
        let parsed = SecretKey::from_base64(&key.to_base64()).unwrap();
        assert_eq!(key, parsed);
    }

    #[test]
    fn test_from_slice_rejects_wrong_length() {
        assert!(matches!(
            SecretKey::from_slice(&[0u8; 31]),
            Err(KeyDecodeError::Length(31))
        ));
        assert!(SecretKey::from_slice(&[0u8; 32]).is_ok());
    }

    #[test]
    fn test_deserialize_rejects_short_key() {
        let json = format!("\"{}\"", STANDARD.encode([7u8; 16]));
        let result: Result<SecretKey, _> = serde_json::from_str(&json);
        assert!(result.is_err());
    }

    #[test]
    fn test_debug_is_redacted() {
        let key = SecretKey::from_bytes([0xAB; KEY_SIZE]);
        let rendered = format!("{key:?}");
        assert!(rendered.contains("REDACTED"));
        assert!(!rendered.contains("171"));
    }
}
