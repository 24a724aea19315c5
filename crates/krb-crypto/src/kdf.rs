//! Key derivation: (username, password) → user key
//!
//! Both the credential database (when a user is added) and the client (when
//! the password is typed) run this, so the password itself never travels.

use sha2::{Digest, Sha256};

use crate::keys::SecretKey;

/// Realm tag prepended to every derivation input
pub const REALM: &str = "@KERBEROS";

/// Derive a user's 256-bit key as `SHA-256(REALM || username || password)`.
pub fn derive_key(username: &str, password: &str) -> SecretKey {
    let mut hasher = Sha256::new();
    hasher.update(REALM.as_bytes());
    hasher.update(username.as_bytes());
    hasher.update(password.as_bytes());
    SecretKey::from_bytes(hasher.finalize().into())
}
