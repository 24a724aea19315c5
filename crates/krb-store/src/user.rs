use serde::{Deserialize, Serialize};

use krb_crypto::{derive_key, SecretKey};

/// A registered user and the key derived from their password
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserCredential {
    pub id: u64,
    pub first_name: String,
    pub last_name: String,
    pub username: String,
    /// `derive_key(username, password)`; the password itself is never stored
    pub key: SecretKey,
}

impl UserCredential {
    pub fn new(id: u64, first_name: &str, last_name: &str, username: &str, password: &str) -> Self {
        Self {
            id,
            first_name: first_name.to_string(),
            last_name: last_name.to_string(),
            username: username.to_string(),
            key: derive_key(username, password),
        }
    }

    /// ASCII case folding only, like sqlite's `NOCASE` collation
    pub(crate) fn username_matches(&self, username: &str) -> bool {
        self.username.eq_ignore_ascii_case(username)
    }
}
