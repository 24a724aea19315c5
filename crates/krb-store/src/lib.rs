//! krb-store: the collaborators the protocol handlers consult
//!
//! - [`CredentialStore`]: username → [`UserCredential`] (AS only)
//! - [`KeyRegistry`]: [`ServicePair`] → shared 256-bit key (AS, TGS, FS)
//!
//! [`AuthDb`] is the JSON-file implementation used by `krbd` and the admin
//! commands; [`StaticKeyRegistry`] is the immutable snapshot each service
//! holds after startup.

pub mod authdb;
pub mod registry;
pub mod user;

pub use authdb::AuthDb;
pub use registry::{ServicePair, StaticKeyRegistry};
pub use user::UserCredential;

use krb_crypto::SecretKey;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database does not exist: {0}")]
    Missing(String),

    #[error("database I/O failed: {0}")]
    Io(String),

    #[error("database is corrupt: {0}")]
    Corrupt(String),

    #[error("username already taken: {0}")]
    DuplicateUsername(String),

    #[error("no user with id {0}")]
    UserNotFound(u64),

    #[error("invalid name {0:?}: expected first and last name separated by a space")]
    InvalidName(String),

    #[error("shared key {0} not present")]
    MissingSharedKey(&'static str),
}

/// Lookup of registered users by username (case-insensitive)
pub trait CredentialStore: Send + Sync {
    fn find_user_by_username(&self, username: &str)
        -> Result<Option<UserCredential>, StoreError>;
}

/// Lookup of the long-lived keys shared by a pair of services
pub trait KeyRegistry: Send + Sync {
    fn shared_key(&self, pair: ServicePair) -> Result<SecretKey, StoreError>;
}
