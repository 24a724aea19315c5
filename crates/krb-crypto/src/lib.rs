//! krb-crypto: key material and authenticated encryption for the krb protocol
//!
//! Every secret exchanged between the client, AS, TGS and FS is a 256-bit
//! [`SecretKey`]:
//! ```text
//! user key      = SHA-256("@KERBEROS" || username || password)
//! shared keys   = random, generated once per service pair (as-tgs, tgs-fs)
//! session keys  = random, generated per issued ticket
//! ```
//!
//! Ciphertexts are `[24-byte nonce][ciphertext][16-byte Poly1305 tag]`.

pub mod aead;
pub mod kdf;
pub mod keys;

pub use aead::{decrypt, encrypt, AeadError};
pub use kdf::{derive_key, REALM};
pub use keys::{generate_key, KeyDecodeError, SecretKey};

/// Size of every key in bytes (256-bit)
pub const KEY_SIZE: usize = 32;

/// Size of an XChaCha20-Poly1305 nonce (192-bit)
pub const NONCE_SIZE: usize = 24;

/// Size of a Poly1305 authentication tag
pub const TAG_SIZE: usize = 16;
