//! krb-cli: client side of the AS → TGS → FS exchange
//!
//! [`Client::download`] walks all three hops for one resource and writes the
//! result into the configured download directory. The `krb` binary wraps it
//! with credential prompts and adds the database admin commands.

pub mod client;

pub use client::{Client, ClientError, Download};
