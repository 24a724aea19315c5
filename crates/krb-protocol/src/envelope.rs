//! Sealed envelopes: a [`Payload`] serialized to JSON and encrypted under a
//! 256-bit key.
//!
//! Envelope format: `[24-byte nonce][ciphertext][16-byte tag]`, where the
//! plaintext is the adjacently tagged JSON encoding of the payload:
//! ```text
//! {"kind":"ticket","value":{"username":..,"session_key":..,"valid_until":..}}
//! {"kind":"authenticator","value":{"username":..,"issued_at":..}}
//! {"kind":"session_key","value":"<base64>"}
//! ```
//! Opening checks the tag first, then the payload shape, so a caller asking
//! for a ticket can never be handed an authenticator or a bare key.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use krb_crypto::{decrypt, encrypt, SecretKey};

use crate::ticket::{Authenticator, Ticket};

/// Every value that is ever sealed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Payload {
    Ticket(Ticket),
    Authenticator(Authenticator),
    SessionKey(SecretKey),
}

impl Payload {
    pub fn kind(&self) -> &'static str {
        match self {
            Payload::Ticket(_) => "ticket",
            Payload::Authenticator(_) => "authenticator",
            Payload::SessionKey(_) => "session_key",
        }
    }
}

#[derive(Debug, Error)]
pub enum EnvelopeError {
    #[error("sealing {kind} failed: {reason}")]
    Seal { kind: &'static str, reason: String },

    /// Short input, failed tag verification, or undecodable plaintext.
    #[error("envelope could not be decrypted")]
    Decryption,

    #[error("expected {expected} payload, found {found}")]
    UnexpectedPayload {
        expected: &'static str,
        found: &'static str,
    },
}

/// Serialize and encrypt `payload` under `key` with a fresh random nonce.
pub fn seal(key: &SecretKey, payload: &Payload) -> Result<Vec<u8>, EnvelopeError> {
    let plaintext = serde_json::to_vec(payload).map_err(|e| EnvelopeError::Seal {
        kind: payload.kind(),
        reason: e.to_string(),
    })?;
    encrypt(key, &plaintext).map_err(|e| EnvelopeError::Seal {
        kind: payload.kind(),
        reason: e.to_string(),
    })
}

/// Decrypt and deserialize an envelope produced by [`seal`].
pub fn open(key: &SecretKey, envelope: &[u8]) -> Result<Payload, EnvelopeError> {
    let plaintext = decrypt(key, envelope).map_err(|e| {
        debug!(len = envelope.len(), "envelope decrypt failed: {e}");
        EnvelopeError::Decryption
    })?;
    serde_json::from_slice(&plaintext).map_err(|e| {
        debug!("envelope payload malformed: {e}");
        EnvelopeError::Decryption
    })
}

pub fn open_ticket(key: &SecretKey, envelope: &[u8]) -> Result<Ticket, EnvelopeError> {
    match open(key, envelope)? {
        Payload::Ticket(ticket) => Ok(ticket),
        other => Err(unexpected("ticket", &other)),
    }
}

pub fn open_authenticator(
    key: &SecretKey,
    envelope: &[u8],
) -> Result<Authenticator, EnvelopeError> {
    match open(key, envelope)? {
        Payload::Authenticator(auth) => Ok(auth),
        other => Err(unexpected("authenticator", &other)),
    }
}

pub fn open_session_key(key: &SecretKey, envelope: &[u8]) -> Result<SecretKey, EnvelopeError> {
    match open(key, envelope)? {
        Payload::SessionKey(session_key) => Ok(session_key),
        other => Err(unexpected("session_key", &other)),
    }
}

fn unexpected(expected: &'static str, found: &Payload) -> EnvelopeError {
    EnvelopeError::UnexpectedPayload {
        expected,
        found: found.kind(),
    }
}
