//! Tickets, authenticators, and the freshness check that binds them

use serde::{Deserialize, Serialize};
use std::time::{Duration, SystemTime};

use krb_crypto::{generate_key, SecretKey};

/// How long an issued ticket stays valid
pub const TICKET_LIFETIME: Duration = Duration::from_secs(60 * 60);

/// A time-bounded capability: whoever can seal an authenticator under
/// `session_key` before `valid_until` is `username`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ticket {
    pub username: String,
    pub session_key: SecretKey,
    pub valid_until: SystemTime,
}

/// Freshness proof sealed by the client under a ticket's session key
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Authenticator {
    pub username: String,
    pub issued_at: SystemTime,
}

impl Authenticator {
    /// Authenticator stamped with the current time.
    pub fn now(username: &str) -> Self {
        Self {
            username: username.to_string(),
            issued_at: SystemTime::now(),
        }
    }
}

/// Issue a ticket for `username` with a fresh session key, valid for
/// [`TICKET_LIFETIME`].
pub fn generate_ticket(username: &str) -> Ticket {
    Ticket {
        username: username.to_string(),
        session_key: generate_key(),
        valid_until: SystemTime::now() + TICKET_LIFETIME,
    }
}

/// Accept `auth` for `ticket` iff the usernames match and the authenticator
/// was issued strictly before the ticket expires.
pub fn validate(auth: &Authenticator, ticket: &Ticket) -> bool {
    auth.username == ticket.username && auth.issued_at < ticket.valid_until
}
