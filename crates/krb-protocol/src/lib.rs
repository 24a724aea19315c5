//! krb-protocol: the values exchanged between client, AS, TGS and FS
//!
//! Hop structure:
//! ```text
//! AS  response: seal(user_key, SessionKey)     || seal(as-tgs, Ticket)      X-Key-Length
//! TGS request:  seal(as-tgs, Ticket)           || seal(tgs_sk, Authenticator) X-Ticket-Length
//! TGS response: seal(tgs_sk, SessionKey)       || seal(tgs-fs, Ticket)      X-Key-Length
//! FS  request:  seal(tgs-fs, Ticket)           || seal(fs_sk, Authenticator)  X-Ticket-Length
//! ```

pub mod envelope;
pub mod ticket;
pub mod wire;

pub use envelope::{open, open_authenticator, open_session_key, open_ticket, seal, EnvelopeError, Payload};
pub use ticket::{generate_ticket, validate, Authenticator, Ticket, TICKET_LIFETIME};
pub use wire::{join_segments, parse_length, split_segments, FrameError};
