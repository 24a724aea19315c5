//! Two-segment body framing
//!
//! Request and response bodies are two envelopes concatenated with no
//! delimiter. The byte length of the first segment travels in a header:
//! `X-Ticket-Length` on TGS/FS requests, `X-Key-Length` on AS/TGS responses.

use thiserror::Error;

/// Claimed username on AS requests
pub const USERNAME_HEADER: &str = "x-username";
/// Length of the leading ticket envelope in TGS/FS request bodies
pub const TICKET_LENGTH_HEADER: &str = "x-ticket-length";
/// Length of the leading session-key envelope in AS/TGS response bodies
pub const KEY_LENGTH_HEADER: &str = "x-key-length";
/// Set on 400 responses to name the header that was missing or invalid
pub const MISSING_FIELD_HEADER: &str = "x-missing-field";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum FrameError {
    #[error("length header missing")]
    MissingLength,

    #[error("length header invalid: {0:?}")]
    InvalidLength(String),

    #[error("first segment length {len} exceeds body of {body} bytes")]
    OutOfRange { len: usize, body: usize },
}

/// Parse a first-segment length header. Absent, unparsable and zero values
/// are all rejected.
pub fn parse_length(value: Option<&str>) -> Result<usize, FrameError> {
    let raw = value.ok_or(FrameError::MissingLength)?;
    match raw.trim().parse::<usize>() {
        Ok(0) => Err(FrameError::MissingLength),
        Ok(len) => Ok(len),
        Err(_) => Err(FrameError::InvalidLength(raw.to_string())),
    }
}

/// Split `body` after `first_len` bytes.
pub fn split_segments(body: &[u8], first_len: usize) -> Result<(&[u8], &[u8]), FrameError> {
    if first_len == 0 {
        return Err(FrameError::MissingLength);
    }
    if first_len > body.len() {
        return Err(FrameError::OutOfRange {
            len: first_len,
            body: body.len(),
        });
    }
    Ok(body.split_at(first_len))
}

/// Concatenate two segments; the caller sends `first.len()` in the length
/// header.
pub fn join_segments(first: &[u8], second: &[u8]) -> Vec<u8> {
    let mut body = Vec::with_capacity(first.len() + second.len());
    body.extend_from_slice(first);
    body.extend_from_slice(second);
    body
}
