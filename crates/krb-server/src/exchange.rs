//! Steps shared by every hop: admitting a ticket + authenticator request and
//! framing a session-key + ticket response.

use axum::http::{HeaderMap, HeaderName, HeaderValue};
use axum::response::{IntoResponse, Response};

use krb_crypto::SecretKey;
use krb_protocol::wire::{KEY_LENGTH_HEADER, TICKET_LENGTH_HEADER};
use krb_protocol::{
    join_segments, open_authenticator, open_ticket, parse_length, split_segments, validate,
    Authenticator, Ticket,
};

use crate::error::ProtocolError;

/// Decrypt-then-validate a `ticket || authenticator` request body.
///
/// `ticket_key` is the shared key the ticket was sealed under; the
/// authenticator must open under the session key carried inside it.
pub fn admit(
    headers: &HeaderMap,
    body: &[u8],
    ticket_key: &SecretKey,
) -> Result<(Ticket, Authenticator), ProtocolError> {
    let ticket_len = parse_length(header_str(headers, TICKET_LENGTH_HEADER))
        .map_err(|_| ProtocolError::BadRequest(TICKET_LENGTH_HEADER))?;
    let (enc_ticket, enc_auth) = split_segments(body, ticket_len)
        .map_err(|_| ProtocolError::BadRequest(TICKET_LENGTH_HEADER))?;

    let ticket = open_ticket(ticket_key, enc_ticket)
        .map_err(|e| ProtocolError::Unauthorized(format!("ticket: {e}")))?;

    let auth = open_authenticator(&ticket.session_key, enc_auth).map_err(|e| {
        ProtocolError::Unauthorized(format!("authenticator for {}: {e}", ticket.username))
    })?;

    if !validate(&auth, &ticket) {
        return Err(ProtocolError::Unauthorized(format!(
            "authenticator from {} does not match ticket for {} or ticket expired",
            auth.username, ticket.username
        )));
    }

    Ok((ticket, auth))
}

/// 200 response with body `enc_key || enc_ticket` and `X-Key-Length`.
pub fn key_and_ticket_response(enc_key: &[u8], enc_ticket: &[u8]) -> Response {
    let mut response = join_segments(enc_key, enc_ticket).into_response();
    response.headers_mut().insert(
        HeaderName::from_static(KEY_LENGTH_HEADER),
        HeaderValue::from(enc_key.len()),
    );
    response
}

pub fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use krb_crypto::generate_key;
    use krb_protocol::{generate_ticket, seal, Payload};
    use std::time::{Duration, SystemTime};

    fn request(ticket: &Ticket, ticket_key: &SecretKey, auth: &Authenticator) -> (HeaderMap, Vec<u8>) {
        let enc_ticket = seal(ticket_key, &Payload::Ticket(ticket.clone())).unwrap();
        let enc_auth = seal(&ticket.session_key, &Payload::Authenticator(auth.clone())).unwrap();
        let mut headers = HeaderMap::new();
        headers.insert(TICKET_LENGTH_HEADER, HeaderValue::from(enc_ticket.len()));
        (headers, join_segments(&enc_ticket, &enc_auth))
    }

    #[test]
    fn test_admits_valid_request() {
        let key = generate_key();
        let ticket = generate_ticket("jdoe42");
        let (headers, body) = request(&ticket, &key, &Authenticator::now("jdoe42"));

        let (admitted, auth) = admit(&headers, &body, &key).unwrap();
        assert_eq!(admitted, ticket);
        assert_eq!(auth.username, "jdoe42");
    }

    #[test]
    fn test_missing_length_is_bad_request() {
        let key = generate_key();
        let ticket = generate_ticket("jdoe42");
        let (_, body) = request(&ticket, &key, &Authenticator::now("jdoe42"));

        let err = admit(&HeaderMap::new(), &body, &key).unwrap_err();
        assert!(matches!(err, ProtocolError::BadRequest(TICKET_LENGTH_HEADER)));
    }

    #[test]
    fn test_oversized_length_is_bad_request() {
        let key = generate_key();
        let mut headers = HeaderMap::new();
        headers.insert(TICKET_LENGTH_HEADER, HeaderValue::from(500usize));

        let err = admit(&headers, b"short body", &key).unwrap_err();
        assert!(matches!(err, ProtocolError::BadRequest(_)));
    }

    #[test]
    fn test_wrong_shared_key_is_unauthorized() {
        let ticket = generate_ticket("jdoe42");
        let (headers, body) = request(&ticket, &generate_key(), &Authenticator::now("jdoe42"));

        let err = admit(&headers, &body, &generate_key()).unwrap_err();
        assert!(matches!(err, ProtocolError::Unauthorized(_)));
    }

    #[test]
    fn test_authenticator_under_wrong_session_key_is_unauthorized() {
        let key = generate_key();
        let ticket = generate_ticket("jdoe42");
        let enc_ticket = seal(&key, &Payload::Ticket(ticket)).unwrap();
        let enc_auth = seal(
            &generate_key(),
            &Payload::Authenticator(Authenticator::now("jdoe42")),
        )
        .unwrap();
        let mut headers = HeaderMap::new();
        headers.insert(TICKET_LENGTH_HEADER, HeaderValue::from(enc_ticket.len()));

        let err = admit(&headers, &join_segments(&enc_ticket, &enc_auth), &key).unwrap_err();
        assert!(matches!(err, ProtocolError::Unauthorized(_)));
    }

    #[test]
    fn test_mismatched_user_is_unauthorized() {
        let key = generate_key();
        let ticket = generate_ticket("jdoe42");
        let (headers, body) = request(&ticket, &key, &Authenticator::now("mallory"));

        let err = admit(&headers, &body, &key).unwrap_err();
        assert!(matches!(err, ProtocolError::Unauthorized(_)));
    }

    #[test]
    fn test_expired_ticket_is_unauthorized() {
        let key = generate_key();
        let ticket = Ticket {
            valid_until: SystemTime::now() - Duration::from_secs(1),
            ..generate_ticket("jdoe42")
        };
        let (headers, body) = request(&ticket, &key, &Authenticator::now("jdoe42"));

        let err = admit(&headers, &body, &key).unwrap_err();
        assert!(matches!(err, ProtocolError::Unauthorized(_)));
    }

    #[test]
    fn test_response_framing() {
        let response = key_and_ticket_response(b"key-envelope", b"ticket-envelope");
        assert_eq!(response.headers().get(KEY_LENGTH_HEADER).unwrap(), "12");
    }
}
