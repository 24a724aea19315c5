//! Authentication service: username → session key + TGS ticket

use axum::{
    extract::State,
    http::HeaderMap,
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use std::sync::Arc;
use tracing::{debug, info};

use krb_protocol::wire::USERNAME_HEADER;
use krb_protocol::{generate_ticket, seal, Payload};
use krb_store::{CredentialStore, KeyRegistry, ServicePair};

use crate::error::ProtocolError;
use crate::exchange::{header_str, key_and_ticket_response};
use crate::metrics::{self, ServiceMetrics};

#[derive(Clone)]
pub struct AsState {
    pub credentials: Arc<dyn CredentialStore>,
    pub keys: Arc<dyn KeyRegistry>,
    pub metrics: Arc<ServiceMetrics>,
}

impl AsState {
    pub fn new(credentials: Arc<dyn CredentialStore>, keys: Arc<dyn KeyRegistry>) -> Self {
        Self {
            credentials,
            keys,
            metrics: Arc::new(ServiceMetrics::new("as")),
        }
    }
}

pub fn router(state: AsState) -> Router {
    let metrics = state.metrics.clone();
    Router::new()
        .route("/auth", get(auth_handler))
        .with_state(state)
        .merge(metrics::routes(metrics))
}

async fn auth_handler(State(state): State<AsState>, headers: HeaderMap) -> Response {
    let result = issue(&state, &headers);
    state.metrics.record(&result);
    match result {
        Ok(response) => response,
        Err(e) => e.into_response(),
    }
}

fn issue(state: &AsState, headers: &HeaderMap) -> Result<Response, ProtocolError> {
    let username = header_str(headers, USERNAME_HEADER)
        .filter(|u| !u.is_empty())
        .ok_or(ProtocolError::BadRequest(USERNAME_HEADER))?;

    let user = match state.credentials.find_user_by_username(username) {
        Ok(Some(user)) => user,
        Ok(None) => return Err(ProtocolError::Forbidden(format!("unknown user {username}"))),
        Err(e) => return Err(ProtocolError::Forbidden(format!("lookup {username}: {e}"))),
    };
    debug!(username = %username, id = user.id, "user found");

    let tgs_key = state
        .keys
        .shared_key(ServicePair::AsTgs)
        .map_err(|e| ProtocolError::Internal(e.to_string()))?;

    let ticket = generate_ticket(username);
    let enc_key = seal(&user.key, &Payload::SessionKey(ticket.session_key.clone()))
        .map_err(|e| ProtocolError::Internal(e.to_string()))?;
    let enc_ticket =
        seal(&tgs_key, &Payload::Ticket(ticket)).map_err(|e| ProtocolError::Internal(e.to_string()))?;

    state.metrics.ticket_issued();
    info!(username = %username, "issued ticket-granting ticket");
    Ok(key_and_ticket_response(&enc_key, &enc_ticket))
}
