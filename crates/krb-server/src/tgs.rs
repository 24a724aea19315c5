//! Ticket-granting service: TGS ticket + authenticator → service ticket

use axum::{
    body::Bytes,
    extract::State,
    http::HeaderMap,
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use std::sync::Arc;
use tracing::info;

use krb_protocol::{generate_ticket, seal, Payload};
use krb_store::{KeyRegistry, ServicePair};

use crate::error::ProtocolError;
use crate::exchange::{admit, key_and_ticket_response};
use crate::metrics::{self, ServiceMetrics};

#[derive(Clone)]
pub struct TgsState {
    /// Must hold both `as-tgs` (to open) and `tgs-fs` (to issue)
    pub keys: Arc<dyn KeyRegistry>,
    pub metrics: Arc<ServiceMetrics>,
}

impl TgsState {
    pub fn new(keys: Arc<dyn KeyRegistry>) -> Self {
        Self {
            keys,
            metrics: Arc::new(ServiceMetrics::new("tgs")),
        }
    }
}

pub fn router(state: TgsState) -> Router {
    let metrics = state.metrics.clone();
    Router::new()
        .route("/ticket", get(ticket_handler))
        .with_state(state)
        .merge(metrics::routes(metrics))
}

async fn ticket_handler(State(state): State<TgsState>, headers: HeaderMap, body: Bytes) -> Response {
    let result = grant(&state, &headers, &body);
    state.metrics.record(&result);
    match result {
        Ok(response) => response,
        Err(e) => e.into_response(),
    }
}

fn grant(state: &TgsState, headers: &HeaderMap, body: &[u8]) -> Result<Response, ProtocolError> {
    let internal = |e: krb_store::StoreError| ProtocolError::Internal(e.to_string());
    let as_tgs = state.keys.shared_key(ServicePair::AsTgs).map_err(internal)?;
    let tgs_fs = state.keys.shared_key(ServicePair::TgsFs).map_err(internal)?;

    let (tgt, auth) = admit(headers, body, &as_tgs)?;

    let service_ticket = generate_ticket(&auth.username);
    let enc_key = seal(
        &tgt.session_key,
        &Payload::SessionKey(service_ticket.session_key.clone()),
    )
    .map_err(|e| ProtocolError::Internal(e.to_string()))?;
    let enc_ticket = seal(&tgs_fs, &Payload::Ticket(service_ticket))
        .map_err(|e| ProtocolError::Internal(e.to_string()))?;

    state.metrics.ticket_issued();
    info!(username = %auth.username, "issued service ticket");
    Ok(key_and_ticket_response(&enc_key, &enc_ticket))
}
