//! File service: service ticket + authenticator → resource bytes

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::{header, HeaderMap, HeaderValue},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use std::sync::Arc;
use tracing::info;

use krb_store::{KeyRegistry, ServicePair};

use crate::error::ProtocolError;
use crate::exchange::admit;
use crate::metrics::{self, ServiceMetrics};
use crate::resources::{download_name, ResourceError, ResourceStore};

#[derive(Clone)]
pub struct FsState {
    pub keys: Arc<dyn KeyRegistry>,
    pub resources: Arc<dyn ResourceStore>,
    pub metrics: Arc<ServiceMetrics>,
}

impl FsState {
    pub fn new(keys: Arc<dyn KeyRegistry>, resources: Arc<dyn ResourceStore>) -> Self {
        Self {
            keys,
            resources,
            metrics: Arc::new(ServiceMetrics::new("fs")),
        }
    }
}

pub fn router(state: FsState) -> Router {
    let metrics = state.metrics.clone();
    Router::new()
        .route("/download/{*resource}", get(download_handler))
        .with_state(state)
        .merge(metrics::routes(metrics))
}

async fn download_handler(
    State(state): State<FsState>,
    Path(resource): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let result = serve_resource(&state, &resource, &headers, &body).await;
    state.metrics.record(&result);
    match result {
        Ok(response) => response,
        Err(e) => e.into_response(),
    }
}

async fn serve_resource(
    state: &FsState,
    resource: &str,
    headers: &HeaderMap,
    body: &[u8],
) -> Result<Response, ProtocolError> {
    let tgs_fs = state
        .keys
        .shared_key(ServicePair::TgsFs)
        .map_err(|e| ProtocolError::Internal(e.to_string()))?;

    let (_ticket, auth) = admit(headers, body, &tgs_fs)?;

    let bytes = state
        .resources
        .read_resource(resource)
        .await
        .map_err(|e| match e {
            ResourceError::NotFound(name) => ProtocolError::NotFound(name),
            e @ ResourceError::Io { .. } => ProtocolError::Internal(e.to_string()),
        })?;

    info!(username = %auth.username, resource = %resource, size = bytes.len(), "serving resource");

    let mut response = bytes.into_response();
    response
        .headers_mut()
        .insert(header::CONTENT_DISPOSITION, attachment(resource));
    Ok(response)
}

fn attachment(resource: &str) -> HeaderValue {
    let name: String = download_name(resource)
        .chars()
        .map(|c| if c == '"' || c == '\\' || c.is_control() { '_' } else { c })
        .collect();
    HeaderValue::from_bytes(format!("attachment; filename=\"{name}\"").as_bytes())
        .unwrap_or_else(|_| HeaderValue::from_static("attachment"))
}
