//! Prometheus /metrics + liveness endpoints, mounted next to each service's
//! protocol route.
//!
//! Endpoints:
//!   GET /metrics  - Prometheus text format
//!   GET /healthz  - Liveness probe (always 200 if process is running)

use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::get, Router};
use prometheus_client::{
    encoding::text::encode,
    metrics::{counter::Counter, family::Family},
    registry::Registry,
};
use std::sync::Arc;

use crate::error::ProtocolError;

type Labels = Vec<(String, String)>;

/// Per-process counters, labelled with the service name
pub struct ServiceMetrics {
    service: &'static str,
    registry: Registry,
    requests: Family<Labels, Counter>,
    tickets_issued: Family<Labels, Counter>,
}

impl ServiceMetrics {
    pub fn new(service: &'static str) -> Self {
        let mut registry = Registry::default();
        let requests = Family::default();
        let tickets_issued = Family::default();

        registry.register(
            "krb_requests",
            "Protocol requests handled, by outcome",
            requests.clone(),
        );
        registry.register(
            "krb_tickets_issued",
            "Tickets issued by this service",
            tickets_issued.clone(),
        );

        Self {
            service,
            registry,
            requests,
            tickets_issued,
        }
    }

    pub fn service(&self) -> &'static str {
        self.service
    }

    /// Count a finished request by its outcome.
    pub fn record<T>(&self, result: &Result<T, ProtocolError>) {
        let outcome = match result {
            Ok(_) => "ok",
            Err(e) => e.outcome(),
        };
        self.requests
            .get_or_create(&vec![
                ("service".to_string(), self.service.to_string()),
                ("outcome".to_string(), outcome.to_string()),
            ])
            .inc();
    }

    pub fn ticket_issued(&self) {
        self.tickets_issued
            .get_or_create(&vec![("service".to_string(), self.service.to_string())])
            .inc();
    }

    pub fn encode_text(&self) -> Result<String, std::fmt::Error> {
        let mut body = String::new();
        encode(&mut body, &self.registry)?;
        Ok(body)
    }
}

/// Router serving `/metrics` and `/healthz` for one service.
pub fn routes(metrics: Arc<ServiceMetrics>) -> Router {
    Router::new()
        .route("/metrics", get(metrics_handler))
        .route("/healthz", get(healthz_handler))
        .with_state(metrics)
}

async fn metrics_handler(State(metrics): State<Arc<ServiceMetrics>>) -> impl IntoResponse {
    match metrics.encode_text() {
        Ok(body) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4")],
            body,
        ),
        Err(e) => {
            tracing::error!("metrics encode failed: {e}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                [("content-type", "text/plain")],
                e.to_string(),
            )
        }
    }
}

/// Liveness probe: returns 200 if the process is running.
async fn healthz_handler() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}
