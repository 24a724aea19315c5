//! krb-server: the AS, TGS and FS HTTP services
//!
//! Each service is an axum [`Router`] built from an immutable, `Arc`-shared
//! state holding its collaborators. Every router also answers `/healthz` and
//! `/metrics`.
//!
//! | service | route                      | ticket sealed under |
//! |---------|----------------------------|---------------------|
//! | AS      | `GET /auth`                | `as-tgs`            |
//! | TGS     | `GET /ticket`              | `tgs-fs`            |
//! | FS      | `GET /download/{*resource}`| (consumes `tgs-fs`) |

pub mod auth;
pub mod error;
pub mod exchange;
pub mod fs;
pub mod metrics;
pub mod resources;
pub mod tgs;

pub use auth::AsState;
pub use error::ProtocolError;
pub use fs::FsState;
pub use metrics::ServiceMetrics;
pub use resources::{DirResourceStore, ResourceError, ResourceStore};
pub use tgs::TgsState;

use anyhow::Result;
use axum::Router;
use tracing::info;

/// Bind `addr` and serve `app` until ctrl-c.
pub async fn serve(addr: &str, app: Router) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| anyhow::anyhow!("bind {addr}: {e}"))?;

    info!(addr = %addr, "listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| anyhow::anyhow!("server: {e}"))
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("installing ctrl-c handler: {e}");
        std::future::pending::<()>().await;
    }
    info!("shutdown signal received");
}
