//! Health check aggregation: register probes, run a selection of them
//! concurrently under one deadline and get back a single report.

pub mod config;
pub mod error;
pub mod handlers;
pub mod health;
pub mod middleware;

pub use crate::config::AppConfig;
pub use error::{HealthError, Result};
pub use handlers::{health_routes, EndpointConfig};
pub use health::{
    CallableProbe, CheckOutcome, Groups, HealthCheckResult, HealthChecker, Info, IntoCheckOutcome,
    Probe, ProbeOptions, ProbeRegistry, ProbeResult, RunOptions, Verdict,
};
pub use middleware::logging::with_request_logging;

use axum::Router;
use std::{net::SocketAddr, sync::Arc};
use tokio::signal;
use tracing::info;

/// Health routes for `checker` with request logging, configured from `config`.
pub fn create_app(checker: Arc<HealthChecker>, config: &AppConfig) -> Result<Router> {
    let endpoint = config.endpoint_config()?;
    let verdict_codes = [endpoint.error_code, endpoint.timeout_code];
    Ok(with_request_logging(health_routes(checker, endpoint), verdict_codes))
}

pub async fn run_server(app: Router, addr: SocketAddr) -> Result<()> {
    info!("Starting health endpoint on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, starting graceful shutdown");
        },
        _ = terminate => {
            info!("Received SIGTERM, starting graceful shutdown");
        },
    }
}
