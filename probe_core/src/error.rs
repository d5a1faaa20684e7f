//! Error types for health check runs, configuration and serving

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::time::Duration;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, HealthError>;

/// Failures of the engine and its surroundings. A failing probe is not one
/// of these: it is reported inside the `HealthCheckResult`.
#[derive(Error, Debug)]
pub enum HealthError {
    #[error("health check run timed out after {0:?}")]
    Timeout(Duration),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Database error: {0}")]
    Database(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl HealthError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, HealthError::Timeout(_))
    }
}

impl IntoResponse for HealthError {
    fn into_response(self) -> Response {
        let (status, error_message) = match &self {
            HealthError::Timeout(_) => {
                tracing::error!("{}", self);
                let body = Json(json!({
                    "ok": null,
                    "status": "timeout",
                    "error": self.to_string(),
                }));
                return (StatusCode::GATEWAY_TIMEOUT, body).into_response();
            }
            HealthError::Config(err) => {
                tracing::error!("Configuration error: {}", err);
                (StatusCode::INTERNAL_SERVER_ERROR, "Configuration error".to_string())
            }
            HealthError::Database(msg) => {
                tracing::error!("Database error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, "Database error".to_string())
            }
            HealthError::IoError(err) => {
                tracing::error!("IO error: {:?}", err);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error".to_string())
            }
            HealthError::Other(err) => {
                tracing::error!("Unexpected error: {:?}", err);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error".to_string())
            }
        };

        let body = Json(json!({
            "error": error_message,
            "status": status.as_u16(),
        }));

        (status, body).into_response()
    }
}

impl From<sqlx::Error> for HealthError {
    fn from(err: sqlx::Error) -> Self {
        HealthError::Database(err.to_string())
    }
}
