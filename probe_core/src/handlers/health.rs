//! HTTP endpoint exposing health check runs

use crate::{
    error::HealthError,
    health::{Groups, HealthChecker, RunOptions},
};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// How the endpoint runs the checker and maps the outcome to a response.
#[derive(Debug, Clone)]
pub struct EndpointConfig {
    pub timeout: Option<Duration>,
    pub with_groups: Groups,
    pub skip_required: bool,
    /// Send the serialized report as the body; otherwise the body is empty.
    pub return_results: bool,
    pub success_code: StatusCode,
    pub error_code: StatusCode,
    pub timeout_code: StatusCode,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            timeout: None,
            with_groups: Groups::none(),
            skip_required: false,
            return_results: true,
            success_code: StatusCode::OK,
            error_code: StatusCode::SERVICE_UNAVAILABLE,
            timeout_code: StatusCode::GATEWAY_TIMEOUT,
        }
    }
}

#[derive(Clone)]
struct EndpointState {
    checker: Arc<HealthChecker>,
    config: Arc<EndpointConfig>,
}

#[derive(Debug, Default, Deserialize)]
pub struct HealthQuery {
    /// Comma separated, added to the configured groups.
    pub groups: Option<String>,
    pub skip_required: Option<bool>,
}

pub fn health_routes(checker: Arc<HealthChecker>, config: EndpointConfig) -> Router {
    let state = EndpointState {
        checker,
        config: Arc::new(config),
    };

    Router::new()
        .route("/health", get(handle_health))
        .route("/health/:group", get(handle_group_health))
        .with_state(state)
}

async fn handle_health(
    State(state): State<EndpointState>,
    Query(query): Query<HealthQuery>,
) -> Response {
    info!("GET /health - Running health checks");
    run_and_respond(&state, query, None).await
}

async fn handle_group_health(
    State(state): State<EndpointState>,
    Path(group): Path<String>,
    Query(query): Query<HealthQuery>,
) -> Response {
    info!("GET /health/{} - Running health checks", group);
    run_and_respond(&state, query, Some(group)).await
}

async fn run_and_respond(
    state: &EndpointState,
    query: HealthQuery,
    path_group: Option<String>,
) -> Response {
    let config = &state.config;

    let mut groups = config.with_groups.clone();
    let requested = query
        .groups
        .iter()
        .flat_map(|list| list.split(','))
        .map(str::trim)
        .map(str::to_string)
        .chain(path_group);
    for group in requested {
        if !groups.iter().any(|existing| existing == group) {
            groups.push(group);
        }
    }

    let mut options = RunOptions::new()
        .with_groups(groups)
        .skip_required(query.skip_required.unwrap_or(config.skip_required));
    if let Some(timeout) = config.timeout {
        options = options.timeout(timeout);
    }

    match state.checker.run(options).await {
        Ok(result) => {
            let status = if result.ok() {
                config.success_code
            } else {
                warn!("System health is unhealthy");
                config.error_code
            };

            if config.return_results {
                (status, Json(result)).into_response()
            } else {
                status.into_response()
            }
        }
        Err(err @ HealthError::Timeout(_)) => {
            warn!("Health check did not finish in time: {}", err);
            let body = Json(serde_json::json!({
                "ok": null,
                "status": "timeout",
                "error": err.to_string(),
            }));
            (config.timeout_code, body).into_response()
        }
        Err(err) => err.into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::health::ProbeOptions;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use tower::ServiceExt;

    async fn passing() {}

    async fn failing() -> bool {
        false
    }

    fn setup_checker() -> Arc<HealthChecker> {
        let mut checker = HealthChecker::new();
        checker.add_info("version", "1.2.3");
        checker.register(ProbeOptions::new().name("app"), passing);
        checker.register(ProbeOptions::new().name("cache").groups("deep"), failing);
        checker.register(
            ProbeOptions::new().name("slow").groups("slow"),
            || async {
                tokio::time::sleep(Duration::from_secs(5)).await;
            },
        );
        Arc::new(checker)
    }

    async fn get(app: Router, uri: &str) -> (StatusCode, serde_json::Value) {
        let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = if bytes.is_empty() {
            serde_json::Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, body)
    }

    #[tokio::test]
    async fn test_health_endpoint_ok() {
        let app = health_routes(setup_checker(), EndpointConfig::default());

        let (status, body) = get(app, "/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["ok"], true);
        assert_eq!(body["info"]["version"], "1.2.3");
        assert_eq!(body["checks"].as_array().unwrap().len(), 1);
        assert_eq!(body["checks"][0]["name"], "app");
    }

    #[tokio::test]
    async fn test_group_path_selects_group() {
        let app = health_routes(setup_checker(), EndpointConfig::default());

        let (status, body) = get(app, "/health/deep").await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["ok"], false);
        let names: Vec<_> = body["checks"]
            .as_array()
            .unwrap()
            .iter()
            .map(|check| check["name"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(names, vec!["app", "cache"]);
    }

    #[tokio::test]
    async fn test_query_parameters_override_selection() {
        let app = health_routes(setup_checker(), EndpointConfig::default());

        let (status, body) = get(app, "/health?groups=deep&skip_required=true").await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["checks"].as_array().unwrap().len(), 1);
        assert_eq!(body["checks"][0]["name"], "cache");
    }

    #[tokio::test]
    async fn test_timeout_maps_to_distinct_status() {
        let config = EndpointConfig {
            timeout: Some(Duration::from_millis(50)),
            ..EndpointConfig::default()
        };
        let app = health_routes(setup_checker(), config);

        let (status, body) = get(app, "/health/slow").await;
        assert_eq!(status, StatusCode::GATEWAY_TIMEOUT);
        assert_eq!(body["status"], "timeout");
        assert!(body["ok"].is_null());
    }

    #[tokio::test]
    async fn test_results_can_be_omitted() {
        let config = EndpointConfig {
            return_results: false,
            success_code: StatusCode::NO_CONTENT,
            ..EndpointConfig::default()
        };
        let app = health_routes(setup_checker(), config);

        let (status, body) = get(app, "/health").await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        assert!(body.is_null());
    }

    #[tokio::test]
    async fn test_configured_groups_are_not_repeated() {
        let config = EndpointConfig {
            with_groups: "deep".into(),
            ..EndpointConfig::default()
        };
        let checker = setup_checker();
        assert_eq!(checker.probes_for(&"deep".into(), false).len(), 2);
        let app = health_routes(checker, config);

        let (_, body) = get(app, "/health/deep").await;
        assert_eq!(body["checks"].as_array().unwrap().len(), 2);
    }
}
