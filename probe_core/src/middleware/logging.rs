//! Request logging for the health endpoint

use axum::{body::Body, Router};
use http::{Request, Response, StatusCode};
use std::time::Duration;
use tower_http::classify::ServerErrorsFailureClass;
use tower_http::trace::TraceLayer;
use tracing::{info_span, Span};

/// Wraps `router` in a `TraceLayer`. Responses carrying one of
/// `verdict_codes` (the endpoint's unhealthy and timeout statuses) are
/// logged as degraded reports rather than as server errors.
pub fn with_request_logging(router: Router, verdict_codes: [StatusCode; 2]) -> Router {
    router.layer(
        TraceLayer::new_for_http()
            .make_span_with(|request: &Request<Body>| {
                info_span!(
                    "http_request",
                    method = %request.method(),
                    path = %request.uri().path(),
                    query = ?request.uri().query(),
                )
            })
            .on_request(|request: &Request<Body>, _span: &Span| {
                tracing::debug!(
                    "started processing request {} {}",
                    request.method(),
                    request.uri().path()
                );
            })
            .on_response(move |response: &Response<Body>, latency: Duration, _span: &Span| {
                let status = response.status();
                let latency_ms = latency.as_millis();

                if status.is_success() {
                    tracing::info!(status = status.as_u16(), latency_ms = latency_ms, "health report served");
                } else if is_health_verdict(status, &verdict_codes) {
                    tracing::warn!(status = status.as_u16(), latency_ms = latency_ms, "degraded health report served");
                } else if status.is_client_error() {
                    tracing::warn!(status = status.as_u16(), latency_ms = latency_ms, "client error response");
                } else {
                    tracing::error!(status = status.as_u16(), latency_ms = latency_ms, "server error response");
                }
            })
            .on_failure(|error: ServerErrorsFailureClass, latency: Duration, _span: &Span| {
                tracing::debug!(
                    latency_ms = latency.as_millis(),
                    error = ?error,
                    "request classified as failure"
                );
            }),
    )
}

fn is_health_verdict(status: StatusCode, verdict_codes: &[StatusCode]) -> bool {
    verdict_codes.contains(&status)
}
