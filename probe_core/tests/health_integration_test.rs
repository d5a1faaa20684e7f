use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use probe_core::{
    create_app, AppConfig, HealthCheckResult, HealthChecker, ProbeOptions, RunOptions,
};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tower::ServiceExt;

async fn database_reachable() -> anyhow::Result<()> {
    tokio::time::sleep(Duration::from_millis(30)).await;
    Ok(())
}

async fn cache_reachable() -> bool {
    tokio::time::sleep(Duration::from_millis(5)).await;
    true
}

async fn queue_backlog_small() -> anyhow::Result<bool> {
    anyhow::bail!("queue depth 1200 exceeds 1000")
}

fn build_checker() -> HealthChecker {
    let mut checker = HealthChecker::new();
    checker.add_info("version", "1.2.3");
    checker.add_info("region", "eu-west-1");
    checker
        .register(ProbeOptions::new(), database_reachable)
        .register(ProbeOptions::new().groups("cache"), cache_reachable)
        .register(
            ProbeOptions::new()
                .name("queue")
                .timeout(Duration::from_millis(200))
                .groups(["deep", "queue"]),
            queue_backlog_small,
        );
    checker
}

#[tokio::test]
async fn test_registered_functions_stay_callable() {
    let _checker = build_checker();

    assert!(cache_reachable().await);
    assert!(database_reachable().await.is_ok());
}

#[tokio::test]
async fn test_end_to_end_run() {
    let checker = build_checker();

    let healthy = checker.run(RunOptions::new().with_groups("cache")).await.unwrap();
    assert!(healthy.ok());
    let names: Vec<_> = healthy.checks().iter().map(|check| check.name()).collect();
    assert_eq!(names, vec!["database_reachable", "cache_reachable"]);
    assert_eq!(healthy.info()["region"], "eu-west-1");

    let degraded = checker
        .run(
            RunOptions::new()
                .with_groups(vec!["deep", "cache"])
                .timeout(Duration::from_secs(2)),
        )
        .await
        .unwrap();
    assert!(!degraded.ok());
    let failed: Vec<_> = degraded.failed_checks().collect();
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].name(), "queue");
    assert!(failed[0].error().unwrap().contains("queue depth"));
}

#[tokio::test]
async fn test_served_report_round_trips() {
    let temp_dir = TempDir::new().unwrap();
    let mut config = AppConfig::default();
    config.health.timeout_ms = 1000;
    config.probes.filesystem_paths = vec![temp_dir.path().to_path_buf()];
    config.info.insert("service".to_string(), "orders".to_string());

    let checker = HealthChecker::from_config(&config).unwrap();
    let app = create_app(Arc::new(checker), &config).unwrap();

    let request = Request::builder().uri("/health").body(Body::empty()).unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let report: HealthCheckResult = serde_json::from_slice(&bytes).unwrap();
    assert!(report.ok());
    assert_eq!(report.checks().len(), 1);
    assert_eq!(report.checks()[0].name(), "filesystem");
    assert_eq!(report.info()["service"], "orders");
}

#[tokio::test]
async fn test_unhealthy_report_status() {
    let config = AppConfig::default();
    let mut checker = HealthChecker::new();
    checker.register(ProbeOptions::new().name("always_down"), || async { false });
    let app = create_app(Arc::new(checker), &config).unwrap();

    let request = Request::builder().uri("/health").body(Body::empty()).unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn test_configured_error_code_is_served() {
    let mut config = AppConfig::default();
    config.health.error_code = 500;
    let mut checker = HealthChecker::new();
    checker.register(ProbeOptions::new().name("always_down"), || async { false });
    let app = create_app(Arc::new(checker), &config).unwrap();

    let request = Request::builder().uri("/health").body(Body::empty()).unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let report: HealthCheckResult = serde_json::from_slice(&bytes).unwrap();
    assert!(!report.ok());
    assert_eq!(report.checks()[0].name(), "always_down");
}
