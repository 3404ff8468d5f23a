//! Health Check API Tests

use axum::http::StatusCode;
use pretty_assertions::assert_eq;

use crate::common::TestApp;

#[tokio::test]
async fn test_health_check_returns_ok() {
    let app = TestApp::new().await;

    let response = app.get("/health").await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["status"], "healthy");
}

#[tokio::test]
async fn test_liveness_probe() {
    let app = TestApp::new().await;

    let response = app.get("/health/live").await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["status"], "alive");
}

#[tokio::test]
async fn test_readiness_reports_hub_stats() {
    let app = TestApp::new().await;
    let (handle, _outbound) = app.state.hub.new_connection(1);
    app.state.hub.register(handle).await.unwrap();

    let response = app.get("/health/ready").await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["status"], "healthy");
    assert_eq!(response.body["hub"]["active_connections"], 1);
    assert_eq!(response.body["hub"]["active_rooms"], 0);
}

#[tokio::test]
async fn test_readiness_fails_when_hub_stopped() {
    let app = TestApp::with_stopped_hub().await;

    let response = app.get("/health/ready").await;

    assert_eq!(response.status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(response.body["hub"]["status"], "unhealthy");
}

#[tokio::test]
async fn test_metrics_endpoint_exposes_hub_gauges() {
    let app = TestApp::new().await;
    app.get("/health").await;

    let response = app.get("/metrics").await;

    assert_eq!(response.status, StatusCode::OK);
    let text = response.body.as_str().unwrap();
    assert!(text.contains("chat_hub_http_requests_total"));
}
