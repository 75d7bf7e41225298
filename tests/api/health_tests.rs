//! Health Check API Tests

use axum::http::StatusCode;

use crate::common::TestContext;

#[tokio::test]
async fn test_health_check_returns_ok() {
    let app = TestContext::new().app();

    let (status, body) = app.get("/health").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
}

#[tokio::test]
async fn test_liveness_probe() {
    let app = TestContext::new().app();

    let (status, body) = app.get("/health/live").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "alive");
}

/// Without Postgres or Redis configured the instance still reports ready.
#[tokio::test]
async fn test_readiness_on_in_memory_stores() {
    let app = TestContext::new().app();

    let (status, body) = app.get("/health/ready").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["checks"]["blob_store"]["backend"], "memory");
    assert_eq!(body["checks"]["websocket"]["active_connections"], 0);
    assert_eq!(body["checks"]["retention"]["timezone"], "UTC");
    assert_eq!(body["checks"]["retention"]["files_schedule"], "0 0 3 * * *");
}
