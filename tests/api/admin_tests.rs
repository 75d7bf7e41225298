//! Admin API Tests

use axum::http::StatusCode;
use chrono::Duration;
use serde_json::json;

use crate::common::{upload, TestContext};
use roomkeeper::domain::RoomSettingsPatch;

#[tokio::test]
async fn test_on_demand_file_sweep() {
    let ctx = TestContext::new();
    let room = ctx
        .room(RoomSettingsPatch {
            file_days_to_live: Some(Some(3)),
            ..RoomSettingsPatch::default()
        })
        .await;
    let file = ctx
        .state
        .write_guard
        .upload_file(room.id, upload("a.bin", 10))
        .await
        .unwrap();
    ctx.clock.advance(Duration::days(4));

    let (status, report) = ctx
        .app()
        .post_json("/api/v1/admin/retention/files", json!({}))
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(report["class"], "files");
    assert_eq!(report["resources_deleted"], 1);
    assert_eq!(report["rooms_scanned"], 1);
    assert!(!ctx.store.contains_file(file.id));
}

#[tokio::test]
async fn test_unknown_class_is_bad_request() {
    let app = TestContext::new().app();

    let (status, body) = app
        .post_json("/api/v1/admin/retention/avatars", json!({}))
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], 10002);
}

#[tokio::test]
async fn test_on_demand_sweep_with_out_of_range_ttl() {
    let ctx = TestContext::new();
    let app = ctx.app();

    let (status, _) = app
        .post_json(
            "/api/v1/rooms",
            json!({ "name": "archive", "settings": { "message_days_to_live": 2_000_000_000 } }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, report) = app
        .post_json("/api/v1/admin/retention/messages", json!({}))
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(report["rooms_scanned"], 1);
    assert_eq!(report["rooms_failed"], 0);
}
