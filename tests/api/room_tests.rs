//! Room API Tests

use axum::http::StatusCode;
use pretty_assertions::assert_eq;
use serde_json::json;

use crate::common::TestContext;

async fn create_room(app: &crate::common::TestApp, settings: serde_json::Value) -> String {
    let (status, body) = app
        .post_json("/api/v1/rooms", json!({ "name": "team", "settings": settings }))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    body["id"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn test_create_room_applies_overrides() {
    let app = TestContext::new().app();

    let (status, body) = app
        .post_json(
            "/api/v1/rooms",
            json!({ "name": "team", "settings": { "max_channels": 3, "file_days_to_live": 14 } }),
        )
        .await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["name"], "team");
    assert_eq!(body["settings"]["maxChannels"], 3);
    assert_eq!(body["settings"]["fileDaysToLive"], 14);
    assert!(body["settings"]["messageDaysToLive"].is_null());
}

#[tokio::test]
async fn test_create_room_rejects_negative_limit() {
    let app = TestContext::new().app();

    let (status, body) = app
        .post_json(
            "/api/v1/rooms",
            json!({ "name": "team", "settings": { "max_users": -1 } }),
        )
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], 10007);
}

#[tokio::test]
async fn test_channel_quota_rejection_body() {
    let app = TestContext::new().app();
    let room_id = create_room(&app, json!({ "max_channels": 1 })).await;
    let uri = format!("/api/v1/rooms/{}/channels", room_id);

    let (status, _) = app.post_json(&uri, json!({ "name": "general" })).await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = app.post_json(&uri, json!({ "name": "random" })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], 10008);
    assert_eq!(
        body["quota"],
        json!({ "limit": "maxChannels", "allowed": 1, "current": 1, "attempted": 1 })
    );

    let (_, channels) = app.get(&uri).await;
    assert_eq!(channels.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_unknown_channel_type_is_rejected() {
    let app = TestContext::new().app();
    let room_id = create_room(&app, json!({})).await;

    let (status, body) = app
        .post_json(
            &format!("/api/v1/rooms/{}/channels", room_id),
            json!({ "name": "general", "type": "hologram" }),
        )
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], 10007);
}

#[tokio::test]
async fn test_usage_reflects_uploads_and_members() {
    let app = TestContext::new().app();
    let room_id = create_room(&app, json!({})).await;

    let (status, file) = app
        .post_multipart(
            &format!("/api/v1/rooms/{}/files", room_id),
            "report.pdf",
            &[0u8; 64],
            &[],
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(file["size_bytes"], 64);

    let members = format!("/api/v1/rooms/{}/members", room_id);
    app.post_json(&members, json!({ "user_id": 42 })).await;
    let (status, _) = app.post_json(&members, json!({ "user_id": 42 })).await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, usage) = app.get(&format!("/api/v1/rooms/{}/usage", room_id)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(usage["usage"]["bytesUsed"], 64);
    assert_eq!(usage["usage"]["memberCount"], 1);
    assert_eq!(usage["usage"]["channelCount"], 0);
}

#[tokio::test]
async fn test_settings_patch_zero_ttl_disables_retention() {
    let app = TestContext::new().app();
    let room_id = create_room(&app, json!({ "message_days_to_live": 30 })).await;

    let (status, body) = app
        .send_json(
            "PATCH",
            &format!("/api/v1/rooms/{}/settings", room_id),
            json!({ "message_days_to_live": 0 }),
        )
        .await;

    assert_eq!(status, StatusCode::OK);
    assert!(body["settings"]["messageDaysToLive"].is_null());
}

#[tokio::test]
async fn test_delete_room_then_not_found() {
    let app = TestContext::new().app();
    let room_id = create_room(&app, json!({})).await;

    let (status, body) = app.delete(&format!("/api/v1/rooms/{}", room_id)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["id"], room_id.as_str());

    let (status, body) = app.get(&format!("/api/v1/rooms/{}", room_id)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], 10001);
}

#[tokio::test]
async fn test_malformed_id_is_bad_request() {
    let app = TestContext::new().app();

    let (status, _) = app.get("/api/v1/rooms/not-a-number").await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
}
