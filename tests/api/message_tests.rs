//! Message and Webhook API Tests

use axum::http::StatusCode;
use pretty_assertions::assert_eq;
use serde_json::json;

use crate::common::{TestApp, TestContext};

/// Create a room with one channel and return the channel ID.
async fn channel(app: &TestApp, settings: serde_json::Value) -> String {
    let (_, room) = app
        .post_json("/api/v1/rooms", json!({ "name": "team", "settings": settings }))
        .await;
    let (status, channel) = app
        .post_json(
            &format!("/api/v1/rooms/{}/channels", room["id"].as_str().unwrap()),
            json!({ "name": "general" }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    channel["id"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn test_send_and_fetch_message() {
    let app = TestContext::new().app();
    let channel_id = channel(&app, json!({})).await;

    let (status, sent) = app
        .post_json(
            &format!("/api/v1/channels/{}/messages", channel_id),
            json!({ "content": "hello", "author_id": 7 }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(sent["author_id"], "7");

    let (status, fetched) = app
        .get(&format!("/api/v1/messages/{}", sent["id"].as_str().unwrap()))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched["content"], "hello");
    assert_eq!(fetched["channel_id"], channel_id.as_str());
}

#[tokio::test]
async fn test_empty_message_without_attachment_is_rejected() {
    let app = TestContext::new().app();
    let channel_id = channel(&app, json!({})).await;

    let (status, body) = app
        .post_json(
            &format!("/api/v1/channels/{}/messages", channel_id),
            json!({ "content": "   ", "author_id": 7 }),
        )
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], 10007);
}

#[tokio::test]
async fn test_oversized_attachment_rejected() {
    let app = TestContext::new().app();
    let channel_id = channel(&app, json!({ "single_file_bytes_allowed": 8 })).await;

    let (status, body) = app
        .post_multipart(
            &format!("/api/v1/channels/{}/attachments", channel_id),
            "big.bin",
            &[1u8; 9],
            &[("content", "too big"), ("author_id", "7")],
        )
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["quota"]["limit"], "singleFileBytesAllowed");
    assert_eq!(body["quota"]["attempted"], 9);
}

#[tokio::test]
async fn test_attachment_message_and_delete() {
    let ctx = TestContext::new();
    let app = ctx.app();
    let channel_id = channel(&app, json!({})).await;

    let (status, sent) = app
        .post_multipart(
            &format!("/api/v1/channels/{}/attachments", channel_id),
            "cat.png",
            &[1u8; 16],
            &[("author_id", "7")],
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(sent["file"]["size_bytes"], 16);
    assert_eq!(ctx.blobs.len(), 1);

    let message_uri = format!("/api/v1/messages/{}", sent["id"].as_str().unwrap());
    let (_, fetched) = app.get(&message_uri).await;
    assert_eq!(fetched["file"]["id"], sent["file"]["id"]);

    let (status, deleted) = app
        .delete(&message_uri)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(deleted["blobs_deleted"], 1);
    assert!(ctx.blobs.is_empty());

    let (status, _) = app
        .get(&format!("/api/v1/files/{}", sent["file"]["id"].as_str().unwrap()))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_webhook_posts_into_its_channel() {
    let app = TestContext::new().app();
    let channel_id = channel(&app, json!({})).await;

    let (status, webhook) = app
        .post_json(
            &format!("/api/v1/channels/{}/webhooks", channel_id),
            json!({ "name": "ci" }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, sent) = app
        .post_json(
            &format!("/api/v1/webhooks/{}/messages", webhook["id"].as_str().unwrap()),
            json!({ "content": "deploy finished" }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(sent["channel_id"], channel_id.as_str());
    assert_eq!(sent["webhook_id"], webhook["id"]);
    assert!(sent.get("author_id").is_none());
}

#[tokio::test]
async fn test_unknown_webhook_is_not_found() {
    let app = TestContext::new().app();

    let (status, _) = app
        .post_json("/api/v1/webhooks/12345/messages", json!({ "content": "x" }))
        .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
}
