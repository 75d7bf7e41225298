//! Upload saga, attachments and manual deletion.

use pretty_assertions::assert_eq;

use roomkeeper::domain::FileStatus;
use roomkeeper::shared::error::AppError;

use crate::common::{limits, upload, TestContext};

#[tokio::test]
async fn test_upload_activates_file_and_stores_blob() {
    let ctx = TestContext::new();
    let room = ctx.room(limits(1_000, 100, 5, 5)).await;

    let file = ctx
        .state
        .write_guard
        .upload_file(room.id, upload("notes.txt", 12))
        .await
        .unwrap();

    assert_eq!(file.status, FileStatus::Active);
    assert!(ctx.blobs.contains(&file.key));
    assert_eq!(ctx.state.rooms.get_file(file.id).await.unwrap(), file);
}

#[tokio::test]
async fn test_failed_blob_upload_releases_reserved_bytes() {
    let ctx = TestContext::new();
    let room = ctx.room(limits(100, 100, 5, 5)).await;

    ctx.blobs.fail_uploads(true);
    let err = ctx
        .state
        .write_guard
        .upload_file(room.id, upload("a.bin", 80))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::BlobStore(_)));
    assert_eq!(ctx.store.file_count(room.id), 0);

    // the reservation is gone, so the full quota is available again
    ctx.blobs.fail_uploads(false);
    ctx.state
        .write_guard
        .upload_file(room.id, upload("b.bin", 100))
        .await
        .unwrap();
}

#[tokio::test]
async fn test_failed_activation_deletes_uploaded_blob() {
    let ctx = TestContext::new();
    let room = ctx.room(limits(1_000, 100, 5, 5)).await;

    ctx.store.fail_file_activate(true);
    ctx.state
        .write_guard
        .upload_file(room.id, upload("a.bin", 10))
        .await
        .unwrap_err();

    assert_eq!(ctx.store.file_count(room.id), 0);
    assert!(ctx.blobs.is_empty());
    assert_eq!(ctx.blobs.delete_calls().len(), 1);
}

#[tokio::test]
async fn test_failed_message_insert_removes_attachment() {
    let ctx = TestContext::new();
    let room = ctx.room(limits(1_000, 100, 5, 5)).await;
    let channel_id = ctx.channel(room.id, "general").await;

    ctx.store.fail_message_create(true);
    ctx.state
        .write_guard
        .post_message(channel_id, 1, "see attached", Some(upload("a.bin", 10)))
        .await
        .unwrap_err();

    assert_eq!(ctx.store.file_count(room.id), 0);
    assert_eq!(ctx.store.message_count(room.id), 0);
    assert!(ctx.blobs.is_empty());
}

#[tokio::test]
async fn test_attachment_counts_toward_room_bytes() {
    let ctx = TestContext::new();
    let room = ctx.room(limits(50, 50, 5, 5)).await;
    let channel_id = ctx.channel(room.id, "general").await;

    let posted = ctx
        .state
        .write_guard
        .post_message(channel_id, 1, "", Some(upload("a.bin", 30)))
        .await
        .unwrap();
    assert_eq!(posted.room_id, room.id);
    assert!(posted.file.is_some());
    assert_eq!(ctx.store.upload_count(), 1);

    let err = ctx
        .state
        .write_guard
        .upload_file(room.id, upload("b.bin", 30))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::QuotaExceeded(_)));
}

#[tokio::test]
async fn test_webhook_message_has_no_author() {
    let ctx = TestContext::new();
    let room = ctx.room(limits(1_000, 100, 5, 5)).await;
    let channel_id = ctx.channel(room.id, "alerts").await;
    let webhook = ctx
        .state
        .rooms
        .create_webhook(channel_id, "ci")
        .await
        .unwrap();

    let posted = ctx
        .state
        .write_guard
        .post_webhook_message(webhook.id, "build passed", None)
        .await
        .unwrap();

    assert_eq!(posted.message.webhook_id, Some(webhook.id));
    assert_eq!(posted.message.author_id, None);
    assert!(posted.message.is_webhook_message());
}

#[tokio::test]
async fn test_delete_message_purges_attachment_blob() {
    let ctx = TestContext::new();
    let room = ctx.room(limits(1_000, 100, 5, 5)).await;
    let channel_id = ctx.channel(room.id, "general").await;
    let posted = ctx
        .state
        .write_guard
        .post_message(channel_id, 1, "hi", Some(upload("a.bin", 10)))
        .await
        .unwrap();
    let file = posted.file.unwrap();

    let outcome = ctx
        .state
        .rooms
        .delete_message(posted.message.id)
        .await
        .unwrap();

    assert_eq!(outcome.deleted, 1);
    assert!(outcome.orphans.is_empty());
    assert!(!ctx.blobs.contains(&file.key));
    assert!(!ctx.store.contains_file(file.id));
}

#[tokio::test]
async fn test_delete_room_reports_orphans() {
    let ctx = TestContext::new();
    let room = ctx.room(limits(1_000, 100, 5, 5)).await;
    let kept = ctx
        .state
        .write_guard
        .upload_file(room.id, upload("a.bin", 10))
        .await
        .unwrap();
    let stuck = ctx
        .state
        .write_guard
        .upload_file(room.id, upload("b.bin", 10))
        .await
        .unwrap();
    ctx.blobs.fail_delete_for(&stuck.key);

    let deletion = ctx.state.rooms.delete_room(room.id).await.unwrap();

    assert_eq!(deletion.blobs.attempted, 2);
    assert_eq!(deletion.blobs.deleted, 1);
    assert_eq!(deletion.blobs.orphans.len(), 1);
    assert_eq!(deletion.blobs.orphans[0].key, stuck.key);
    assert!(!ctx.blobs.contains(&kept.key));
    assert!(matches!(
        ctx.state.rooms.get_room(room.id).await,
        Err(AppError::NotFound(_))
    ));
}
