//! Retention sweeps over the in-memory stores.

use std::time::Duration;

use chrono::Duration as Days;
use pretty_assertions::assert_eq;

use roomkeeper::domain::{ResourceClass, RoomSettingsPatch};
use roomkeeper::retention::SweepReport;
use roomkeeper::shared::error::AppError;

use crate::common::{epoch, test_retention, upload, TestContext};

fn ttl(files: Option<i32>, messages: Option<i32>) -> RoomSettingsPatch {
    RoomSettingsPatch {
        file_days_to_live: Some(files),
        message_days_to_live: Some(messages),
        ..RoomSettingsPatch::default()
    }
}

async fn sweep(ctx: &TestContext, class: ResourceClass) -> SweepReport {
    ctx.state
        .sweeper
        .run_cycle(class, ctx.shutdown.subscribe())
        .await
        .unwrap()
}

#[tokio::test]
async fn test_expired_file_removed_then_nothing_left() {
    let ctx = TestContext::new();
    let room = ctx.room(ttl(Some(30), None)).await;
    let file = ctx
        .state
        .write_guard
        .upload_file(room.id, upload("old.bin", 10))
        .await
        .unwrap();

    ctx.clock.advance(Days::days(31));
    let first = sweep(&ctx, ResourceClass::Files).await;

    assert_eq!(first.resources_deleted, 1);
    assert_eq!(first.blob_deletes_attempted, 1);
    assert!(first.orphaned_blobs.is_empty());
    assert!(!ctx.store.contains_file(file.id));
    assert!(!ctx.blobs.contains(&file.key));

    let second = sweep(&ctx, ResourceClass::Files).await;
    assert_eq!(second.resources_deleted, 0);
    assert_eq!(second.blob_deletes_attempted, 0);
}

#[tokio::test]
async fn test_failed_blob_delete_still_removes_metadata() {
    let ctx = TestContext::new();
    let room = ctx.room(ttl(Some(30), None)).await;
    let file = ctx
        .state
        .write_guard
        .upload_file(room.id, upload("old.bin", 10))
        .await
        .unwrap();
    ctx.blobs.fail_delete_for(&file.key);

    ctx.clock.advance(Days::days(31));
    let report = sweep(&ctx, ResourceClass::Files).await;

    assert_eq!(report.resources_deleted, 1);
    assert_eq!(report.orphaned_blobs, vec![file.key.clone()]);
    assert!(ctx.blobs.contains(&file.key));
    assert!(matches!(
        ctx.state.rooms.get_file(file.id).await,
        Err(AppError::NotFound(_))
    ));
}

#[tokio::test]
async fn test_room_batches_are_paced() {
    let ctx = TestContext::with_retention(test_retention(10));
    for _ in 0..25 {
        ctx.room(ttl(None, Some(7))).await;
    }

    let report = sweep(&ctx, ResourceClass::Messages).await;

    assert_eq!(report.rooms_scanned, 25);
    assert_eq!(report.room_batches, 3);
    assert!(!report.cancelled);
    assert_eq!(
        ctx.pacer.pauses(),
        vec![Duration::from_millis(25); 3]
    );
}

#[tokio::test]
async fn test_file_at_cutoff_is_kept() {
    let ctx = TestContext::new();
    let room = ctx.room(ttl(Some(1), None)).await;
    let file = ctx
        .state
        .write_guard
        .upload_file(room.id, upload("edge.bin", 10))
        .await
        .unwrap();

    ctx.clock.set(epoch() + Days::days(1));
    let report = sweep(&ctx, ResourceClass::Files).await;
    assert_eq!(report.resources_deleted, 0);
    assert!(ctx.store.contains_file(file.id));

    ctx.clock.advance(Days::seconds(1));
    let report = sweep(&ctx, ResourceClass::Files).await;
    assert_eq!(report.resources_deleted, 1);
}

#[tokio::test]
async fn test_fresh_file_untouched_and_blob_deleted_once() {
    let ctx = TestContext::new();
    let room = ctx.room(ttl(Some(30), None)).await;
    let guard = &ctx.state.write_guard;
    let old = guard.upload_file(room.id, upload("old.bin", 10)).await.unwrap();
    let fresh = guard.upload_file(room.id, upload("new.bin", 10)).await.unwrap();
    ctx.store
        .set_file_created_at(old.id, epoch() - Days::days(40));

    let report = sweep(&ctx, ResourceClass::Files).await;
    let again = sweep(&ctx, ResourceClass::Files).await;

    assert_eq!(report.resources_deleted, 1);
    assert_eq!(again.resources_deleted, 0);
    assert_eq!(ctx.blobs.delete_calls(), vec![old.key.clone()]);
    assert!(ctx.store.contains_file(fresh.id));
    assert!(ctx.blobs.contains(&fresh.key));
}

#[tokio::test]
async fn test_rooms_without_ttl_are_skipped() {
    let ctx = TestContext::new();
    let room = ctx.room(ttl(None, None)).await;
    let file = ctx
        .state
        .write_guard
        .upload_file(room.id, upload("keep.bin", 10))
        .await
        .unwrap();

    ctx.clock.advance(Days::days(3650));
    let report = sweep(&ctx, ResourceClass::Files).await;

    assert_eq!(report.rooms_scanned, 1);
    assert_eq!(report.rooms_skipped, 1);
    assert!(ctx.store.contains_file(file.id));
}

#[tokio::test]
async fn test_expired_message_takes_its_attachment() {
    let ctx = TestContext::new();
    let room = ctx.room(ttl(None, Some(7))).await;
    let channel_id = ctx.channel(room.id, "general").await;
    let posted = ctx
        .state
        .write_guard
        .post_message(channel_id, 1, "old news", Some(upload("a.bin", 10)))
        .await
        .unwrap();
    let file = posted.file.unwrap();

    ctx.clock.advance(Days::days(8));
    let report = sweep(&ctx, ResourceClass::Messages).await;

    assert_eq!(report.resources_deleted, 1);
    assert!(!ctx.store.contains_message(posted.message.id));
    assert!(!ctx.store.contains_file(file.id));
    assert_eq!(ctx.store.upload_count(), 0);
    assert!(!ctx.blobs.contains(&file.key));
}

#[tokio::test]
async fn test_expired_attachment_leaves_message_text() {
    let ctx = TestContext::new();
    let room = ctx.room(ttl(Some(7), None)).await;
    let channel_id = ctx.channel(room.id, "general").await;
    let posted = ctx
        .state
        .write_guard
        .post_message(channel_id, 1, "caption", Some(upload("a.bin", 10)))
        .await
        .unwrap();

    ctx.clock.advance(Days::days(8));
    sweep(&ctx, ResourceClass::Files).await;

    let message = ctx
        .state
        .rooms
        .get_message(posted.message.id)
        .await
        .unwrap();
    assert_eq!(message.content, "caption");
    assert_eq!(ctx.store.upload_count(), 0);
}

#[tokio::test]
async fn test_shutdown_cancels_cycle() {
    let ctx = TestContext::new();
    let room = ctx.room(ttl(Some(1), None)).await;
    let file = ctx
        .state
        .write_guard
        .upload_file(room.id, upload("a.bin", 10))
        .await
        .unwrap();
    ctx.clock.advance(Days::days(2));

    ctx.shutdown.send(true).unwrap();
    let report = sweep(&ctx, ResourceClass::Files).await;

    assert!(report.cancelled);
    assert_eq!(report.resources_deleted, 0);
    assert!(ctx.store.contains_file(file.id));
}

#[tokio::test]
async fn test_transient_store_errors_are_retried() {
    let ctx = TestContext::new();
    let room = ctx.room(ttl(Some(1), None)).await;
    ctx.state
        .write_guard
        .upload_file(room.id, upload("a.bin", 10))
        .await
        .unwrap();
    ctx.clock.advance(Days::days(2));

    ctx.store.fail_next_retention_calls(2);
    let report = sweep(&ctx, ResourceClass::Files).await;

    assert_eq!(report.rooms_failed, 0);
    assert_eq!(report.resources_deleted, 1);
}

#[tokio::test]
async fn test_unreadable_room_listing_fails_cycle() {
    let ctx = TestContext::new();
    ctx.room(ttl(Some(1), None)).await;

    ctx.store.fail_next_retention_calls(3);
    let err = ctx
        .state
        .sweeper
        .run_cycle(ResourceClass::Files, ctx.shutdown.subscribe())
        .await
        .unwrap_err();

    assert!(err.is_transient());
}

#[tokio::test]
async fn test_room_with_several_expired_pages_is_emptied() {
    let ctx = TestContext::new();
    let room = ctx.room(ttl(Some(30), None)).await;
    let mut keys = Vec::new();
    for i in 0..5 {
        let file = ctx
            .state
            .write_guard
            .upload_file(room.id, upload(&format!("old-{}.bin", i), 10))
            .await
            .unwrap();
        keys.push(file.key);
    }

    ctx.clock.advance(Days::days(31));
    let report = sweep(&ctx, ResourceClass::Files).await;

    assert_eq!(report.resources_deleted, 5);
    assert_eq!(report.blob_deletes_attempted, 5);
    assert_eq!(ctx.store.file_count(room.id), 0);

    let mut deleted = ctx.blobs.delete_calls();
    deleted.sort();
    keys.sort();
    assert_eq!(deleted, keys);
}

#[tokio::test]
async fn test_expired_messages_across_pages_purge_each_attachment_once() {
    let ctx = TestContext::new();
    let room = ctx.room(ttl(None, Some(7))).await;
    let channel_id = ctx.channel(room.id, "general").await;
    let mut keys = Vec::new();
    for i in 0..5 {
        let posted = ctx
            .state
            .write_guard
            .post_message(channel_id, 1, "old", Some(upload(&format!("a-{}.bin", i), 10)))
            .await
            .unwrap();
        keys.push(posted.file.unwrap().key);
    }

    ctx.clock.advance(Days::days(8));
    let report = sweep(&ctx, ResourceClass::Messages).await;

    assert_eq!(report.resources_deleted, 5);
    assert_eq!(ctx.store.message_count(room.id), 0);
    assert_eq!(ctx.store.upload_count(), 0);

    let mut deleted = ctx.blobs.delete_calls();
    deleted.sort();
    keys.sort();
    assert_eq!(deleted, keys);
}

#[tokio::test]
async fn test_out_of_range_ttl_does_not_stop_the_cycle() {
    let ctx = TestContext::new();
    let forever = ctx.room(ttl(Some(2_000_000_000), None)).await;
    let kept = ctx
        .state
        .write_guard
        .upload_file(forever.id, upload("kept.bin", 10))
        .await
        .unwrap();
    let room = ctx.room(ttl(Some(30), None)).await;
    let old = ctx
        .state
        .write_guard
        .upload_file(room.id, upload("old.bin", 10))
        .await
        .unwrap();

    ctx.clock.advance(Days::days(31));
    let report = sweep(&ctx, ResourceClass::Files).await;

    assert_eq!(report.rooms_scanned, 2);
    assert_eq!(report.rooms_failed, 0);
    assert_eq!(report.resources_deleted, 1);
    assert!(ctx.store.contains_file(kept.id));
    assert!(!ctx.store.contains_file(old.id));
}
