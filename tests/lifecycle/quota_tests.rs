//! Quota enforcement through the write guard.

use std::sync::Arc;

use pretty_assertions::assert_eq;

use roomkeeper::domain::{ChannelType, QuotaLimit, QuotaViolation};
use roomkeeper::shared::error::AppError;

use crate::common::{limits, upload, TestContext};

fn violation(err: AppError) -> QuotaViolation {
    match err {
        AppError::QuotaExceeded(v) => v,
        other => panic!("expected quota rejection, got {:?}", other),
    }
}

#[tokio::test]
async fn test_third_channel_rejected_at_limit_of_two() {
    let ctx = TestContext::new();
    let room = ctx.room(limits(1_000, 100, 2, 10)).await;
    ctx.channel(room.id, "general").await;
    ctx.channel(room.id, "random").await;

    let err = ctx
        .state
        .write_guard
        .create_channel(room.id, "overflow", ChannelType::Text)
        .await
        .unwrap_err();

    assert_eq!(
        violation(err),
        QuotaViolation::new(QuotaLimit::MaxChannels, 2, 2, 1)
    );
    let channels = ctx.state.rooms.list_channels(room.id).await.unwrap();
    assert_eq!(channels.len(), 2);
}

#[tokio::test]
async fn test_upload_over_total_leaves_no_trace() {
    let ctx = TestContext::new();
    let room = ctx.room(limits(100, 60, 5, 5)).await;
    ctx.state
        .write_guard
        .upload_file(room.id, upload("a.bin", 60))
        .await
        .unwrap();

    let files_before = ctx.store.file_count(room.id);
    let blobs_before = ctx.blobs.len();

    let err = ctx
        .state
        .write_guard
        .upload_file(room.id, upload("b.bin", 50))
        .await
        .unwrap_err();

    assert_eq!(
        violation(err),
        QuotaViolation::new(QuotaLimit::TotalBytesAllowed, 100, 60, 50)
    );
    assert_eq!(ctx.store.file_count(room.id), files_before);
    assert_eq!(ctx.blobs.len(), blobs_before);
}

#[tokio::test]
async fn test_oversized_file_rejected_despite_headroom() {
    let ctx = TestContext::new();
    let room = ctx.room(limits(1_000_000, 10, 5, 5)).await;

    let err = ctx
        .state
        .write_guard
        .upload_file(room.id, upload("big.bin", 11))
        .await
        .unwrap_err();

    let v = violation(err);
    assert_eq!(v.limit, QuotaLimit::SingleFileBytesAllowed);
    assert_eq!(v.allowed, 10);
    assert_eq!(v.attempted, 11);
    assert!(ctx.blobs.is_empty());
}

#[tokio::test]
async fn test_file_exactly_at_limits_is_accepted() {
    let ctx = TestContext::new();
    let room = ctx.room(limits(40, 40, 5, 5)).await;

    let file = ctx
        .state
        .write_guard
        .upload_file(room.id, upload("fits.bin", 40))
        .await
        .unwrap();

    assert_eq!(file.size_bytes, 40);
    let report = ctx.state.rooms.room_usage(room.id).await.unwrap();
    assert_eq!(report.usage.bytes_used, 40);
}

#[tokio::test]
async fn test_member_limit_and_readd() {
    let ctx = TestContext::new();
    let room = ctx.room(limits(1_000, 100, 5, 1)).await;
    let guard = &ctx.state.write_guard;

    let first = guard.add_member(room.id, 11).await.unwrap();
    let again = guard.add_member(room.id, 11).await.unwrap();
    assert_eq!(first, again);

    let err = guard.add_member(room.id, 12).await.unwrap_err();
    assert_eq!(
        violation(err),
        QuotaViolation::new(QuotaLimit::MaxUsers, 1, 1, 1)
    );
}

#[tokio::test]
async fn test_concurrent_channel_creates_never_overshoot() {
    let ctx = TestContext::new();
    let room = ctx.room(limits(1_000, 100, 3, 5)).await;
    let guard = Arc::clone(&ctx.state.write_guard);

    let attempts = (0..10).map(|i| {
        let guard = Arc::clone(&guard);
        tokio::spawn(async move {
            guard
                .create_channel(room.id, &format!("c{}", i), ChannelType::Text)
                .await
        })
    });
    let results = futures::future::join_all(attempts).await;

    let created = results
        .into_iter()
        .filter(|r| matches!(r, Ok(Ok(_))))
        .count();
    assert_eq!(created, 3);
    let usage = ctx.state.rooms.room_usage(room.id).await.unwrap().usage;
    assert_eq!(usage.channel_count, 3);
}

#[tokio::test]
async fn test_lowered_limit_blocks_new_writes_only() {
    let ctx = TestContext::new();
    let room = ctx.room(limits(1_000, 100, 3, 5)).await;
    ctx.channel(room.id, "a").await;
    ctx.channel(room.id, "b").await;

    ctx.state
        .rooms
        .update_settings(room.id, &limits(1_000, 100, 1, 5))
        .await
        .unwrap();

    let err = ctx
        .state
        .write_guard
        .create_channel(room.id, "c", ChannelType::Text)
        .await
        .unwrap_err();
    assert_eq!(
        violation(err),
        QuotaViolation::new(QuotaLimit::MaxChannels, 1, 2, 1)
    );
    assert_eq!(ctx.state.rooms.list_channels(room.id).await.unwrap().len(), 2);
}
