//! External collaborator interfaces.
//!
//! The retention sweeper and the write guard talk to three systems that fail
//! independently: the metadata store (already covered by the entity
//! repositories plus [`RetentionStore`]), the blob store, and the
//! notification fan-out.

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};

use super::entities::Room;
use super::value_objects::{DeletedBatch, ExpiredResource, LifecycleEvent, ResourceClass, Topic};
use crate::shared::error::AppError;

/// Metadata store operations used by the retention sweeper.
#[async_trait]
pub trait RetentionStore: Send + Sync {
    /// Page through all rooms ordered by `created_at ASC, id ASC`.
    async fn list_rooms(&self, offset: i64, limit: i64) -> Result<Vec<Room>, AppError>;

    /// Resources of `class` owned by the room (directly, or through one of its
    /// channels) with `created_at < cutoff`, oldest first.
    async fn find_expired_page(
        &self,
        room_id: i64,
        class: ResourceClass,
        cutoff: DateTime<Utc>,
        offset: i64,
        limit: i64,
    ) -> Result<Vec<ExpiredResource>, AppError>;

    /// Delete the resource trees of one page inside a single transaction and
    /// return the blob keys to purge once it has committed.
    async fn delete_expired_batch(
        &self,
        room_id: i64,
        class: ResourceClass,
        resources: &[ExpiredResource],
    ) -> Result<DeletedBatch, AppError>;
}

/// Opaque byte storage addressed by key.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Store `bytes` under `key`; returns the key the store actually used.
    async fn upload(&self, bytes: Bytes, key: &str) -> Result<String, AppError>;

    /// Delete the blob. Deleting a missing blob is not an error.
    async fn delete(&self, key: &str) -> Result<(), AppError>;

    /// Check whether a blob exists.
    async fn exists(&self, key: &str) -> Result<bool, AppError>;

    /// Normalise a stored reference (key, path or URL) to a bare key.
    fn parse_key(&self, src: &str) -> String;

    /// Backend name for logging.
    fn backend_name(&self) -> &'static str;
}

/// Fire-and-forget, at-most-once broadcast to currently-connected subscribers.
#[cfg_attr(test, mockall::automock)]
pub trait NotificationEmitter: Send + Sync {
    fn broadcast(&self, topic: &str, event_type: &str, payload: serde_json::Value);
}

/// Broadcast a typed lifecycle event on a topic.
pub fn emit(emitter: &dyn NotificationEmitter, topic: Topic, event: &LifecycleEvent) {
    emitter.broadcast(&topic.to_string(), event.event_type(), event.payload());
}

/// Reduce a stored reference to its blob key.
///
/// Accepts a bare key (`rooms/1/abc`), an absolute path (`/rooms/1/abc`) or a
/// URL (`https://cdn.example.com/rooms/1/abc?sig=..`). Query strings and
/// fragments are dropped.
pub fn parse_blob_key(src: &str) -> String {
    let src = src.trim();
    let without_query = src.split(['?', '#']).next().unwrap_or_default();
    let without_scheme = match without_query.split_once("://") {
        Some((_, rest)) => rest.split_once('/').map(|(_, path)| path).unwrap_or_default(),
        None => without_query,
    };
    without_scheme.trim_start_matches('/').to_string()
}
