//! Retention sweep cycles.
//!
//! One cycle walks every room in fixed-size batches. For each room whose TTL
//! for the class is set, it repeatedly takes the oldest page of expired
//! resources, deletes the page inside one metadata transaction, then purges
//! the released blobs and broadcasts deletion events. A room is done when a
//! page comes back empty. The cycle is done when a room batch comes back
//! empty.

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::watch;

use crate::application::services::blob_cleanup::purge_blobs;
use crate::config::RetentionSettings;
use crate::domain::entities::Room;
use crate::domain::stores::{emit, BlobStore, NotificationEmitter, RetentionStore};
use crate::domain::value_objects::{ExpiredResource, LifecycleEvent, ResourceClass, Topic};
use crate::infrastructure::metrics;
use crate::shared::clock::{Clock, Pacer};
use crate::shared::error::AppError;

/// Tuning knobs of a sweep cycle.
#[derive(Debug, Clone)]
pub struct SweepConfig {
    pub room_batch: i64,
    pub resource_batch: i64,
    pub batch_delay: Duration,
    pub store_timeout: Duration,
    pub max_attempts: u32,
    pub blob_concurrency: usize,
}

impl From<&RetentionSettings> for SweepConfig {
    fn from(settings: &RetentionSettings) -> Self {
        Self {
            room_batch: settings.room_batch,
            resource_batch: settings.resource_batch,
            batch_delay: settings.batch_delay(),
            store_timeout: settings.store_timeout(),
            max_attempts: settings.max_attempts,
            blob_concurrency: settings.blob_concurrency,
        }
    }
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self::from(&RetentionSettings::default())
    }
}

/// Results from a single sweep cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    pub class: ResourceClass,
    /// Rooms visited, whether or not retention was enabled for them
    pub rooms_scanned: u64,
    /// Rooms with no TTL for the class
    pub rooms_skipped: u64,
    /// Rooms abandoned for this cycle after store errors
    pub rooms_failed: u64,
    /// Non-empty room batches processed
    pub room_batches: u64,
    pub resources_deleted: u64,
    pub blob_deletes_attempted: u64,
    /// Keys of blobs whose delete failed
    pub orphaned_blobs: Vec<String>,
    /// The cycle stopped early on shutdown
    pub cancelled: bool,
}

impl SweepReport {
    pub fn new(class: ResourceClass) -> Self {
        Self {
            class,
            rooms_scanned: 0,
            rooms_skipped: 0,
            rooms_failed: 0,
            room_batches: 0,
            resources_deleted: 0,
            blob_deletes_attempted: 0,
            orphaned_blobs: Vec::new(),
            cancelled: false,
        }
    }

    pub fn has_deletions(&self) -> bool {
        self.resources_deleted > 0
    }
}

/// Instant before which resources with a `ttl_days` lifetime have expired.
///
/// `None` when the TTL reaches past the range chrono can represent.
pub fn expiry_cutoff(now: DateTime<Utc>, ttl_days: i64) -> Option<DateTime<Utc>> {
    chrono::Duration::try_days(ttl_days).and_then(|ttl| now.checked_sub_signed(ttl))
}

/// Runs sweep cycles against the metadata store, blob store and notifier.
pub struct RetentionSweeper {
    store: Arc<dyn RetentionStore>,
    blobs: Arc<dyn BlobStore>,
    notifier: Arc<dyn NotificationEmitter>,
    clock: Arc<dyn Clock>,
    pacer: Arc<dyn Pacer>,
    config: SweepConfig,
}

impl RetentionSweeper {
    pub fn new(
        store: Arc<dyn RetentionStore>,
        blobs: Arc<dyn BlobStore>,
        notifier: Arc<dyn NotificationEmitter>,
        clock: Arc<dyn Clock>,
        pacer: Arc<dyn Pacer>,
        config: SweepConfig,
    ) -> Self {
        Self {
            store,
            blobs,
            notifier,
            clock,
            pacer,
            config,
        }
    }

    pub fn config(&self) -> &SweepConfig {
        &self.config
    }

    /// Run one full cycle for `class`.
    ///
    /// Fails only when the room listing itself cannot be read. Per-room
    /// failures are counted in the report and the cycle moves on.
    pub async fn run_cycle(
        &self,
        class: ResourceClass,
        mut shutdown: watch::Receiver<bool>,
    ) -> Result<SweepReport, AppError> {
        let started = Instant::now();
        let mut report = SweepReport::new(class);
        let mut offset = 0_i64;

        tracing::debug!(class = %class, "Retention cycle started");

        'batches: loop {
            let limit = self.config.room_batch;
            let rooms = self
                .call("list_rooms", || self.store.list_rooms(offset, limit))
                .await?;
            if rooms.is_empty() {
                break;
            }
            report.room_batches += 1;

            for room in &rooms {
                if *shutdown.borrow() {
                    report.cancelled = true;
                    break 'batches;
                }
                self.process_room(room, class, &mut report).await;
            }

            offset += rooms.len() as i64;

            if self.pause_or_shutdown(&mut shutdown).await {
                report.cancelled = true;
                break;
            }
        }

        metrics::record_retention_cycle(class.as_str(), started.elapsed().as_secs_f64());
        Ok(report)
    }

    async fn process_room(&self, room: &Room, class: ResourceClass, report: &mut SweepReport) {
        report.rooms_scanned += 1;

        let Some(ttl_days) = room.settings.ttl_days(class) else {
            report.rooms_skipped += 1;
            return;
        };
        let Some(cutoff) = expiry_cutoff(self.clock.now(), ttl_days) else {
            // A TTL reaching past the representable range expires nothing.
            tracing::debug!(room_id = room.id, class = %class, ttl_days, "TTL out of range");
            return;
        };

        match self.sweep_room(room.id, class, cutoff, report).await {
            Ok(0) => {}
            Ok(deleted) => {
                tracing::info!(
                    room_id = room.id,
                    class = %class,
                    deleted = deleted,
                    cutoff = %cutoff,
                    "Expired resources removed"
                );
            }
            Err(e) => {
                report.rooms_failed += 1;
                metrics::record_retention_room_failure(class.as_str());
                tracing::error!(
                    room_id = room.id,
                    class = %class,
                    error = %e,
                    "Retention sweep failed for room, skipping until next cycle"
                );
            }
        }
    }

    /// Delete every expired page of one room. Returns records removed.
    async fn sweep_room(
        &self,
        room_id: i64,
        class: ResourceClass,
        cutoff: DateTime<Utc>,
        report: &mut SweepReport,
    ) -> Result<u64, AppError> {
        let limit = self.config.resource_batch;
        let mut deleted_total = 0_u64;

        loop {
            // Deleted rows drop out of the result set, so every page starts at 0.
            let page = self
                .call("find_expired_page", || {
                    self.store.find_expired_page(room_id, class, cutoff, 0, limit)
                })
                .await?;
            if page.is_empty() {
                break;
            }

            let batch = self
                .call("delete_expired_batch", || {
                    self.store.delete_expired_batch(room_id, class, &page)
                })
                .await?;

            let deleted = batch.deleted();
            report.resources_deleted += deleted;
            deleted_total += deleted;
            metrics::record_retention_deletion(class.as_str(), deleted);

            let purge = purge_blobs(
                self.blobs.as_ref(),
                batch.blob_keys,
                self.config.blob_concurrency,
                self.config.store_timeout,
                class.as_str(),
            )
            .await;
            report.blob_deletes_attempted += purge.attempted;
            report
                .orphaned_blobs
                .extend(purge.orphans.into_iter().map(|orphan| orphan.key));

            self.notify_expired(class, &page, &batch.ids);

            if deleted == 0 {
                tracing::warn!(
                    room_id = room_id,
                    class = %class,
                    page = page.len(),
                    "Expired page selected but nothing was deleted, stopping room"
                );
                break;
            }
        }

        Ok(deleted_total)
    }

    fn notify_expired(&self, class: ResourceClass, page: &[ExpiredResource], deleted_ids: &[i64]) {
        for resource in page.iter().filter(|r| deleted_ids.contains(&r.id)) {
            match class {
                ResourceClass::Messages => {
                    let Some(channel_id) = resource.channel_id else {
                        continue;
                    };
                    emit(
                        self.notifier.as_ref(),
                        Topic::Channel(channel_id),
                        &LifecycleEvent::MessageDelete {
                            id: resource.id.to_string(),
                            channel_id: channel_id.to_string(),
                            room_id: resource.room_id.to_string(),
                            expired: true,
                        },
                    );
                }
                ResourceClass::Files => {
                    emit(
                        self.notifier.as_ref(),
                        Topic::Room(resource.room_id),
                        &LifecycleEvent::FileDelete {
                            id: resource.id.to_string(),
                            room_id: resource.room_id.to_string(),
                            expired: true,
                        },
                    );
                }
            }
        }
    }

    /// Run a store call under the per-call timeout, retrying transient
    /// failures up to `max_attempts` times.
    async fn call<T, F, Fut>(&self, operation: &'static str, mut f: F) -> Result<T, AppError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, AppError>>,
    {
        let mut attempt = 0_u32;
        loop {
            attempt += 1;
            let result = match tokio::time::timeout(self.config.store_timeout, f()).await {
                Ok(result) => result,
                Err(_) => Err(AppError::timeout(operation)),
            };
            match result {
                Err(e) if e.is_transient() && attempt < self.config.max_attempts => {
                    tracing::warn!(
                        operation = operation,
                        attempt = attempt,
                        error = %e,
                        "Transient store error, retrying"
                    );
                }
                other => return other,
            }
        }
    }

    /// Pause between room batches. Returns true when shutdown was signalled.
    async fn pause_or_shutdown(&self, shutdown: &mut watch::Receiver<bool>) -> bool {
        if *shutdown.borrow() {
            return true;
        }
        let signalled = tokio::select! {
            _ = self.pacer.pause(self.config.batch_delay) => None,
            changed = shutdown.changed() => Some(changed.is_ok()),
        };
        match signalled {
            None | Some(true) => *shutdown.borrow(),
            // Sender gone: nobody can signal shutdown any more.
            Some(false) => {
                self.pacer.pause(self.config.batch_delay).await;
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::RoomSettings;
    use crate::domain::stores::{parse_blob_key, MockBlobStore, MockNotificationEmitter};
    use crate::domain::value_objects::DeletedBatch;
    use crate::shared::clock::{FixedClock, RecordingPacer};
    use async_trait::async_trait;
    use chrono::TimeZone;
    use parking_lot::Mutex;
    use pretty_assertions::assert_eq;

    /// Scripted store: `fail_first` transient errors, then serves fixed rooms
    /// and a single page of one expired message per room.
    struct ScriptedStore {
        rooms: Vec<Room>,
        fail_first: Mutex<u32>,
        deleted: Mutex<Vec<i64>>,
    }

    impl ScriptedStore {
        fn new(rooms: Vec<Room>, fail_first: u32) -> Self {
            Self {
                rooms,
                fail_first: Mutex::new(fail_first),
                deleted: Mutex::new(Vec::new()),
            }
        }

        fn maybe_fail(&self) -> Result<(), AppError> {
            let mut remaining = self.fail_first.lock();
            if *remaining > 0 {
                *remaining -= 1;
                return Err(AppError::Transient("connection reset".into()));
            }
            Ok(())
        }
    }

    #[async_trait]
    impl RetentionStore for ScriptedStore {
        async fn list_rooms(&self, offset: i64, limit: i64) -> Result<Vec<Room>, AppError> {
            Ok(self
                .rooms
                .iter()
                .skip(offset as usize)
                .take(limit as usize)
                .cloned()
                .collect())
        }

        async fn find_expired_page(
            &self,
            room_id: i64,
            _class: ResourceClass,
            cutoff: DateTime<Utc>,
            _offset: i64,
            _limit: i64,
        ) -> Result<Vec<ExpiredResource>, AppError> {
            self.maybe_fail()?;
            if self.deleted.lock().contains(&room_id) {
                return Ok(Vec::new());
            }
            Ok(vec![ExpiredResource {
                id: room_id * 100,
                room_id,
                channel_id: Some(room_id * 10),
                created_at: cutoff - chrono::Duration::seconds(1),
            }])
        }

        async fn delete_expired_batch(
            &self,
            room_id: i64,
            _class: ResourceClass,
            resources: &[ExpiredResource],
        ) -> Result<DeletedBatch, AppError> {
            self.deleted.lock().push(room_id);
            Ok(DeletedBatch {
                ids: resources.iter().map(|r| r.id).collect(),
                blob_keys: vec![format!("rooms/{}/blob", room_id)],
            })
        }
    }

    fn room(id: i64, ttl: Option<i32>) -> Room {
        let at = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        Room {
            id,
            name: format!("room-{}", id),
            settings: RoomSettings {
                total_bytes_allowed: 1_000,
                single_file_bytes_allowed: 100,
                max_channels: 5,
                max_users: 5,
                file_days_to_live: ttl,
                message_days_to_live: ttl,
            },
            created_at: at,
            updated_at: at,
        }
    }

    fn ok_blobs() -> MockBlobStore {
        let mut blobs = MockBlobStore::new();
        blobs.expect_parse_key().returning(|src| parse_blob_key(src));
        blobs.expect_backend_name().return_const("mock");
        blobs.expect_delete().returning(|_| Ok(()));
        blobs
    }

    fn quiet_notifier() -> MockNotificationEmitter {
        let mut notifier = MockNotificationEmitter::new();
        notifier.expect_broadcast().return_const(());
        notifier
    }

    fn sweeper(store: ScriptedStore, pacer: Arc<RecordingPacer>, config: SweepConfig) -> RetentionSweeper {
        RetentionSweeper::new(
            Arc::new(store),
            Arc::new(ok_blobs()),
            Arc::new(quiet_notifier()),
            Arc::new(FixedClock::new(Utc.with_ymd_and_hms(2026, 3, 1, 0, 0, 0).unwrap())),
            pacer,
            config,
        )
    }

    fn test_config() -> SweepConfig {
        SweepConfig {
            room_batch: 2,
            resource_batch: 10,
            batch_delay: Duration::from_millis(50),
            store_timeout: Duration::from_secs(1),
            max_attempts: 3,
            blob_concurrency: 2,
        }
    }

    #[tokio::test]
    async fn test_cycle_skips_rooms_without_ttl() {
        let pacer = Arc::new(RecordingPacer::new());
        let store = ScriptedStore::new(vec![room(1, Some(7)), room(2, None), room(3, Some(0))], 0);
        let (_tx, rx) = watch::channel(false);

        let report = sweeper(store, pacer.clone(), test_config())
            .run_cycle(ResourceClass::Messages, rx)
            .await
            .unwrap();

        assert_eq!(report.rooms_scanned, 3);
        assert_eq!(report.rooms_skipped, 2);
        assert_eq!(report.resources_deleted, 1);
        assert_eq!(report.blob_deletes_attempted, 1);
        assert_eq!(report.room_batches, 2);
        assert_eq!(pacer.pauses().len(), 2);
    }

    #[tokio::test]
    async fn test_transient_errors_are_retried() {
        let pacer = Arc::new(RecordingPacer::new());
        let store = ScriptedStore::new(vec![room(1, Some(7))], 2);
        let (_tx, rx) = watch::channel(false);

        let report = sweeper(store, pacer, test_config())
            .run_cycle(ResourceClass::Files, rx)
            .await
            .unwrap();

        assert_eq!(report.rooms_failed, 0);
        assert_eq!(report.resources_deleted, 1);
    }

    #[tokio::test]
    async fn test_room_fails_after_max_attempts() {
        let pacer = Arc::new(RecordingPacer::new());
        let store = ScriptedStore::new(vec![room(1, Some(7)), room(2, Some(7))], 3);
        let (_tx, rx) = watch::channel(false);

        let report = sweeper(store, pacer, test_config())
            .run_cycle(ResourceClass::Files, rx)
            .await
            .unwrap();

        // room 1 burns all three attempts, room 2 proceeds
        assert_eq!(report.rooms_failed, 1);
        assert_eq!(report.resources_deleted, 1);
    }

    #[tokio::test]
    async fn test_shutdown_stops_before_next_room() {
        let pacer = Arc::new(RecordingPacer::new());
        let store = ScriptedStore::new(vec![room(1, Some(7)), room(2, Some(7))], 0);
        let (tx, rx) = watch::channel(false);
        tx.send(true).unwrap();

        let report = sweeper(store, pacer.clone(), test_config())
            .run_cycle(ResourceClass::Messages, rx)
            .await
            .unwrap();

        assert!(report.cancelled);
        assert_eq!(report.rooms_scanned, 0);
        assert!(pacer.pauses().is_empty());
    }

    #[tokio::test]
    async fn test_expired_messages_notify_channel_topic() {
        let mut notifier = MockNotificationEmitter::new();
        notifier
            .expect_broadcast()
            .withf(|topic, event_type, payload| {
                topic == "channel:10" && event_type == "MESSAGE_DELETE" && payload["expired"] == true
            })
            .times(1)
            .return_const(());

        let sweeper = RetentionSweeper::new(
            Arc::new(ScriptedStore::new(vec![room(1, Some(1))], 0)),
            Arc::new(ok_blobs()),
            Arc::new(notifier),
            Arc::new(FixedClock::new(Utc::now())),
            Arc::new(RecordingPacer::new()),
            test_config(),
        );
        let (_tx, rx) = watch::channel(false);
        sweeper.run_cycle(ResourceClass::Messages, rx).await.unwrap();
    }

    #[test]
    fn test_expiry_cutoff_out_of_range() {
        let now = Utc.with_ymd_and_hms(2026, 3, 1, 0, 0, 0).unwrap();
        assert_eq!(
            expiry_cutoff(now, 30),
            Some(Utc.with_ymd_and_hms(2026, 1, 30, 0, 0, 0).unwrap())
        );
        assert_eq!(expiry_cutoff(now, 2_000_000_000), None);
        assert_eq!(expiry_cutoff(now, i64::MAX), None);
    }

    /// Serves one page of two messages but deletes only the first; the
    /// second message has no channel.
    struct PartialStore {
        room: Room,
        served: Mutex<bool>,
    }

    #[async_trait]
    impl RetentionStore for PartialStore {
        async fn list_rooms(&self, offset: i64, _limit: i64) -> Result<Vec<Room>, AppError> {
            Ok(if offset == 0 { vec![self.room.clone()] } else { Vec::new() })
        }

        async fn find_expired_page(
            &self,
            room_id: i64,
            _class: ResourceClass,
            cutoff: DateTime<Utc>,
            _offset: i64,
            _limit: i64,
        ) -> Result<Vec<ExpiredResource>, AppError> {
            let mut served = self.served.lock();
            if *served {
                return Ok(Vec::new());
            }
            *served = true;
            let at = cutoff - chrono::Duration::seconds(1);
            Ok(vec![
                ExpiredResource { id: 1, room_id, channel_id: Some(10), created_at: at },
                ExpiredResource { id: 2, room_id, channel_id: Some(10), created_at: at },
                ExpiredResource { id: 3, room_id, channel_id: None, created_at: at },
            ])
        }

        async fn delete_expired_batch(
            &self,
            _room_id: i64,
            _class: ResourceClass,
            _resources: &[ExpiredResource],
        ) -> Result<DeletedBatch, AppError> {
            Ok(DeletedBatch {
                ids: vec![1, 3],
                blob_keys: Vec::new(),
            })
        }
    }

    #[tokio::test]
    async fn test_events_only_for_deleted_rows_with_a_channel() {
        let mut notifier = MockNotificationEmitter::new();
        notifier
            .expect_broadcast()
            .withf(|topic, _, payload| topic == "channel:10" && payload["id"] == "1")
            .times(1)
            .return_const(());

        let store = PartialStore {
            room: room(1, Some(1)),
            served: Mutex::new(false),
        };
        let sweeper = RetentionSweeper::new(
            Arc::new(store),
            Arc::new(ok_blobs()),
            Arc::new(notifier),
            Arc::new(FixedClock::new(Utc::now())),
            Arc::new(RecordingPacer::new()),
            test_config(),
        );
        let (_tx, rx) = watch::channel(false);
        let report = sweeper.run_cycle(ResourceClass::Messages, rx).await.unwrap();

        assert_eq!(report.resources_deleted, 2);
    }
}
