//! Resource Write Guard
//!
//! Every write that consumes a bounded room resource goes through here:
//! channel creation, member additions and file uploads (directly or as a
//! message attachment). The quota check and the metadata reservation run
//! under a per-room async mutex, so two writers in this process cannot both
//! pass the check and jointly overflow a limit.
//!
//! File uploads are a small saga:
//!
//! 1. check the single-file limit, then total storage
//! 2. reserve a `pending` file row (its bytes count toward usage)
//! 3. upload the blob with a timeout
//! 4. activate the row
//!
//! A failed upload discards the reservation. A failed activation deletes the
//! blob and then discards the reservation.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};

use super::quota_service::QuotaEvaluator;
use crate::domain::{
    emit, BlobStore, Channel, ChannelType, File, FileStatus, FileType, LifecycleEvent, Member,
    Message, NotificationEmitter, Room, Topic, Upload, MAX_CONTENT_LENGTH,
};
use crate::infrastructure::repositories::Repositories;
use crate::infrastructure::storage::blob_key;
use crate::shared::clock::Clock;
use crate::shared::error::AppError;
use crate::shared::snowflake::SnowflakeGenerator;

/// Per-room async mutexes serialising quota check and reservation.
///
/// An entry lives only while some task holds or waits for the room's lock,
/// so the map stays bounded by the number of rooms being written to.
#[derive(Clone, Default)]
pub struct RoomLocks {
    locks: Arc<DashMap<i64, Arc<Mutex<()>>>>,
}

impl RoomLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for the room's lock.
    pub async fn lock(&self, room_id: i64) -> RoomGuard {
        // Clone the Arc out so the map shard is not held across the await.
        let mutex = self.locks.entry(room_id).or_default().clone();
        let guard = mutex.clone().lock_owned().await;
        RoomGuard {
            guard: Some(guard),
            mutex,
            room_id,
            locks: self.locks.clone(),
        }
    }

    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}

/// Held room lock. Dropping it removes the map entry once nobody else
/// references the room's mutex.
pub struct RoomGuard {
    guard: Option<OwnedMutexGuard<()>>,
    mutex: Arc<Mutex<()>>,
    room_id: i64,
    locks: Arc<DashMap<i64, Arc<Mutex<()>>>>,
}

impl Drop for RoomGuard {
    fn drop(&mut self) {
        self.guard.take();
        // Two references left: the map entry and ours. Waiters cloned theirs
        // under the shard lock, so a count of two means nobody is queued.
        self.locks.remove_if(&self.room_id, |_, mutex| {
            Arc::ptr_eq(mutex, &self.mutex) && Arc::strong_count(mutex) == 2
        });
    }
}

/// File bytes with their client-supplied name and MIME type.
#[derive(Debug, Clone)]
pub struct FileUpload {
    pub name: String,
    pub content_type: String,
    pub bytes: Bytes,
}

/// A message together with the file it carries, if any.
#[derive(Debug, Clone, PartialEq)]
pub struct PostedMessage {
    pub message: Message,
    pub room_id: i64,
    pub file: Option<File>,
}

/// Guard for quota-bound writes.
pub struct ResourceWriteGuard {
    repos: Repositories,
    blobs: Arc<dyn BlobStore>,
    notifier: Arc<dyn NotificationEmitter>,
    quota: QuotaEvaluator,
    locks: RoomLocks,
    ids: Arc<SnowflakeGenerator>,
    clock: Arc<dyn Clock>,
    blob_timeout: Duration,
}

impl ResourceWriteGuard {
    pub fn new(
        repos: Repositories,
        blobs: Arc<dyn BlobStore>,
        notifier: Arc<dyn NotificationEmitter>,
        ids: Arc<SnowflakeGenerator>,
        clock: Arc<dyn Clock>,
        locks: RoomLocks,
        blob_timeout: Duration,
    ) -> Self {
        let quota = QuotaEvaluator::new(repos.rooms.clone());
        Self {
            repos,
            blobs,
            notifier,
            quota,
            locks,
            ids,
            clock,
            blob_timeout,
        }
    }

    pub fn quota(&self) -> &QuotaEvaluator {
        &self.quota
    }

    /// Create a channel if the room has a free channel slot.
    #[tracing::instrument(skip(self, name))]
    pub async fn create_channel(
        &self,
        room_id: i64,
        name: &str,
        channel_type: ChannelType,
    ) -> Result<Channel, AppError> {
        let channel = {
            let _guard = self.locks.lock(room_id).await;
            let room = self.load_room(room_id).await?;
            self.quota.check_channels(&room, 1).await?;

            let channel = Channel {
                id: self.ids.generate(),
                room_id,
                name: name.trim().to_string(),
                channel_type,
                created_at: self.clock.now(),
            };
            self.repos.channels.create(&channel).await?
        };

        tracing::info!(room_id, channel_id = channel.id, "Channel created");
        emit(
            self.notifier.as_ref(),
            Topic::Room(room_id),
            &LifecycleEvent::ChannelCreate {
                id: channel.id.to_string(),
                room_id: room_id.to_string(),
                name: channel.name.clone(),
                channel_type: channel.channel_type.as_str().to_string(),
            },
        );
        Ok(channel)
    }

    /// Add a member. Re-adding an existing member returns the membership.
    #[tracing::instrument(skip(self))]
    pub async fn add_member(&self, room_id: i64, user_id: i64) -> Result<Member, AppError> {
        let member = {
            let _guard = self.locks.lock(room_id).await;
            let room = self.load_room(room_id).await?;
            if let Some(existing) = self.repos.members.find(room_id, user_id).await? {
                return Ok(existing);
            }
            self.quota.check_members(&room, 1).await?;

            let member = Member {
                room_id,
                user_id,
                joined_at: self.clock.now(),
            };
            self.repos.members.add(&member).await?
        };

        tracing::info!(room_id, user_id, "Member added");
        emit(
            self.notifier.as_ref(),
            Topic::Room(room_id),
            &LifecycleEvent::MemberAdd {
                room_id: room_id.to_string(),
                user_id: user_id.to_string(),
            },
        );
        Ok(member)
    }

    /// Upload a standalone room file.
    pub async fn upload_file(&self, room_id: i64, upload: FileUpload) -> Result<File, AppError> {
        let file = self.store_file(room_id, upload).await?;
        self.notify_file_created(&file);
        Ok(file)
    }

    /// Post a user message, optionally carrying one attachment.
    pub async fn post_message(
        &self,
        channel_id: i64,
        author_id: i64,
        content: &str,
        attachment: Option<FileUpload>,
    ) -> Result<PostedMessage, AppError> {
        self.post(channel_id, Some(author_id), None, content, attachment)
            .await
    }

    /// Post into the webhook's channel with the webhook as author.
    pub async fn post_webhook_message(
        &self,
        webhook_id: i64,
        content: &str,
        attachment: Option<FileUpload>,
    ) -> Result<PostedMessage, AppError> {
        let webhook = self
            .repos
            .webhooks
            .find_by_id(webhook_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Webhook {} not found", webhook_id)))?;

        self.post(webhook.channel_id, None, Some(webhook.id), content, attachment)
            .await
    }

    async fn post(
        &self,
        channel_id: i64,
        author_id: Option<i64>,
        webhook_id: Option<i64>,
        content: &str,
        attachment: Option<FileUpload>,
    ) -> Result<PostedMessage, AppError> {
        validate_content(content, attachment.is_some())?;

        let channel = self
            .repos
            .channels
            .find_by_id(channel_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Channel {} not found", channel_id)))?;

        let file = match attachment {
            Some(upload) => Some(self.store_file(channel.room_id, upload).await?),
            None => None,
        };

        let message = Message {
            id: self.ids.generate(),
            channel_id,
            author_id,
            webhook_id,
            content: content.to_string(),
            created_at: self.clock.now(),
        };
        let upload = file.as_ref().map(|f| Upload {
            id: self.ids.generate(),
            message_id: message.id,
            file_id: f.id,
            upload_type: f.file_type,
        });

        let message = match self.repos.messages.create(&message, upload.as_ref()).await {
            Ok(message) => message,
            Err(e) => {
                if let Some(file) = &file {
                    self.compensate_file(file).await;
                }
                return Err(e);
            }
        };

        if let Some(file) = &file {
            self.notify_file_created(file);
        }
        emit(
            self.notifier.as_ref(),
            Topic::Channel(channel_id),
            &LifecycleEvent::MessageCreate {
                id: message.id.to_string(),
                channel_id: channel_id.to_string(),
                room_id: channel.room_id.to_string(),
                file_id: file.as_ref().map(|f| f.id.to_string()),
            },
        );

        Ok(PostedMessage {
            message,
            room_id: channel.room_id,
            file,
        })
    }

    /// Run the upload saga and return the activated file row.
    async fn store_file(&self, room_id: i64, upload: FileUpload) -> Result<File, AppError> {
        let size_bytes = upload.bytes.len() as i64;
        let id = self.ids.generate();
        let pending = File {
            id,
            room_id,
            key: blob_key(room_id, id, &upload.bytes),
            name: upload.name,
            size_bytes,
            file_type: FileType::from_mime(&upload.content_type),
            status: FileStatus::Pending,
            created_at: self.clock.now(),
        };

        let reserved = {
            let _guard = self.locks.lock(room_id).await;
            let room = self.load_room(room_id).await?;
            self.quota.check_file(&room, size_bytes).await?;
            self.repos.files.reserve(&pending).await?
        };

        let stored_key =
            match tokio::time::timeout(self.blob_timeout, self.blobs.upload(upload.bytes, &reserved.key))
                .await
            {
                Ok(Ok(key)) => key,
                Ok(Err(e)) => {
                    self.discard_reservation(reserved.id).await;
                    return Err(e);
                }
                Err(_) => {
                    // The upload may still land after the timeout.
                    self.delete_blob(&reserved.key).await;
                    self.discard_reservation(reserved.id).await;
                    return Err(AppError::timeout("blob upload"));
                }
            };

        match self.repos.files.activate(reserved.id).await {
            Ok(file) => {
                tracing::debug!(room_id, file_id = file.id, size_bytes, "File stored");
                Ok(file)
            }
            Err(e) => {
                self.delete_blob(&stored_key).await;
                self.discard_reservation(reserved.id).await;
                Err(e)
            }
        }
    }

    async fn compensate_file(&self, file: &File) {
        if let Err(e) = self.repos.files.delete(file.id).await {
            tracing::warn!(file_id = file.id, error = %e, "Failed to remove file row after message insert failed");
        }
        self.delete_blob(&file.key).await;
    }

    async fn discard_reservation(&self, file_id: i64) {
        if let Err(e) = self.repos.files.discard(file_id).await {
            tracing::warn!(file_id, error = %e, "Failed to discard pending file reservation");
        }
    }

    async fn delete_blob(&self, key: &str) {
        let result = match tokio::time::timeout(self.blob_timeout, self.blobs.delete(key)).await {
            Ok(result) => result,
            Err(_) => Err(AppError::timeout("blob delete")),
        };
        if let Err(e) = result {
            tracing::warn!(blob_key = %key, error = %e, "Compensating blob delete failed");
            crate::infrastructure::metrics::record_orphan_blob("compensation");
        }
    }

    async fn load_room(&self, room_id: i64) -> Result<Room, AppError> {
        self.repos
            .rooms
            .find_by_id(room_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Room {} not found", room_id)))
    }

    fn notify_file_created(&self, file: &File) {
        emit(
            self.notifier.as_ref(),
            Topic::Room(file.room_id),
            &LifecycleEvent::FileCreate {
                id: file.id.to_string(),
                room_id: file.room_id.to_string(),
                size_bytes: file.size_bytes,
            },
        );
    }
}

fn validate_content(content: &str, has_attachment: bool) -> Result<(), AppError> {
    if content.chars().count() > MAX_CONTENT_LENGTH {
        return Err(AppError::Validation(format!(
            "content: must be at most {} characters",
            MAX_CONTENT_LENGTH
        )));
    }
    if content.trim().is_empty() && !has_attachment {
        return Err(AppError::Validation(
            "content: message must have content or an attachment".into(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{QuotaLimit, RoomSettings};
    use crate::infrastructure::memory::InMemoryStore;
    use crate::infrastructure::notify::FanoutNotifier;
    use crate::infrastructure::storage::InMemoryBlobStore;
    use crate::shared::clock::SystemClock;
    use chrono::Utc;

    fn room(settings: RoomSettings) -> Room {
        let now = Utc::now();
        Room {
            id: 1,
            name: "room".into(),
            settings,
            created_at: now,
            updated_at: now,
        }
    }

    fn settings() -> RoomSettings {
        RoomSettings {
            total_bytes_allowed: 10,
            single_file_bytes_allowed: 8,
            max_channels: 2,
            max_users: 1,
            file_days_to_live: None,
            message_days_to_live: None,
        }
    }

    fn guard(store: Arc<InMemoryStore>, blobs: Arc<InMemoryBlobStore>) -> ResourceWriteGuard {
        ResourceWriteGuard::new(
            Repositories::in_memory(store),
            blobs,
            Arc::new(FanoutNotifier::new()),
            Arc::new(SnowflakeGenerator::new(1)),
            Arc::new(SystemClock),
            RoomLocks::new(),
            Duration::from_secs(1),
        )
    }

    fn upload(len: usize) -> FileUpload {
        FileUpload {
            name: "a.bin".into(),
            content_type: "application/octet-stream".into(),
            bytes: Bytes::from(vec![7u8; len]),
        }
    }

    #[tokio::test]
    async fn test_room_lock_entry_released_after_use() {
        let locks = RoomLocks::new();
        let held = locks.lock(1).await;
        assert_eq!(locks.len(), 1);

        let waiter = {
            let locks = locks.clone();
            tokio::spawn(async move {
                let _guard = locks.lock(1).await;
            })
        };
        tokio::task::yield_now().await;
        drop(held);
        // The waiter still references the mutex, so the entry survives.
        waiter.await.unwrap();
        assert!(locks.is_empty());
    }

    #[tokio::test]
    async fn test_missing_room_leaves_no_lock_entry() {
        let locks = RoomLocks::new();
        let guard = ResourceWriteGuard::new(
            Repositories::in_memory(Arc::new(InMemoryStore::new())),
            Arc::new(InMemoryBlobStore::new()),
            Arc::new(FanoutNotifier::new()),
            Arc::new(SnowflakeGenerator::new(1)),
            Arc::new(SystemClock),
            locks.clone(),
            Duration::from_secs(1),
        );

        for room_id in 1..=100 {
            assert!(matches!(
                guard.create_channel(room_id, "general", ChannelType::Text).await,
                Err(AppError::NotFound(_))
            ));
            assert!(matches!(
                guard.add_member(room_id, 7).await,
                Err(AppError::NotFound(_))
            ));
            assert!(matches!(
                guard.upload_file(room_id, upload(1)).await,
                Err(AppError::NotFound(_))
            ));
        }
        assert_eq!(locks.len(), 0);
    }

    #[tokio::test]
    async fn test_add_member_is_idempotent_at_the_limit() {
        let store = Arc::new(InMemoryStore::new());
        store.insert_room(room(settings()));
        let guard = guard(store, Arc::new(InMemoryBlobStore::new()));

        let first = guard.add_member(1, 42).await.unwrap();
        let again = guard.add_member(1, 42).await.unwrap();
        assert_eq!(first, again);

        match guard.add_member(1, 43).await {
            Err(AppError::QuotaExceeded(v)) => assert_eq!(v.limit, QuotaLimit::MaxUsers),
            other => panic!("expected quota error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_upload_failure_discards_reservation() {
        let store = Arc::new(InMemoryStore::new());
        store.insert_room(room(settings()));
        let blobs = Arc::new(InMemoryBlobStore::new());
        blobs.fail_uploads(true);
        let guard = guard(store.clone(), blobs.clone());

        assert!(guard.upload_file(1, upload(4)).await.is_err());
        assert_eq!(store.file_count(1), 0);
        assert!(blobs.is_empty());
    }

    #[tokio::test]
    async fn test_activation_failure_deletes_blob() {
        let store = Arc::new(InMemoryStore::new());
        store.insert_room(room(settings()));
        store.fail_file_activate(true);
        let blobs = Arc::new(InMemoryBlobStore::new());
        let guard = guard(store.clone(), blobs.clone());

        assert!(guard.upload_file(1, upload(4)).await.is_err());
        assert_eq!(store.file_count(1), 0);
        assert!(blobs.is_empty());
        assert_eq!(blobs.delete_calls().len(), 1);
    }

    #[tokio::test]
    async fn test_failed_message_insert_removes_attachment() {
        let store = Arc::new(InMemoryStore::new());
        store.insert_room(room(settings()));
        let blobs = Arc::new(InMemoryBlobStore::new());
        let guard = guard(store.clone(), blobs.clone());
        let channel = guard.create_channel(1, "general", ChannelType::Text).await.unwrap();

        store.fail_message_create(true);
        assert!(guard
            .post_message(channel.id, 5, "hi", Some(upload(4)))
            .await
            .is_err());
        assert_eq!(store.file_count(1), 0);
        assert_eq!(store.message_count(1), 0);
        assert!(blobs.is_empty());
    }

    #[test]
    fn test_validate_content() {
        assert!(validate_content("hello", false).is_ok());
        assert!(validate_content("", true).is_ok());
        assert!(validate_content("  ", false).is_err());
        assert!(validate_content(&"x".repeat(MAX_CONTENT_LENGTH + 1), false).is_err());
    }
}
