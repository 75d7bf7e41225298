//! Room Service
//!
//! Room lifecycle (create, read, settings, delete), usage reporting and the
//! manual delete paths for messages and files. Deletes remove metadata
//! first and purge blobs only after the metadata change has committed.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;

use super::blob_cleanup::{purge_blobs, PurgeOutcome};
use super::quota_service::QuotaEvaluator;
use super::write_guard::RoomLocks;
use crate::config::RoomDefaults;
use crate::domain::{
    emit, BlobStore, Channel, File, LifecycleEvent, Message, NotificationEmitter, Room,
    RoomSettings, RoomSettingsPatch, RoomUsage, Topic, Webhook,
};
use crate::infrastructure::repositories::Repositories;
use crate::shared::clock::Clock;
use crate::shared::error::AppError;
use crate::shared::snowflake::SnowflakeGenerator;

/// Usage counters next to the limits they are measured against.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RoomUsageReport {
    pub room_id: i64,
    pub usage: RoomUsage,
    pub limits: RoomSettings,
}

/// Result of deleting a room.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RoomDeletion {
    pub room_id: i64,
    pub blobs: PurgeOutcome,
}

pub struct RoomService {
    repos: Repositories,
    blobs: Arc<dyn BlobStore>,
    notifier: Arc<dyn NotificationEmitter>,
    ids: Arc<SnowflakeGenerator>,
    clock: Arc<dyn Clock>,
    locks: RoomLocks,
    defaults: RoomDefaults,
    blob_timeout: Duration,
    blob_concurrency: usize,
}

impl RoomService {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        repos: Repositories,
        blobs: Arc<dyn BlobStore>,
        notifier: Arc<dyn NotificationEmitter>,
        ids: Arc<SnowflakeGenerator>,
        clock: Arc<dyn Clock>,
        locks: RoomLocks,
        defaults: RoomDefaults,
        blob_timeout: Duration,
        blob_concurrency: usize,
    ) -> Self {
        Self {
            repos,
            blobs,
            notifier,
            ids,
            clock,
            locks,
            defaults,
            blob_timeout,
            blob_concurrency,
        }
    }

    /// Create a room, filling unset limits from the process defaults.
    #[tracing::instrument(skip(self, overrides))]
    pub async fn create_room(&self, name: &str, overrides: &RoomSettingsPatch) -> Result<Room, AppError> {
        let settings = self.defaults.to_room_settings().merged(overrides);
        settings.validate().map_err(AppError::Validation)?;

        let now = self.clock.now();
        let room = Room {
            id: self.ids.generate(),
            name: name.trim().to_string(),
            settings,
            created_at: now,
            updated_at: now,
        };
        let room = self.repos.rooms.create(&room).await?;

        tracing::info!(room_id = room.id, "Room created");
        Ok(room)
    }

    pub async fn get_room(&self, room_id: i64) -> Result<Room, AppError> {
        self.repos
            .rooms
            .find_by_id(room_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Room {} not found", room_id)))
    }

    /// Apply a settings patch.
    ///
    /// Limits may drop below current usage: existing data stays and only
    /// new writes are rejected.
    pub async fn update_settings(&self, room_id: i64, patch: &RoomSettingsPatch) -> Result<Room, AppError> {
        let room = self.get_room(room_id).await?;
        let settings = room.settings.merged(patch);
        settings.validate().map_err(AppError::Validation)?;

        let room = self.repos.rooms.update_settings(room_id, &settings).await?;

        tracing::info!(room_id, "Room settings updated");
        emit(
            self.notifier.as_ref(),
            Topic::Room(room_id),
            &LifecycleEvent::RoomUpdate {
                id: room_id.to_string(),
            },
        );
        Ok(room)
    }

    /// Delete a room and everything it owns, then purge its blobs.
    pub async fn delete_room(&self, room_id: i64) -> Result<RoomDeletion, AppError> {
        let keys = {
            // Writers mid-reservation finish before the room goes away.
            let _guard = self.locks.lock(room_id).await;
            self.repos.rooms.delete(room_id).await?
        };

        let blobs = self.purge(keys, "manual").await;
        tracing::info!(
            room_id,
            blobs_deleted = blobs.deleted,
            orphans = blobs.orphans.len(),
            "Room deleted"
        );
        emit(
            self.notifier.as_ref(),
            Topic::Room(room_id),
            &LifecycleEvent::RoomDelete {
                id: room_id.to_string(),
            },
        );
        Ok(RoomDeletion { room_id, blobs })
    }

    pub async fn room_usage(&self, room_id: i64) -> Result<RoomUsageReport, AppError> {
        let room = self.get_room(room_id).await?;
        let usage = QuotaEvaluator::new(self.repos.rooms.clone())
            .usage(room_id)
            .await?;
        Ok(RoomUsageReport {
            room_id,
            usage,
            limits: room.settings,
        })
    }

    pub async fn list_channels(&self, room_id: i64) -> Result<Vec<Channel>, AppError> {
        self.get_room(room_id).await?;
        self.repos.channels.find_by_room_id(room_id).await
    }

    pub async fn get_file(&self, file_id: i64) -> Result<File, AppError> {
        self.repos
            .files
            .find_by_id(file_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("File {} not found", file_id)))
    }

    pub async fn get_message(&self, message_id: i64) -> Result<Message, AppError> {
        self.repos
            .messages
            .find_by_id(message_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Message {} not found", message_id)))
    }

    /// A message together with the file its upload points at.
    pub async fn get_message_with_file(
        &self,
        message_id: i64,
    ) -> Result<(Message, Option<File>), AppError> {
        let message = self.get_message(message_id).await?;
        let file = match self.repos.messages.find_upload(message_id).await? {
            Some(upload) => self.repos.files.find_by_id(upload.file_id).await?,
            None => None,
        };
        Ok((message, file))
    }

    pub async fn create_webhook(&self, channel_id: i64, name: &str) -> Result<Webhook, AppError> {
        self.repos
            .channels
            .find_by_id(channel_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Channel {} not found", channel_id)))?;

        let webhook = Webhook {
            id: self.ids.generate(),
            channel_id,
            name: name.trim().to_string(),
            created_at: self.clock.now(),
        };
        self.repos.webhooks.create(&webhook).await
    }

    /// Delete a message with its upload and file, then purge the blob.
    pub async fn delete_message(&self, message_id: i64) -> Result<PurgeOutcome, AppError> {
        let deleted = self
            .repos
            .messages
            .delete(message_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Message {} not found", message_id)))?;

        let room_id = self
            .repos
            .channels
            .find_by_id(deleted.message.channel_id)
            .await?
            .map(|c| c.room_id);

        let outcome = self.purge(deleted.blob_keys, "manual").await;
        emit(
            self.notifier.as_ref(),
            Topic::Channel(deleted.message.channel_id),
            &LifecycleEvent::MessageDelete {
                id: message_id.to_string(),
                channel_id: deleted.message.channel_id.to_string(),
                room_id: room_id.map(|id| id.to_string()).unwrap_or_default(),
                expired: false,
            },
        );
        Ok(outcome)
    }

    /// Delete a file and the uploads pointing at it, then purge the blob.
    pub async fn delete_file(&self, file_id: i64) -> Result<PurgeOutcome, AppError> {
        let file = self
            .repos
            .files
            .delete(file_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("File {} not found", file_id)))?;

        let outcome = self.purge(vec![file.key.clone()], "manual").await;
        emit(
            self.notifier.as_ref(),
            Topic::Room(file.room_id),
            &LifecycleEvent::FileDelete {
                id: file_id.to_string(),
                room_id: file.room_id.to_string(),
                expired: false,
            },
        );
        Ok(outcome)
    }

    async fn purge(&self, keys: Vec<String>, source: &str) -> PurgeOutcome {
        purge_blobs(
            self.blobs.as_ref(),
            keys,
            self.blob_concurrency,
            self.blob_timeout,
            source,
        )
        .await
    }
}
