//! Room entity and repository trait.
//!
//! Maps to the `rooms` table in the database schema.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::value_objects::ResourceClass;
use crate::shared::error::AppError;

/// Quota and retention settings of a room.
///
/// Byte limits and counts are plain integers. A TTL of `None` or `0` days
/// disables retention for that resource class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomSettings {
    /// Aggregate bytes allowed across all room files
    pub total_bytes_allowed: i64,

    /// Largest single file accepted
    pub single_file_bytes_allowed: i64,

    /// Maximum number of channels
    pub max_channels: i64,

    /// Maximum number of members
    pub max_users: i64,

    /// Days a file is kept before the file sweep removes it
    pub file_days_to_live: Option<i32>,

    /// Days a message is kept before the message sweep removes it
    pub message_days_to_live: Option<i32>,
}

impl RoomSettings {
    /// Effective TTL in days for a resource class, `None` when retention is off.
    pub fn ttl_days(&self, class: ResourceClass) -> Option<i64> {
        let ttl = match class {
            ResourceClass::Files => self.file_days_to_live,
            ResourceClass::Messages => self.message_days_to_live,
        };
        ttl.filter(|days| *days > 0).map(i64::from)
    }

    /// Apply a partial update, returning the merged settings.
    pub fn merged(&self, patch: &RoomSettingsPatch) -> Self {
        Self {
            total_bytes_allowed: patch.total_bytes_allowed.unwrap_or(self.total_bytes_allowed),
            single_file_bytes_allowed: patch
                .single_file_bytes_allowed
                .unwrap_or(self.single_file_bytes_allowed),
            max_channels: patch.max_channels.unwrap_or(self.max_channels),
            max_users: patch.max_users.unwrap_or(self.max_users),
            file_days_to_live: patch.file_days_to_live.unwrap_or(self.file_days_to_live),
            message_days_to_live: patch
                .message_days_to_live
                .unwrap_or(self.message_days_to_live),
        }
    }

    /// Check internal consistency of the limits.
    pub fn validate(&self) -> Result<(), String> {
        if self.total_bytes_allowed < 0
            || self.single_file_bytes_allowed < 0
            || self.max_channels < 0
            || self.max_users < 0
        {
            return Err("quota values must not be negative".into());
        }
        if self.file_days_to_live.is_some_and(|d| d < 0)
            || self.message_days_to_live.is_some_and(|d| d < 0)
        {
            return Err("days to live must not be negative".into());
        }
        if self.single_file_bytes_allowed > self.total_bytes_allowed {
            return Err("singleFileBytesAllowed must not exceed totalBytesAllowed".into());
        }
        Ok(())
    }
}

/// Partial settings update sent by room admins.
///
/// For TTL fields the outer `Option` means "leave unchanged" and the inner
/// `None` clears the TTL.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoomSettingsPatch {
    pub total_bytes_allowed: Option<i64>,
    pub single_file_bytes_allowed: Option<i64>,
    pub max_channels: Option<i64>,
    pub max_users: Option<i64>,
    pub file_days_to_live: Option<Option<i32>>,
    pub message_days_to_live: Option<Option<i32>>,
}

/// Represents a room: the unit of quota and retention.
///
/// Maps to the `rooms` table:
/// - id: BIGINT PRIMARY KEY (Snowflake ID)
/// - name: VARCHAR(100) NOT NULL
/// - total_bytes_allowed / single_file_bytes_allowed: BIGINT NOT NULL
/// - max_channels / max_users: BIGINT NOT NULL
/// - file_days_to_live / message_days_to_live: INTEGER NULL
/// - created_at / updated_at: TIMESTAMPTZ NOT NULL DEFAULT NOW()
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Room {
    pub id: i64,
    pub name: String,
    pub settings: RoomSettings,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Derived usage counters. Never stored, always recomputed by aggregate query.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomUsage {
    pub bytes_used: i64,
    pub channel_count: i64,
    pub member_count: i64,
}

/// Repository trait for Room data access operations.
#[async_trait]
pub trait RoomRepository: Send + Sync {
    /// Find a room by its Snowflake ID.
    async fn find_by_id(&self, id: i64) -> Result<Option<Room>, AppError>;

    /// Create a new room.
    async fn create(&self, room: &Room) -> Result<Room, AppError>;

    /// Replace a room's quota and retention settings.
    async fn update_settings(&self, id: i64, settings: &RoomSettings) -> Result<Room, AppError>;

    /// Delete a room and all of its children in one transaction.
    ///
    /// Returns the blob keys of the files that were removed.
    async fn delete(&self, id: i64) -> Result<Vec<String>, AppError>;

    /// Page through rooms ordered by creation time ascending.
    async fn list_page(&self, offset: i64, limit: i64) -> Result<Vec<Room>, AppError>;

    /// Sum of `size_bytes` over the room's file records, pending ones included.
    async fn bytes_used(&self, room_id: i64) -> Result<i64, AppError>;

    /// Number of channels in the room.
    async fn channel_count(&self, room_id: i64) -> Result<i64, AppError>;

    /// Number of members in the room.
    async fn member_count(&self, room_id: i64) -> Result<i64, AppError>;
}
