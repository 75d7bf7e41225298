//! Quota Service
//!
//! Reads a room's current usage and applies [`QuotaPolicy`] to a proposed
//! delta. Usage is always recomputed with aggregate queries, never cached.

use std::sync::Arc;

use crate::domain::services::QuotaPolicy;
use crate::domain::{QuotaViolation, Room, RoomRepository, RoomUsage};
use crate::infrastructure::metrics;
use crate::shared::error::AppError;

/// Quota evaluator bound to a room repository.
#[derive(Clone)]
pub struct QuotaEvaluator {
    rooms: Arc<dyn RoomRepository>,
}

impl QuotaEvaluator {
    pub fn new(rooms: Arc<dyn RoomRepository>) -> Self {
        Self { rooms }
    }

    /// Current usage counters of a room.
    pub async fn usage(&self, room_id: i64) -> Result<RoomUsage, AppError> {
        let (bytes_used, channel_count, member_count) = futures::try_join!(
            self.rooms.bytes_used(room_id),
            self.rooms.channel_count(room_id),
            self.rooms.member_count(room_id),
        )?;
        Ok(RoomUsage {
            bytes_used,
            channel_count,
            member_count,
        })
    }

    pub async fn exceeds_total_storage(&self, room: &Room, proposed_bytes: i64) -> Result<bool, AppError> {
        let used = self.rooms.bytes_used(room.id).await?;
        Ok(QuotaPolicy::exceeds_total_storage(&room.settings, used, proposed_bytes))
    }

    pub fn exceeds_single_file_size(&self, room: &Room, proposed_bytes: i64) -> bool {
        QuotaPolicy::exceeds_single_file_size(&room.settings, proposed_bytes)
    }

    pub async fn exceeds_channel_count(&self, room: &Room, add: i64) -> Result<bool, AppError> {
        let count = self.rooms.channel_count(room.id).await?;
        Ok(QuotaPolicy::exceeds_channel_count(&room.settings, count, add))
    }

    pub async fn exceeds_member_count(&self, room: &Room, add: i64) -> Result<bool, AppError> {
        let count = self.rooms.member_count(room.id).await?;
        Ok(QuotaPolicy::exceeds_member_count(&room.settings, count, add))
    }

    /// Reject a file that is too large on its own or would overflow the room.
    pub async fn check_file(&self, room: &Room, size_bytes: i64) -> Result<(), AppError> {
        if self.exceeds_single_file_size(room, size_bytes) {
            let usage = RoomUsage::default();
            return QuotaPolicy::check_file(&room.settings, &usage, size_bytes)
                .map_err(|v| self.reject(room, v));
        }
        let usage = RoomUsage {
            bytes_used: self.rooms.bytes_used(room.id).await?,
            ..Default::default()
        };
        QuotaPolicy::check_file(&room.settings, &usage, size_bytes).map_err(|v| self.reject(room, v))
    }

    pub async fn check_channels(&self, room: &Room, add: i64) -> Result<(), AppError> {
        let usage = RoomUsage {
            channel_count: self.rooms.channel_count(room.id).await?,
            ..Default::default()
        };
        QuotaPolicy::check_channels(&room.settings, &usage, add).map_err(|v| self.reject(room, v))
    }

    pub async fn check_members(&self, room: &Room, add: i64) -> Result<(), AppError> {
        let usage = RoomUsage {
            member_count: self.rooms.member_count(room.id).await?,
            ..Default::default()
        };
        QuotaPolicy::check_members(&room.settings, &usage, add).map_err(|v| self.reject(room, v))
    }

    fn reject(&self, room: &Room, violation: QuotaViolation) -> AppError {
        tracing::info!(
            room_id = room.id,
            limit = violation.limit.as_str(),
            allowed = violation.allowed,
            current = violation.current,
            attempted = violation.attempted,
            "Write rejected by room quota"
        );
        metrics::record_quota_rejection(violation.limit.as_str());
        AppError::QuotaExceeded(violation)
    }
}
