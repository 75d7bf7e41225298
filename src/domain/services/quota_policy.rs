//! Quota decision domain service.
//!
//! Pure functions: given a room's settings, its current usage and a proposed
//! delta, decide whether the write would breach a limit. Nothing here reads
//! or mutates state.

use crate::domain::entities::{RoomSettings, RoomUsage};
use crate::domain::value_objects::{QuotaLimit, QuotaViolation};

/// Domain service for evaluating room quotas.
pub struct QuotaPolicy;

impl QuotaPolicy {
    /// `current + proposed > totalBytesAllowed`
    pub fn exceeds_total_storage(settings: &RoomSettings, bytes_used: i64, proposed_bytes: i64) -> bool {
        bytes_used.saturating_add(proposed_bytes) > settings.total_bytes_allowed
    }

    /// `proposed > singleFileBytesAllowed`
    pub fn exceeds_single_file_size(settings: &RoomSettings, proposed_bytes: i64) -> bool {
        proposed_bytes > settings.single_file_bytes_allowed
    }

    /// `channels + add > maxChannels`
    pub fn exceeds_channel_count(settings: &RoomSettings, channel_count: i64, add: i64) -> bool {
        channel_count.saturating_add(add) > settings.max_channels
    }

    /// `members + add > maxUsers`
    pub fn exceeds_member_count(settings: &RoomSettings, member_count: i64, add: i64) -> bool {
        member_count.saturating_add(add) > settings.max_users
    }

    /// Check a file of `size_bytes` against both storage limits.
    ///
    /// The single-file limit is checked first so an oversized file is
    /// rejected regardless of total headroom.
    pub fn check_file(
        settings: &RoomSettings,
        usage: &RoomUsage,
        size_bytes: i64,
    ) -> Result<(), QuotaViolation> {
        if Self::exceeds_single_file_size(settings, size_bytes) {
            return Err(QuotaViolation::new(
                QuotaLimit::SingleFileBytesAllowed,
                settings.single_file_bytes_allowed,
                0,
                size_bytes,
            ));
        }
        if Self::exceeds_total_storage(settings, usage.bytes_used, size_bytes) {
            return Err(QuotaViolation::new(
                QuotaLimit::TotalBytesAllowed,
                settings.total_bytes_allowed,
                usage.bytes_used,
                size_bytes,
            ));
        }
        Ok(())
    }

    pub fn check_channels(
        settings: &RoomSettings,
        usage: &RoomUsage,
        add: i64,
    ) -> Result<(), QuotaViolation> {
        if Self::exceeds_channel_count(settings, usage.channel_count, add) {
            return Err(QuotaViolation::new(
                QuotaLimit::MaxChannels,
                settings.max_channels,
                usage.channel_count,
                add,
            ));
        }
        Ok(())
    }

    pub fn check_members(
        settings: &RoomSettings,
        usage: &RoomUsage,
        add: i64,
    ) -> Result<(), QuotaViolation> {
        if Self::exceeds_member_count(settings, usage.member_count, add) {
            return Err(QuotaViolation::new(
                QuotaLimit::MaxUsers,
                settings.max_users,
                usage.member_count,
                add,
            ));
        }
        Ok(())
    }
}
