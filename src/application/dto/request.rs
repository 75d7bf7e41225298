//! Request DTOs
//!
//! Data structures for API request bodies.

use serde::Deserialize;
use validator::Validate;

use crate::domain::RoomSettingsPatch;

/// Quota and retention fields a caller may set.
///
/// A TTL of `0` disables retention for that class.
#[derive(Debug, Default, Deserialize, Validate)]
pub struct RoomSettingsRequest {
    #[validate(range(min = 0, message = "must be non-negative"))]
    pub total_bytes_allowed: Option<i64>,

    #[validate(range(min = 0, message = "must be non-negative"))]
    pub single_file_bytes_allowed: Option<i64>,

    #[validate(range(min = 0, message = "must be non-negative"))]
    pub max_channels: Option<i64>,

    #[validate(range(min = 0, message = "must be non-negative"))]
    pub max_users: Option<i64>,

    #[validate(range(min = 0, message = "must be non-negative"))]
    pub file_days_to_live: Option<i32>,

    #[validate(range(min = 0, message = "must be non-negative"))]
    pub message_days_to_live: Option<i32>,
}

impl RoomSettingsRequest {
    pub fn to_patch(&self) -> RoomSettingsPatch {
        RoomSettingsPatch {
            total_bytes_allowed: self.total_bytes_allowed,
            single_file_bytes_allowed: self.single_file_bytes_allowed,
            max_channels: self.max_channels,
            max_users: self.max_users,
            file_days_to_live: self.file_days_to_live.map(ttl),
            message_days_to_live: self.message_days_to_live.map(ttl),
        }
    }
}

fn ttl(days: i32) -> Option<i32> {
    (days > 0).then_some(days)
}

/// Create room request
#[derive(Debug, Deserialize, Validate)]
pub struct CreateRoomRequest {
    #[validate(length(min = 1, max = 100, message = "Name must be 1-100 characters"))]
    pub name: String,

    #[serde(default)]
    #[validate(nested)]
    pub settings: RoomSettingsRequest,
}

/// Create channel request
#[derive(Debug, Deserialize, Validate)]
pub struct CreateChannelRequest {
    #[validate(length(min = 1, max = 100, message = "Name must be 1-100 characters"))]
    pub name: String,

    #[serde(rename = "type")]
    pub channel_type: Option<String>,
}

/// Add member request
#[derive(Debug, Deserialize)]
pub struct AddMemberRequest {
    pub user_id: i64,
}

/// Create message request
#[derive(Debug, Deserialize, Validate)]
pub struct CreateMessageRequest {
    #[validate(length(max = 4000, message = "Content must be at most 4000 characters"))]
    pub content: String,

    pub author_id: i64,
}

/// Create webhook request
#[derive(Debug, Deserialize, Validate)]
pub struct CreateWebhookRequest {
    #[validate(length(min = 1, max = 80, message = "Name must be 1-80 characters"))]
    pub name: String,
}

/// Webhook message request
#[derive(Debug, Deserialize, Validate)]
pub struct WebhookMessageRequest {
    #[validate(length(max = 4000, message = "Content must be at most 4000 characters"))]
    pub content: String,
}
