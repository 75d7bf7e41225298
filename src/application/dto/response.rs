//! Response DTOs
//!
//! Data structures for API response bodies. Snowflake IDs are serialized as
//! strings so JavaScript clients do not lose precision.

use serde::Serialize;

use crate::application::services::{PostedMessage, PurgeOutcome, RoomDeletion, RoomUsageReport};
use crate::domain::{Channel, File, Member, Message, Room, RoomSettings, RoomUsage, Webhook};

/// Room response
#[derive(Debug, Serialize)]
pub struct RoomResponse {
    pub id: String,
    pub name: String,
    pub settings: RoomSettings,
    pub created_at: String,
    pub updated_at: String,
}

impl From<Room> for RoomResponse {
    fn from(room: Room) -> Self {
        Self {
            id: room.id.to_string(),
            name: room.name,
            settings: room.settings,
            created_at: room.created_at.to_rfc3339(),
            updated_at: room.updated_at.to_rfc3339(),
        }
    }
}

/// Room usage response
#[derive(Debug, Serialize)]
pub struct UsageResponse {
    pub room_id: String,
    pub usage: RoomUsage,
    pub limits: RoomSettings,
}

impl From<RoomUsageReport> for UsageResponse {
    fn from(report: RoomUsageReport) -> Self {
        Self {
            room_id: report.room_id.to_string(),
            usage: report.usage,
            limits: report.limits,
        }
    }
}

/// Channel response
#[derive(Debug, Serialize)]
pub struct ChannelResponse {
    pub id: String,
    pub room_id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub channel_type: String,
    pub created_at: String,
}

impl From<Channel> for ChannelResponse {
    fn from(channel: Channel) -> Self {
        Self {
            id: channel.id.to_string(),
            room_id: channel.room_id.to_string(),
            name: channel.name,
            channel_type: channel.channel_type.as_str().to_string(),
            created_at: channel.created_at.to_rfc3339(),
        }
    }
}

/// Member response
#[derive(Debug, Serialize)]
pub struct MemberResponse {
    pub room_id: String,
    pub user_id: String,
    pub joined_at: String,
}

impl From<Member> for MemberResponse {
    fn from(member: Member) -> Self {
        Self {
            room_id: member.room_id.to_string(),
            user_id: member.user_id.to_string(),
            joined_at: member.joined_at.to_rfc3339(),
        }
    }
}

/// File response
#[derive(Debug, Serialize)]
pub struct FileResponse {
    pub id: String,
    pub room_id: String,
    pub key: String,
    pub name: String,
    pub size_bytes: i64,
    #[serde(rename = "type")]
    pub file_type: String,
    pub created_at: String,
}

impl From<File> for FileResponse {
    fn from(file: File) -> Self {
        Self {
            id: file.id.to_string(),
            room_id: file.room_id.to_string(),
            key: file.key,
            name: file.name,
            size_bytes: file.size_bytes,
            file_type: file.file_type.as_str().to_string(),
            created_at: file.created_at.to_rfc3339(),
        }
    }
}

/// Message response
#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub id: String,
    pub channel_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub webhook_id: Option<String>,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<FileResponse>,
    pub created_at: String,
}

impl MessageResponse {
    pub fn with_file(message: Message, file: Option<File>) -> Self {
        Self {
            id: message.id.to_string(),
            channel_id: message.channel_id.to_string(),
            author_id: message.author_id.map(|id| id.to_string()),
            webhook_id: message.webhook_id.map(|id| id.to_string()),
            content: message.content,
            file: file.map(FileResponse::from),
            created_at: message.created_at.to_rfc3339(),
        }
    }
}

impl From<PostedMessage> for MessageResponse {
    fn from(posted: PostedMessage) -> Self {
        Self::with_file(posted.message, posted.file)
    }
}

/// Webhook response
#[derive(Debug, Serialize)]
pub struct WebhookResponse {
    pub id: String,
    pub channel_id: String,
    pub name: String,
    pub created_at: String,
}

impl From<Webhook> for WebhookResponse {
    fn from(webhook: Webhook) -> Self {
        Self {
            id: webhook.id.to_string(),
            channel_id: webhook.channel_id.to_string(),
            name: webhook.name,
            created_at: webhook.created_at.to_rfc3339(),
        }
    }
}

/// Result of a delete that released blobs
#[derive(Debug, Serialize)]
pub struct DeletionResponse {
    pub id: String,
    pub blobs_deleted: u64,
    pub orphaned_blobs: Vec<String>,
}

impl DeletionResponse {
    pub fn new(id: i64, outcome: PurgeOutcome) -> Self {
        Self {
            id: id.to_string(),
            blobs_deleted: outcome.deleted,
            orphaned_blobs: outcome.orphans.into_iter().map(|o| o.key).collect(),
        }
    }
}

impl From<RoomDeletion> for DeletionResponse {
    fn from(deletion: RoomDeletion) -> Self {
        Self::new(deletion.room_id, deletion.blobs)
    }
}
