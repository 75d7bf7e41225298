//! Message entity and repository trait.
//!
//! Maps to the `messages` table in the database schema.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::file::Upload;
use crate::shared::error::AppError;

/// Maximum message content length in characters.
pub const MAX_CONTENT_LENGTH: usize = 4000;

/// A message posted into a channel, by a user or by a webhook.
///
/// `created_at` drives retention age.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: i64,
    pub channel_id: i64,
    /// Set for user-authored messages
    pub author_id: Option<i64>,
    /// Set for webhook-authored messages
    pub webhook_id: Option<i64>,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

impl Message {
    pub fn is_webhook_message(&self) -> bool {
        self.webhook_id.is_some()
    }
}

/// Result of deleting a message tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeletedMessage {
    pub message: Message,
    /// Blob keys of files that were attached to the message
    pub blob_keys: Vec<String>,
}

/// Repository trait for Message data access operations.
#[async_trait]
pub trait MessageRepository: Send + Sync {
    /// Find a message by its Snowflake ID.
    async fn find_by_id(&self, id: i64) -> Result<Option<Message>, AppError>;

    /// Insert a message and its optional upload in one transaction.
    async fn create(&self, message: &Message, upload: Option<&Upload>) -> Result<Message, AppError>;

    /// Find the upload attached to a message.
    async fn find_upload(&self, message_id: i64) -> Result<Option<Upload>, AppError>;

    /// Delete Upload, then File metadata, then the Message, in one transaction.
    async fn delete(&self, id: i64) -> Result<Option<DeletedMessage>, AppError>;
}
