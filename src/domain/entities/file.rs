//! File metadata, message uploads, and the file repository trait.
//!
//! A `files` row points at exactly one blob in the blob store. The row and
//! the blob must both exist or both be gone; the row is authoritative.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::shared::error::AppError;

/// Coarse media type of a stored file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum FileType {
    Image,
    Video,
    Audio,
    Text,
    #[default]
    Other,
}

impl FileType {
    /// Classify a MIME type (e.g. "image/png").
    pub fn from_mime(mime: &str) -> Self {
        match mime.split('/').next().unwrap_or_default() {
            "image" => Self::Image,
            "video" => Self::Video,
            "audio" => Self::Audio,
            "text" => Self::Text,
            _ => Self::Other,
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "image" => Self::Image,
            "video" => Self::Video,
            "audio" => Self::Audio,
            "text" => Self::Text,
            _ => Self::Other,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Image => "image",
            Self::Video => "video",
            Self::Audio => "audio",
            Self::Text => "text",
            Self::Other => "other",
        }
    }
}

/// Provisioning state of a file row.
///
/// Rows are reserved as `Pending` before the blob upload and flipped to
/// `Active` once the blob is stored. Pending bytes count toward usage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum FileStatus {
    #[default]
    Pending,
    Active,
}

impl FileStatus {
    pub fn parse(s: &str) -> Self {
        match s {
            "active" => Self::Active,
            _ => Self::Pending,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Active => "active",
        }
    }
}

/// File metadata record.
///
/// Maps to the `files` table:
/// - id: BIGINT PRIMARY KEY (Snowflake ID)
/// - room_id: BIGINT NOT NULL REFERENCES rooms(id) ON DELETE CASCADE
/// - key: TEXT NOT NULL UNIQUE (blob store key)
/// - name: VARCHAR(255) NOT NULL
/// - size_bytes: BIGINT NOT NULL
/// - type: VARCHAR(16) NOT NULL
/// - status: VARCHAR(16) NOT NULL DEFAULT 'pending'
/// - created_at: TIMESTAMPTZ NOT NULL DEFAULT NOW()
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct File {
    pub id: i64,
    pub room_id: i64,
    pub key: String,
    pub name: String,
    pub size_bytes: i64,
    #[serde(rename = "type")]
    pub file_type: FileType,
    pub status: FileStatus,
    pub created_at: DateTime<Utc>,
}

/// Typed pointer from a message to the file it carries.
///
/// Maps to the `uploads` table (message_id cascades from `messages`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Upload {
    pub id: i64,
    pub message_id: i64,
    pub file_id: i64,
    #[serde(rename = "type")]
    pub upload_type: FileType,
}

/// Repository trait for File data access operations.
#[async_trait]
pub trait FileRepository: Send + Sync {
    /// Find a file by its Snowflake ID.
    async fn find_by_id(&self, id: i64) -> Result<Option<File>, AppError>;

    /// Insert a `Pending` row that holds the room's bytes until finalised.
    async fn reserve(&self, file: &File) -> Result<File, AppError>;

    /// Mark a reserved row `Active`.
    async fn activate(&self, id: i64) -> Result<File, AppError>;

    /// Drop a reservation that never became active.
    async fn discard(&self, id: i64) -> Result<(), AppError>;

    /// Delete uploads pointing at the file, then the file row, in one
    /// transaction. Returns the removed row, or `None` when it was missing.
    async fn delete(&self, id: i64) -> Result<Option<File>, AppError>;
}
