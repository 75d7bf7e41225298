//! Retention resource classes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Kind of resource a retention sweep expires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceClass {
    /// Room files (and any uploads pointing at them)
    Files,
    /// Channel messages, including webhook messages, with their attachments
    Messages,
}

impl ResourceClass {
    pub const ALL: [ResourceClass; 2] = [ResourceClass::Files, ResourceClass::Messages];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Files => "files",
            Self::Messages => "messages",
        }
    }
}

impl fmt::Display for ResourceClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResourceClass {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "files" | "file" => Ok(Self::Files),
            "messages" | "message" => Ok(Self::Messages),
            other => Err(format!("unknown resource class '{}'", other)),
        }
    }
}

/// A resource selected for expiry.
///
/// `channel_id` is set for messages so deletion events can be routed to the
/// channel's subscribers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpiredResource {
    pub id: i64,
    pub room_id: i64,
    pub channel_id: Option<i64>,
    pub created_at: DateTime<Utc>,
}

/// Outcome of deleting one page of expired resources inside a transaction.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeletedBatch {
    /// Ids of the primary records removed (messages or files)
    pub ids: Vec<i64>,
    /// Blob keys whose metadata rows were removed and must be purged
    pub blob_keys: Vec<String>,
}

impl DeletedBatch {
    pub fn deleted(&self) -> u64 {
        self.ids.len() as u64
    }
}
