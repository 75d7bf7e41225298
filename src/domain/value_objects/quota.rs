//! Quota limits and violations.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A bounded room resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum QuotaLimit {
    /// Aggregate bytes stored across all of a room's files
    TotalBytesAllowed,
    /// Size of a single uploaded file
    SingleFileBytesAllowed,
    /// Number of channels in a room
    MaxChannels,
    /// Number of members in a room
    MaxUsers,
}

impl QuotaLimit {
    /// Name of the room setting that carries this limit.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TotalBytesAllowed => "totalBytesAllowed",
            Self::SingleFileBytesAllowed => "singleFileBytesAllowed",
            Self::MaxChannels => "maxChannels",
            Self::MaxUsers => "maxUsers",
        }
    }
}

impl fmt::Display for QuotaLimit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A rejected write: which limit, its configured value, usage at check time
/// and the delta the caller attempted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuotaViolation {
    pub limit: QuotaLimit,
    pub allowed: i64,
    pub current: i64,
    pub attempted: i64,
}

impl QuotaViolation {
    pub fn new(limit: QuotaLimit, allowed: i64, current: i64, attempted: i64) -> Self {
        Self {
            limit,
            allowed,
            current,
            attempted,
        }
    }
}

impl fmt::Display for QuotaViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Quota exceeded for {}: limit {}, current {}, attempted +{}",
            self.limit, self.allowed, self.current, self.attempted
        )
    }
}
