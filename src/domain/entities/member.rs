//! Room membership entity and repository trait.
//!
//! Maps to the `room_members` table.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::shared::error::AppError;

/// A user's membership in a room. Counted against the room's member quota.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    pub room_id: i64,
    pub user_id: i64,
    pub joined_at: DateTime<Utc>,
}

/// Repository trait for Member data access operations.
#[async_trait]
pub trait MemberRepository: Send + Sync {
    /// Find a membership by room and user.
    async fn find(&self, room_id: i64, user_id: i64) -> Result<Option<Member>, AppError>;

    /// Add a member to a room.
    async fn add(&self, member: &Member) -> Result<Member, AppError>;
}
