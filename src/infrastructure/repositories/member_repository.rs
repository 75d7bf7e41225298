//! Member Repository Implementation
//!
//! PostgreSQL implementation of the MemberRepository trait.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::domain::{Member, MemberRepository};
use crate::shared::error::AppError;

/// Database row representation matching the room_members table schema.
#[derive(Debug, sqlx::FromRow)]
struct MemberRow {
    room_id: i64,
    user_id: i64,
    joined_at: DateTime<Utc>,
}

impl MemberRow {
    fn into_member(self) -> Member {
        Member {
            room_id: self.room_id,
            user_id: self.user_id,
            joined_at: self.joined_at,
        }
    }
}

/// PostgreSQL member repository implementation.
#[derive(Clone)]
pub struct PgMemberRepository {
    pool: PgPool,
}

impl PgMemberRepository {
    /// Create a new PgMemberRepository with the given connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MemberRepository for PgMemberRepository {
    async fn find(&self, room_id: i64, user_id: i64) -> Result<Option<Member>, AppError> {
        let row = sqlx::query_as::<_, MemberRow>(
            r#"
            SELECT room_id, user_id, joined_at
            FROM room_members
            WHERE room_id = $1 AND user_id = $2
            "#,
        )
        .bind(room_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| r.into_member()))
    }

    async fn add(&self, member: &Member) -> Result<Member, AppError> {
        let row = sqlx::query_as::<_, MemberRow>(
            r#"
            INSERT INTO room_members (room_id, user_id, joined_at)
            VALUES ($1, $2, $3)
            RETURNING room_id, user_id, joined_at
            "#,
        )
        .bind(member.room_id)
        .bind(member.user_id)
        .bind(member.joined_at)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match &e {
            sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
                AppError::Conflict("User is already a member of this room".to_string())
            }
            _ => AppError::Database(e),
        })?;

        Ok(row.into_member())
    }
}
