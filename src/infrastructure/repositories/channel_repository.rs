//! Channel Repository Implementation
//!
//! PostgreSQL implementation of the ChannelRepository trait.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::domain::{Channel, ChannelRepository, ChannelType};
use crate::shared::error::AppError;

/// Database row representation matching the channels table schema.
#[derive(Debug, sqlx::FromRow)]
struct ChannelRow {
    id: i64,
    room_id: i64,
    name: String,
    #[sqlx(rename = "type")]
    channel_type: String,
    created_at: DateTime<Utc>,
}

impl ChannelRow {
    /// Convert database row to domain Channel entity.
    fn into_channel(self) -> Channel {
        Channel {
            id: self.id,
            room_id: self.room_id,
            name: self.name,
            channel_type: ChannelType::parse(&self.channel_type).unwrap_or_default(),
            created_at: self.created_at,
        }
    }
}

/// PostgreSQL channel repository implementation.
#[derive(Clone)]
pub struct PgChannelRepository {
    pool: PgPool,
}

impl PgChannelRepository {
    /// Create a new PgChannelRepository with the given connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ChannelRepository for PgChannelRepository {
    async fn find_by_id(&self, id: i64) -> Result<Option<Channel>, AppError> {
        let row = sqlx::query_as::<_, ChannelRow>(
            r#"
            SELECT id, room_id, name, type, created_at
            FROM channels
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| r.into_channel()))
    }

    async fn find_by_room_id(&self, room_id: i64) -> Result<Vec<Channel>, AppError> {
        let rows = sqlx::query_as::<_, ChannelRow>(
            r#"
            SELECT id, room_id, name, type, created_at
            FROM channels
            WHERE room_id = $1
            ORDER BY created_at ASC, id ASC
            "#,
        )
        .bind(room_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(|r| r.into_channel()).collect())
    }

    async fn create(&self, channel: &Channel) -> Result<Channel, AppError> {
        let row = sqlx::query_as::<_, ChannelRow>(
            r#"
            INSERT INTO channels (id, room_id, name, type, created_at)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, room_id, name, type, created_at
            "#,
        )
        .bind(channel.id)
        .bind(channel.room_id)
        .bind(&channel.name)
        .bind(channel.channel_type.as_str())
        .bind(channel.created_at)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match &e {
            sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
                AppError::Conflict("Channel with this ID already exists".to_string())
            }
            _ => AppError::Database(e),
        })?;

        Ok(row.into_channel())
    }
}
