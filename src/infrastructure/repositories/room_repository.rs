//! Room Repository Implementation
//!
//! PostgreSQL implementation of the RoomRepository trait.
//! Usage counters are always recomputed with aggregate queries.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::domain::{Room, RoomRepository, RoomSettings};
use crate::infrastructure::database::with_transaction;
use crate::shared::error::AppError;

/// Database row representation matching the rooms table schema.
#[derive(Debug, sqlx::FromRow)]
pub(super) struct RoomRow {
    id: i64,
    name: String,
    total_bytes_allowed: i64,
    single_file_bytes_allowed: i64,
    max_channels: i64,
    max_users: i64,
    file_days_to_live: Option<i32>,
    message_days_to_live: Option<i32>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl RoomRow {
    /// Convert database row to domain Room entity.
    pub(super) fn into_room(self) -> Room {
        Room {
            id: self.id,
            name: self.name,
            settings: RoomSettings {
                total_bytes_allowed: self.total_bytes_allowed,
                single_file_bytes_allowed: self.single_file_bytes_allowed,
                max_channels: self.max_channels,
                max_users: self.max_users,
                file_days_to_live: self.file_days_to_live,
                message_days_to_live: self.message_days_to_live,
            },
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

pub(super) const ROOM_COLUMNS: &str = "id, name, total_bytes_allowed, single_file_bytes_allowed, \
     max_channels, max_users, file_days_to_live, message_days_to_live, created_at, updated_at";

/// PostgreSQL room repository implementation.
#[derive(Clone)]
pub struct PgRoomRepository {
    pool: PgPool,
}

impl PgRoomRepository {
    /// Create a new PgRoomRepository with the given connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RoomRepository for PgRoomRepository {
    async fn find_by_id(&self, id: i64) -> Result<Option<Room>, AppError> {
        let row = sqlx::query_as::<_, RoomRow>(&format!(
            "SELECT {} FROM rooms WHERE id = $1",
            ROOM_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| r.into_room()))
    }

    async fn create(&self, room: &Room) -> Result<Room, AppError> {
        let s = &room.settings;
        let row = sqlx::query_as::<_, RoomRow>(&format!(
            r#"
            INSERT INTO rooms (id, name, total_bytes_allowed, single_file_bytes_allowed,
                               max_channels, max_users, file_days_to_live, message_days_to_live,
                               created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $9)
            RETURNING {}
            "#,
            ROOM_COLUMNS
        ))
        .bind(room.id)
        .bind(&room.name)
        .bind(s.total_bytes_allowed)
        .bind(s.single_file_bytes_allowed)
        .bind(s.max_channels)
        .bind(s.max_users)
        .bind(s.file_days_to_live)
        .bind(s.message_days_to_live)
        .bind(room.created_at)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match &e {
            sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
                AppError::Conflict("Room with this ID already exists".to_string())
            }
            _ => AppError::Database(e),
        })?;

        Ok(row.into_room())
    }

    async fn update_settings(&self, id: i64, settings: &RoomSettings) -> Result<Room, AppError> {
        let row = sqlx::query_as::<_, RoomRow>(&format!(
            r#"
            UPDATE rooms
            SET total_bytes_allowed = $2,
                single_file_bytes_allowed = $3,
                max_channels = $4,
                max_users = $5,
                file_days_to_live = $6,
                message_days_to_live = $7,
                updated_at = NOW()
            WHERE id = $1
            RETURNING {}
            "#,
            ROOM_COLUMNS
        ))
        .bind(id)
        .bind(settings.total_bytes_allowed)
        .bind(settings.single_file_bytes_allowed)
        .bind(settings.max_channels)
        .bind(settings.max_users)
        .bind(settings.file_days_to_live)
        .bind(settings.message_days_to_live)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Room {} not found", id)))?;

        Ok(row.into_room())
    }

    async fn delete(&self, id: i64) -> Result<Vec<String>, AppError> {
        with_transaction(&self.pool, |mut ctx| async move {
            let keys = sqlx::query_scalar::<_, String>("SELECT key FROM files WHERE room_id = $1")
                .bind(id)
                .fetch_all(ctx.conn())
                .await?;

            // channels, messages, uploads, files and members cascade
            let result = sqlx::query("DELETE FROM rooms WHERE id = $1")
                .bind(id)
                .execute(ctx.conn())
                .await?;

            if result.rows_affected() == 0 {
                return Err(AppError::NotFound(format!("Room {} not found", id)));
            }
            Ok((keys, ctx))
        })
        .await
    }

    async fn list_page(&self, offset: i64, limit: i64) -> Result<Vec<Room>, AppError> {
        let rows = sqlx::query_as::<_, RoomRow>(&format!(
            "SELECT {} FROM rooms ORDER BY created_at ASC, id ASC OFFSET $1 LIMIT $2",
            ROOM_COLUMNS
        ))
        .bind(offset)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(|r| r.into_room()).collect())
    }

    async fn bytes_used(&self, room_id: i64) -> Result<i64, AppError> {
        let used = sqlx::query_scalar::<_, i64>(
            "SELECT COALESCE(SUM(size_bytes), 0)::BIGINT FROM files WHERE room_id = $1",
        )
        .bind(room_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(used)
    }

    async fn channel_count(&self, room_id: i64) -> Result<i64, AppError> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM channels WHERE room_id = $1")
            .bind(room_id)
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }

    async fn member_count(&self, room_id: i64) -> Result<i64, AppError> {
        let count =
            sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM room_members WHERE room_id = $1")
                .bind(room_id)
                .fetch_one(&self.pool)
                .await?;

        Ok(count)
    }
}
