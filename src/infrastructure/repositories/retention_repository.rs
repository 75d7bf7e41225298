//! Retention Store Implementation
//!
//! PostgreSQL queries behind the retention sweeper: stable room paging,
//! expired-resource selection and the per-page delete transaction.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use super::message_repository::delete_message_attachments;
use super::room_repository::{RoomRow, ROOM_COLUMNS};
use crate::domain::{DeletedBatch, ExpiredResource, ResourceClass, RetentionStore, Room};
use crate::infrastructure::database::with_transaction;
use crate::shared::error::AppError;

#[derive(Debug, sqlx::FromRow)]
struct ExpiredRow {
    id: i64,
    room_id: i64,
    channel_id: Option<i64>,
    created_at: DateTime<Utc>,
}

impl ExpiredRow {
    fn into_resource(self) -> ExpiredResource {
        ExpiredResource {
            id: self.id,
            room_id: self.room_id,
            channel_id: self.channel_id,
            created_at: self.created_at,
        }
    }
}

/// PostgreSQL retention store.
#[derive(Clone)]
pub struct PgRetentionStore {
    pool: PgPool,
}

impl PgRetentionStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RetentionStore for PgRetentionStore {
    async fn list_rooms(&self, offset: i64, limit: i64) -> Result<Vec<Room>, AppError> {
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

    async fn find_expired_page(
        &self,
        room_id: i64,
        class: ResourceClass,
        cutoff: DateTime<Utc>,
        offset: i64,
        limit: i64,
    ) -> Result<Vec<ExpiredResource>, AppError> {
        let sql = match class {
            // Webhook messages live in the same table and expire the same way.
            ResourceClass::Messages => {
                r#"
                SELECT m.id, c.room_id, m.channel_id, m.created_at
                FROM messages m
                JOIN channels c ON c.id = m.channel_id
                WHERE c.room_id = $1 AND m.created_at < $2
                ORDER BY m.created_at ASC, m.id ASC
                OFFSET $3 LIMIT $4
                "#
            }
            ResourceClass::Files => {
                r#"
                SELECT id, room_id, NULL::BIGINT AS channel_id, created_at
                FROM files
                WHERE room_id = $1 AND created_at < $2
                ORDER BY created_at ASC, id ASC
                OFFSET $3 LIMIT $4
                "#
            }
        };

        let rows = sqlx::query_as::<_, ExpiredRow>(sql)
            .bind(room_id)
            .bind(cutoff)
            .bind(offset)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.into_iter().map(|r| r.into_resource()).collect())
    }

    async fn delete_expired_batch(
        &self,
        room_id: i64,
        class: ResourceClass,
        resources: &[ExpiredResource],
    ) -> Result<DeletedBatch, AppError> {
        let ids: Vec<i64> = resources.iter().map(|r| r.id).collect();
        if ids.is_empty() {
            return Ok(DeletedBatch::default());
        }

        with_transaction(&self.pool, |mut ctx| async move {
            let batch = match class {
                ResourceClass::Messages => {
                    let blob_keys = delete_message_attachments(ctx.conn(), &ids).await?;
                    let deleted = sqlx::query_scalar::<_, i64>(
                        r#"
                        DELETE FROM messages
                        WHERE id = ANY($1)
                          AND channel_id IN (SELECT id FROM channels WHERE room_id = $2)
                        RETURNING id
                        "#,
                    )
                    .bind(&ids)
                    .bind(room_id)
                    .fetch_all(ctx.conn())
                    .await?;

                    DeletedBatch {
                        ids: deleted,
                        blob_keys,
                    }
                }
                ResourceClass::Files => {
                    // The messages that carried these files keep their text.
                    sqlx::query("DELETE FROM uploads WHERE file_id = ANY($1)")
                        .bind(&ids)
                        .execute(ctx.conn())
                        .await?;
                    let rows = sqlx::query_as::<_, (i64, String)>(
                        "DELETE FROM files WHERE id = ANY($1) AND room_id = $2 RETURNING id, key",
                    )
                    .bind(&ids)
                    .bind(room_id)
                    .fetch_all(ctx.conn())
                    .await?;

                    let (ids, blob_keys) = rows.into_iter().unzip();
                    DeletedBatch { ids, blob_keys }
                }
            };
            Ok((batch, ctx))
        })
        .await
    }
}
