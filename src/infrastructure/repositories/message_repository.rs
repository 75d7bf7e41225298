//! Message Repository Implementation
//!
//! PostgreSQL implementation of the MessageRepository trait. A message and
//! its upload are written and removed together.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgPool};

use crate::domain::{DeletedMessage, FileType, Message, MessageRepository, Upload};
use crate::infrastructure::database::with_transaction;
use crate::shared::error::AppError;

/// Database row representation matching the messages table schema.
#[derive(Debug, sqlx::FromRow)]
struct MessageRow {
    id: i64,
    channel_id: i64,
    author_id: Option<i64>,
    webhook_id: Option<i64>,
    content: String,
    created_at: DateTime<Utc>,
}

impl MessageRow {
    fn into_message(self) -> Message {
        Message {
            id: self.id,
            channel_id: self.channel_id,
            author_id: self.author_id,
            webhook_id: self.webhook_id,
            content: self.content,
            created_at: self.created_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct UploadRow {
    id: i64,
    message_id: i64,
    file_id: i64,
    #[sqlx(rename = "type")]
    upload_type: String,
}

impl UploadRow {
    fn into_upload(self) -> Upload {
        Upload {
            id: self.id,
            message_id: self.message_id,
            file_id: self.file_id,
            upload_type: FileType::parse(&self.upload_type),
        }
    }
}

/// PostgreSQL message repository implementation.
#[derive(Clone)]
pub struct PgMessageRepository {
    pool: PgPool,
}

impl PgMessageRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Remove the uploads of `message_ids`, then the files no other upload still
/// points at. Returns the blob keys of the removed files.
pub(super) async fn delete_message_attachments(
    conn: &mut PgConnection,
    message_ids: &[i64],
) -> Result<Vec<String>, AppError> {
    let file_ids = sqlx::query_scalar::<_, i64>(
        "DELETE FROM uploads WHERE message_id = ANY($1) RETURNING file_id",
    )
    .bind(message_ids)
    .fetch_all(&mut *conn)
    .await?;

    if file_ids.is_empty() {
        return Ok(Vec::new());
    }

    let keys = sqlx::query_scalar::<_, String>(
        r#"
        DELETE FROM files f
        WHERE f.id = ANY($1)
          AND NOT EXISTS (SELECT 1 FROM uploads u WHERE u.file_id = f.id)
        RETURNING f.key
        "#,
    )
    .bind(&file_ids)
    .fetch_all(&mut *conn)
    .await?;

    Ok(keys)
}

#[async_trait]
impl MessageRepository for PgMessageRepository {
    async fn find_by_id(&self, id: i64) -> Result<Option<Message>, AppError> {
        let row = sqlx::query_as::<_, MessageRow>(
            r#"
            SELECT id, channel_id, author_id, webhook_id, content, created_at
            FROM messages
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| r.into_message()))
    }

    async fn create(&self, message: &Message, upload: Option<&Upload>) -> Result<Message, AppError> {
        let message = message.clone();
        let upload = upload.cloned();

        with_transaction(&self.pool, |mut ctx| async move {
            let row = sqlx::query_as::<_, MessageRow>(
                r#"
                INSERT INTO messages (id, channel_id, author_id, webhook_id, content, created_at)
                VALUES ($1, $2, $3, $4, $5, $6)
                RETURNING id, channel_id, author_id, webhook_id, content, created_at
                "#,
            )
            .bind(message.id)
            .bind(message.channel_id)
            .bind(message.author_id)
            .bind(message.webhook_id)
            .bind(&message.content)
            .bind(message.created_at)
            .fetch_one(ctx.conn())
            .await?;

            if let Some(upload) = upload {
                sqlx::query(
                    "INSERT INTO uploads (id, message_id, file_id, type) VALUES ($1, $2, $3, $4)",
                )
                .bind(upload.id)
                .bind(upload.message_id)
                .bind(upload.file_id)
                .bind(upload.upload_type.as_str())
                .execute(ctx.conn())
                .await?;
            }

            Ok((row.into_message(), ctx))
        })
        .await
    }

    async fn find_upload(&self, message_id: i64) -> Result<Option<Upload>, AppError> {
        let row = sqlx::query_as::<_, UploadRow>(
            "SELECT id, message_id, file_id, type FROM uploads WHERE message_id = $1 LIMIT 1",
        )
        .bind(message_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| r.into_upload()))
    }

    async fn delete(&self, id: i64) -> Result<Option<DeletedMessage>, AppError> {
        with_transaction(&self.pool, |mut ctx| async move {
            let blob_keys = delete_message_attachments(ctx.conn(), &[id]).await?;

            let row = sqlx::query_as::<_, MessageRow>(
                r#"
                DELETE FROM messages WHERE id = $1
                RETURNING id, channel_id, author_id, webhook_id, content, created_at
                "#,
            )
            .bind(id)
            .fetch_optional(ctx.conn())
            .await?;

            let deleted = row.map(|r| DeletedMessage {
                message: r.into_message(),
                blob_keys,
            });
            Ok((deleted, ctx))
        })
        .await
    }
}
