//! File Repository Implementation
//!
//! PostgreSQL implementation of the FileRepository trait. Rows are reserved
//! as `pending` before their blob exists and flipped to `active` afterwards.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::domain::{File, FileRepository, FileStatus, FileType};
use crate::infrastructure::database::with_transaction;
use crate::shared::error::AppError;

/// Database row representation matching the files table schema.
#[derive(Debug, sqlx::FromRow)]
struct FileRow {
    id: i64,
    room_id: i64,
    key: String,
    name: String,
    size_bytes: i64,
    #[sqlx(rename = "type")]
    file_type: String,
    status: String,
    created_at: DateTime<Utc>,
}

impl FileRow {
    fn into_file(self) -> File {
        File {
            id: self.id,
            room_id: self.room_id,
            key: self.key,
            name: self.name,
            size_bytes: self.size_bytes,
            file_type: FileType::parse(&self.file_type),
            status: FileStatus::parse(&self.status),
            created_at: self.created_at,
        }
    }
}

const FILE_COLUMNS: &str = "id, room_id, key, name, size_bytes, type, status, created_at";

/// PostgreSQL file repository implementation.
#[derive(Clone)]
pub struct PgFileRepository {
    pool: PgPool,
}

impl PgFileRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl FileRepository for PgFileRepository {
    async fn find_by_id(&self, id: i64) -> Result<Option<File>, AppError> {
        let row = sqlx::query_as::<_, FileRow>(&format!(
            "SELECT {} FROM files WHERE id = $1",
            FILE_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| r.into_file()))
    }

    async fn reserve(&self, file: &File) -> Result<File, AppError> {
        let row = sqlx::query_as::<_, FileRow>(&format!(
            r#"
            INSERT INTO files (id, room_id, key, name, size_bytes, type, status, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, 'pending', $7)
            RETURNING {}
            "#,
            FILE_COLUMNS
        ))
        .bind(file.id)
        .bind(file.room_id)
        .bind(&file.key)
        .bind(&file.name)
        .bind(file.size_bytes)
        .bind(file.file_type.as_str())
        .bind(file.created_at)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match &e {
            sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
                AppError::Conflict("File with this ID or key already exists".to_string())
            }
            _ => AppError::Database(e),
        })?;

        Ok(row.into_file())
    }

    async fn activate(&self, id: i64) -> Result<File, AppError> {
        let row = sqlx::query_as::<_, FileRow>(&format!(
            "UPDATE files SET status = 'active' WHERE id = $1 RETURNING {}",
            FILE_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("File {} not found", id)))?;

        Ok(row.into_file())
    }

    async fn discard(&self, id: i64) -> Result<(), AppError> {
        sqlx::query("DELETE FROM files WHERE id = $1 AND status = 'pending'")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn delete(&self, id: i64) -> Result<Option<File>, AppError> {
        with_transaction(&self.pool, |mut ctx| async move {
            sqlx::query("DELETE FROM uploads WHERE file_id = $1")
                .bind(id)
                .execute(ctx.conn())
                .await?;

            let row = sqlx::query_as::<_, FileRow>(&format!(
                "DELETE FROM files WHERE id = $1 RETURNING {}",
                FILE_COLUMNS
            ))
            .bind(id)
            .fetch_optional(ctx.conn())
            .await?;

            Ok((row.map(|r| r.into_file()), ctx))
        })
        .await
    }
}
