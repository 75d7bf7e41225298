//! Webhook Repository Implementation

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::domain::{Webhook, WebhookRepository};
use crate::shared::error::AppError;

#[derive(Debug, sqlx::FromRow)]
struct WebhookRow {
    id: i64,
    channel_id: i64,
    name: String,
    created_at: DateTime<Utc>,
}

impl WebhookRow {
    fn into_webhook(self) -> Webhook {
        Webhook {
            id: self.id,
            channel_id: self.channel_id,
            name: self.name,
            created_at: self.created_at,
        }
    }
}

/// PostgreSQL webhook repository implementation.
#[derive(Clone)]
pub struct PgWebhookRepository {
    pool: PgPool,
}

impl PgWebhookRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl WebhookRepository for PgWebhookRepository {
    async fn find_by_id(&self, id: i64) -> Result<Option<Webhook>, AppError> {
        let row = sqlx::query_as::<_, WebhookRow>(
            "SELECT id, channel_id, name, created_at FROM webhooks WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| r.into_webhook()))
    }

    async fn create(&self, webhook: &Webhook) -> Result<Webhook, AppError> {
        let row = sqlx::query_as::<_, WebhookRow>(
            r#"
            INSERT INTO webhooks (id, channel_id, name, created_at)
            VALUES ($1, $2, $3, $4)
            RETURNING id, channel_id, name, created_at
            "#,
        )
        .bind(webhook.id)
        .bind(webhook.channel_id)
        .bind(&webhook.name)
        .bind(webhook.created_at)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.into_webhook())
    }
}
