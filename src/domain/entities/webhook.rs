//! Webhook entity and repository trait.
//!
//! Webhook messages live in `messages` with `webhook_id` set, so channel
//! retention applies to them unchanged.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::shared::error::AppError;

/// An external poster bound to one channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Webhook {
    pub id: i64,
    pub channel_id: i64,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

/// Repository trait for Webhook data access operations.
#[async_trait]
pub trait WebhookRepository: Send + Sync {
    /// Find a webhook by its Snowflake ID.
    async fn find_by_id(&self, id: i64) -> Result<Option<Webhook>, AppError>;

    /// Create a new webhook.
    async fn create(&self, webhook: &Webhook) -> Result<Webhook, AppError>;
}
