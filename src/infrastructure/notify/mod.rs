//! Notification fan-out.
//!
//! Lifecycle events reach connected clients through the WebSocket gateway
//! and other instances through Redis PUBLISH. Both are fire-and-forget:
//! an event nobody is listening for is simply dropped.
//!
//! ```text
//! write guard / sweeper
//!          |
//!          v
//! +-------------------+
//! |  FanoutNotifier   |
//! +-------------------+
//!      |         |
//!      v         v
//!  Gateway   RedisNotifier --> PUBLISH roomkeeper:events:{topic}
//! ```

mod redis_notifier;

pub use redis_notifier::RedisNotifier;

use std::sync::Arc;

use redis::aio::ConnectionManager;
use redis::Client;
use tracing::{info, instrument};

use crate::config::RedisSettings;
use crate::domain::stores::NotificationEmitter;

/// Creates a Redis connection manager with automatic reconnection.
#[instrument(skip(settings), fields(url = %settings.url))]
pub async fn create_redis_client(
    settings: &RedisSettings,
) -> Result<ConnectionManager, redis::RedisError> {
    info!("Connecting to Redis...");
    let client = Client::open(settings.url.as_str())?;
    let manager = ConnectionManager::new(client).await?;
    info!("Redis connection established");
    Ok(manager)
}

/// Forwards every event to each wrapped emitter in order.
#[derive(Clone, Default)]
pub struct FanoutNotifier {
    emitters: Vec<Arc<dyn NotificationEmitter>>,
}

impl FanoutNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, emitter: Arc<dyn NotificationEmitter>) -> Self {
        self.emitters.push(emitter);
        self
    }

    pub fn len(&self) -> usize {
        self.emitters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.emitters.is_empty()
    }
}

impl NotificationEmitter for FanoutNotifier {
    fn broadcast(&self, topic: &str, event_type: &str, payload: serde_json::Value) {
        for emitter in &self.emitters {
            emitter.broadcast(topic, event_type, payload.clone());
        }
    }
}
