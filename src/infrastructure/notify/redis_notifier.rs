//! Redis PUBLISH emitter.

use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use serde_json::json;
use tracing::{debug, warn};

use crate::domain::stores::NotificationEmitter;

/// Channel prefix for published lifecycle events.
pub const EVENT_CHANNEL_PREFIX: &str = "roomkeeper:events:";

/// Publishes `{"t": event_type, "d": payload}` on `roomkeeper:events:{topic}`.
///
/// The publish runs in a spawned task; failures are logged and dropped.
#[derive(Clone)]
pub struct RedisNotifier {
    conn: ConnectionManager,
}

impl RedisNotifier {
    pub fn new(conn: ConnectionManager) -> Self {
        Self { conn }
    }

    pub fn channel_for(topic: &str) -> String {
        format!("{}{}", EVENT_CHANNEL_PREFIX, topic)
    }
}

impl NotificationEmitter for RedisNotifier {
    fn broadcast(&self, topic: &str, event_type: &str, payload: serde_json::Value) {
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            warn!(topic = topic, "No runtime available, dropping Redis event");
            return;
        };

        let channel = Self::channel_for(topic);
        let message = json!({ "t": event_type, "d": payload }).to_string();
        let mut conn = self.conn.clone();

        runtime.spawn(async move {
            let result: redis::RedisResult<i64> = conn.publish(&channel, message).await;
            match result {
                Ok(receivers) => debug!(channel = %channel, receivers, "Event published"),
                Err(e) => warn!(channel = %channel, error = %e, "Failed to publish event"),
            }
        });
    }
}
