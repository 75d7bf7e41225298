//! WebSocket Message Types
//!
//! Frames exchanged on `/gateway`. Clients subscribe to topics
//! (`room:{id}`, `channel:{id}`) and receive lifecycle events as dispatches.

use serde::{Deserialize, Serialize};

/// Outgoing frame kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OpCode {
    /// Lifecycle event dispatch
    Dispatch,
    /// Sent once after the upgrade
    Hello,
    HeartbeatAck,
    /// Subscription list changed
    Subscribed,
    Error,
}

/// Incoming client frame
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum GatewayReceive {
    Subscribe { topic: String },
    Unsubscribe { topic: String },
    Heartbeat,
}

/// Outgoing frame
#[derive(Debug, Clone, Serialize)]
pub struct GatewaySend {
    pub op: OpCode,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub d: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub s: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub t: Option<String>,
}

impl GatewaySend {
    pub fn new(op: OpCode, d: Option<serde_json::Value>) -> Self {
        Self { op, d, s: None, t: None }
    }

    pub fn dispatch(event_type: &str, payload: serde_json::Value) -> Self {
        Self {
            op: OpCode::Dispatch,
            d: Some(payload),
            s: None,
            t: Some(event_type.to_string()),
        }
    }
}

/// Hello payload
#[derive(Debug, Serialize)]
pub struct HelloPayload {
    pub session_id: String,
    pub heartbeat_interval: u64,
    pub topics: Vec<String>,
}
