//! WebSocket Gateway
//!
//! Tracks connected sessions and their topic subscriptions, and delivers
//! lifecycle events to the sessions subscribed to a topic. Delivery is
//! at-most-once: a session whose channel is closed simply misses the event.

use std::collections::HashSet;
use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::Mutex;
use tokio::sync::mpsc;

use super::messages::GatewaySend;
use crate::domain::NotificationEmitter;
use crate::infrastructure::metrics;

/// Connected session with message sender
pub struct ConnectedSession {
    pub session_id: String,
    topics: Mutex<HashSet<String>>,
    sender: mpsc::UnboundedSender<GatewaySend>,
}

impl ConnectedSession {
    pub fn topics(&self) -> Vec<String> {
        let mut topics: Vec<String> = self.topics.lock().iter().cloned().collect();
        topics.sort();
        topics
    }
}

/// WebSocket gateway managing all connections
pub struct Gateway {
    /// Active sessions by session_id
    sessions: DashMap<String, Arc<ConnectedSession>>,
    /// Topic to session IDs mapping
    topic_sessions: DashMap<String, HashSet<String>>,
    /// Heartbeat interval in milliseconds
    heartbeat_interval_ms: u64,
}

impl Gateway {
    pub fn new() -> Self {
        Self::with_heartbeat_interval(30_000)
    }

    pub fn with_heartbeat_interval(heartbeat_interval_ms: u64) -> Self {
        Self {
            sessions: DashMap::new(),
            topic_sessions: DashMap::new(),
            heartbeat_interval_ms,
        }
    }

    pub fn heartbeat_interval(&self) -> u64 {
        self.heartbeat_interval_ms
    }

    /// Register a new connected session with its initial topics
    pub fn register_session(
        &self,
        session_id: String,
        topics: Vec<String>,
        sender: mpsc::UnboundedSender<GatewaySend>,
    ) {
        let session = Arc::new(ConnectedSession {
            session_id: session_id.clone(),
            topics: Mutex::new(HashSet::new()),
            sender,
        });
        self.sessions.insert(session_id.clone(), session);

        for topic in topics {
            self.subscribe(&session_id, &topic);
        }

        metrics::set_websocket_connections(self.sessions.len());
        tracing::info!(session_id = %session_id, "Session registered");
    }

    /// Unregister a session and drop all its subscriptions
    pub fn unregister_session(&self, session_id: &str) {
        if let Some((_, session)) = self.sessions.remove(session_id) {
            for topic in session.topics() {
                self.remove_from_topic(&topic, session_id);
            }
            metrics::set_websocket_connections(self.sessions.len());
            tracing::info!(session_id = %session_id, "Session unregistered");
        }
    }

    /// Add a topic subscription. Returns false for an unknown session.
    pub fn subscribe(&self, session_id: &str, topic: &str) -> bool {
        let Some(session) = self.sessions.get(session_id).map(|s| Arc::clone(s.value())) else {
            return false;
        };
        session.topics.lock().insert(topic.to_string());
        self.topic_sessions
            .entry(topic.to_string())
            .or_default()
            .insert(session_id.to_string());
        true
    }

    /// Remove a topic subscription
    pub fn unsubscribe(&self, session_id: &str, topic: &str) {
        if let Some(session) = self.sessions.get(session_id).map(|s| Arc::clone(s.value())) {
            session.topics.lock().remove(topic);
        }
        self.remove_from_topic(topic, session_id);
    }

    fn remove_from_topic(&self, topic: &str, session_id: &str) {
        if let Some(mut sessions) = self.topic_sessions.get_mut(topic) {
            sessions.remove(session_id);
        }
        self.topic_sessions.remove_if(topic, |_, sessions| sessions.is_empty());
    }

    /// Send a frame to every session subscribed to `topic`.
    ///
    /// Returns the number of sessions the frame was queued for.
    pub fn send_to_topic(&self, topic: &str, message: GatewaySend) -> usize {
        // Collect senders first so no map shard is held while sending.
        let targets: Vec<Arc<ConnectedSession>> = match self.topic_sessions.get(topic) {
            Some(ids) => ids
                .iter()
                .filter_map(|id| self.sessions.get(id).map(|s| Arc::clone(s.value())))
                .collect(),
            None => return 0,
        };

        targets
            .iter()
            .filter(|session| session.sender.send(message.clone()).is_ok())
            .count()
    }

    /// Send a frame directly to one session
    pub fn send_to_session(&self, session_id: &str, message: GatewaySend) -> bool {
        match self.sessions.get(session_id) {
            Some(session) => session.sender.send(message).is_ok(),
            None => false,
        }
    }

    pub fn session_topics(&self, session_id: &str) -> Option<Vec<String>> {
        self.sessions.get(session_id).map(|s| s.topics())
    }

    pub fn topic_subscribers(&self, topic: &str) -> usize {
        self.topic_sessions.get(topic).map(|s| s.len()).unwrap_or(0)
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }
}

impl Default for Gateway {
    fn default() -> Self {
        Self::new()
    }
}

impl NotificationEmitter for Gateway {
    fn broadcast(&self, topic: &str, event_type: &str, payload: serde_json::Value) {
        let delivered = self.send_to_topic(topic, GatewaySend::dispatch(event_type, payload));
        tracing::trace!(topic, event_type, delivered, "Event dispatched");
    }
}
