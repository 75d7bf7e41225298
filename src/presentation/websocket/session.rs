//! WebSocket Session Management

use std::time::Instant;

/// Per-connection state owned by the connection task
#[derive(Debug)]
pub struct SessionState {
    pub session_id: String,
    pub last_heartbeat: Instant,
}

impl SessionState {
    pub fn new(session_id: String) -> Self {
        Self {
            session_id,
            last_heartbeat: Instant::now(),
        }
    }

    pub fn heartbeat(&mut self) {
        self.last_heartbeat = Instant::now();
    }

    pub fn is_alive(&self, timeout_ms: u64) -> bool {
        self.last_heartbeat.elapsed().as_millis() < timeout_ms as u128
    }
}

/// Stamps outgoing dispatches with a per-session sequence number
#[derive(Debug, Default)]
pub struct Sequencer {
    sequence: u64,
}

impl Sequencer {
    pub fn next_sequence(&mut self) -> u64 {
        self.sequence += 1;
        self.sequence
    }
}
