//! WebSocket Connection Handler
//!
//! `GET /gateway?topics=room:1,channel:2` upgrades to a WebSocket session
//! subscribed to the given topics. Clients may change subscriptions with
//! `{"op":"subscribe","topic":..}` and `{"op":"unsubscribe","topic":..}`
//! and keep the session alive with `{"op":"heartbeat"}`.

use std::time::Duration;

use axum::{
    extract::{
        ws::{Message, WebSocket},
        Query, State, WebSocketUpgrade,
    },
    response::{IntoResponse, Response},
};
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use serde_json::json;
use tokio::sync::mpsc;
use tokio::time::interval;
use uuid::Uuid;

use super::gateway::Gateway;
use super::messages::{GatewayReceive, GatewaySend, HelloPayload, OpCode};
use super::session::{Sequencer, SessionState};
use crate::domain::Topic;
use crate::shared::error::AppError;
use crate::startup::AppState;

/// Grace period on top of the heartbeat interval
const HEARTBEAT_GRACE_MS: u64 = 10_000;

#[derive(Debug, Deserialize)]
pub struct GatewayQuery {
    /// Comma-separated topic list
    pub topics: Option<String>,
}

/// Normalise a topic name, rejecting unknown kinds.
pub fn parse_topic(raw: &str) -> Result<String, String> {
    raw.parse::<Topic>().map(|t| t.to_string())
}

fn parse_topics(raw: Option<&str>) -> Result<Vec<String>, AppError> {
    raw.unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| parse_topic(s).map_err(AppError::BadRequest))
        .collect()
}

/// WebSocket upgrade handler
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(query): Query<GatewayQuery>,
    State(state): State<AppState>,
) -> Response {
    let topics = match parse_topics(query.topics.as_deref()) {
        Ok(topics) => topics,
        Err(e) => return e.into_response(),
    };
    ws.on_upgrade(move |socket| handle_socket(socket, state, topics))
}

/// Handle individual WebSocket connection
async fn handle_socket(socket: WebSocket, state: AppState, topics: Vec<String>) {
    let session_id = Uuid::new_v4().to_string();
    let mut session_state = SessionState::new(session_id.clone());
    let gateway = state.gateway.clone();

    let (mut sender, mut receiver) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<GatewaySend>();

    // Forward queued frames to the socket, numbering dispatches.
    let sender_task = tokio::spawn(async move {
        let mut sequencer = Sequencer::default();
        while let Some(mut msg) = rx.recv().await {
            if msg.op == OpCode::Dispatch {
                msg.s = Some(sequencer.next_sequence());
            }
            let text = match serde_json::to_string(&msg) {
                Ok(t) => t,
                Err(e) => {
                    tracing::error!("Failed to serialize message: {}", e);
                    continue;
                }
            };
            if sender.send(Message::Text(text.into())).await.is_err() {
                break;
            }
        }
    });

    gateway.register_session(session_id.clone(), topics.clone(), tx.clone());

    let hello = HelloPayload {
        session_id: session_id.clone(),
        heartbeat_interval: gateway.heartbeat_interval(),
        topics,
    };
    if tx
        .send(GatewaySend::new(OpCode::Hello, serde_json::to_value(hello).ok()))
        .is_err()
    {
        gateway.unregister_session(&session_id);
        sender_task.abort();
        return;
    }

    let timeout_ms = gateway.heartbeat_interval() + HEARTBEAT_GRACE_MS;
    let mut heartbeat_check = interval(Duration::from_millis(timeout_ms));
    heartbeat_check.tick().await; // first tick is immediate

    let mut shutdown = state.shutdown.clone();

    loop {
        tokio::select! {
            msg = receiver.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        if let Err(e) = handle_message(&text, &mut session_state, &tx, &gateway) {
                            tracing::debug!(session_id = %session_id, error = %e, "Rejected client frame");
                            let _ = tx.send(GatewaySend::new(OpCode::Error, Some(json!({ "message": e }))));
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        tracing::debug!(session_id = %session_id, "Connection closed");
                        break;
                    }
                    Some(Err(e)) => {
                        tracing::debug!(session_id = %session_id, error = %e, "WebSocket error");
                        break;
                    }
                    _ => {}
                }
            }

            _ = heartbeat_check.tick() => {
                if !session_state.is_alive(timeout_ms) {
                    tracing::info!(session_id = %session_id, "Heartbeat timeout, closing connection");
                    break;
                }
            }

            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    tracing::debug!(session_id = %session_id, "Server shutting down, closing connection");
                    break;
                }
            }
        }
    }

    gateway.unregister_session(&session_id);
    sender_task.abort();
}

/// Handle one client frame
fn handle_message(
    text: &str,
    session_state: &mut SessionState,
    tx: &mpsc::UnboundedSender<GatewaySend>,
    gateway: &Gateway,
) -> Result<(), String> {
    let frame: GatewayReceive =
        serde_json::from_str(text).map_err(|e| format!("Invalid frame: {}", e))?;

    match frame {
        GatewayReceive::Heartbeat => {
            session_state.heartbeat();
            let _ = tx.send(GatewaySend::new(OpCode::HeartbeatAck, None));
            tracing::trace!(session_id = %session_state.session_id, "Heartbeat received");
        }
        GatewayReceive::Subscribe { topic } => {
            let topic = parse_topic(&topic)?;
            gateway.subscribe(&session_state.session_id, &topic);
            send_topics(session_state, tx, gateway);
        }
        GatewayReceive::Unsubscribe { topic } => {
            let topic = parse_topic(&topic)?;
            gateway.unsubscribe(&session_state.session_id, &topic);
            send_topics(session_state, tx, gateway);
        }
    }

    Ok(())
}

fn send_topics(
    session_state: &SessionState,
    tx: &mpsc::UnboundedSender<GatewaySend>,
    gateway: &Gateway,
) {
    let topics = gateway
        .session_topics(&session_state.session_id)
        .unwrap_or_default();
    let _ = tx.send(GatewaySend::new(
        OpCode::Subscribed,
        Some(json!({ "topics": topics })),
    ));
}
