//! Presentation Layer
//!
//! HTTP routes and the WebSocket notification gateway.

pub mod http;
pub mod middleware;
pub mod websocket;
