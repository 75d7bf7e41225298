//! Route Configuration
//!
//! Configures all HTTP routes for the API.

use axum::{
    extract::DefaultBodyLimit,
    middleware,
    response::IntoResponse,
    routing::{get, patch, post},
    Router,
};
use tower::ServiceBuilder;
use tower_http::{compression::CompressionLayer, trace::TraceLayer};

use super::handlers;
use crate::infrastructure::metrics;
use crate::presentation::middleware::{create_cors_layer, track_http_metrics};
use crate::presentation::websocket::ws_handler;
use crate::startup::AppState;

/// Upper bound on a request body; per-room file limits are enforced by the
/// write guard.
const MAX_UPLOAD_BYTES: usize = 100 * 1024 * 1024;

/// Create the main API router
pub fn create_router(state: AppState) -> Router {
    let cors = create_cors_layer(&state.settings.cors);

    Router::new()
        .nest("/api/v1", api_routes())
        // WebSocket gateway endpoint
        .route("/gateway", get(ws_handler))
        // Health check endpoints
        .route("/health", get(handlers::health::health_check))
        .route("/health/live", get(handlers::health::liveness))
        .route("/health/ready", get(handlers::health::readiness))
        // Prometheus metrics endpoint
        .route("/metrics", get(metrics_handler))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors)
                .layer(CompressionLayer::new())
                .layer(middleware::from_fn(track_http_metrics)),
        )
        .with_state(state)
}

/// Prometheus metrics endpoint handler
async fn metrics_handler() -> impl IntoResponse {
    let metrics = metrics::gather_metrics();
    (
        [(
            axum::http::header::CONTENT_TYPE,
            "text/plain; version=0.0.4; charset=utf-8",
        )],
        metrics,
    )
}

/// API v1 routes
fn api_routes() -> Router<AppState> {
    Router::new()
        .nest("/rooms", room_routes())
        .nest("/channels", channel_routes())
        .route(
            "/files/{file_id}",
            get(handlers::room::get_file).delete(handlers::room::delete_file),
        )
        .route(
            "/messages/{message_id}",
            get(handlers::message::get_message).delete(handlers::message::delete_message),
        )
        .route(
            "/webhooks/{webhook_id}/messages",
            post(handlers::message::execute_webhook),
        )
        .route(
            "/admin/retention/{class}",
            post(handlers::admin::run_retention),
        )
}

/// Room routes
fn room_routes() -> Router<AppState> {
    Router::new()
        .route("/", post(handlers::room::create_room))
        .route(
            "/{room_id}",
            get(handlers::room::get_room).delete(handlers::room::delete_room),
        )
        .route("/{room_id}/settings", patch(handlers::room::update_settings))
        .route("/{room_id}/usage", get(handlers::room::get_usage))
        .route(
            "/{room_id}/channels",
            get(handlers::room::list_channels).post(handlers::room::create_channel),
        )
        .route("/{room_id}/members", post(handlers::room::add_member))
        .route(
            "/{room_id}/files",
            post(handlers::room::upload_file).layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES)),
        )
}

/// Channel routes
fn channel_routes() -> Router<AppState> {
    Router::new()
        .route("/{channel_id}/messages", post(handlers::message::send_message))
        .route(
            "/{channel_id}/attachments",
            post(handlers::message::send_attachment)
                .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES)),
        )
        .route("/{channel_id}/webhooks", post(handlers::message::create_webhook))
}
