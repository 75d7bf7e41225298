//! # Roomkeeper
//!
//! Room resource lifecycle service for a chat backend.
//!
//! This is the application entry point that initializes:
//! - Configuration loading
//! - Tracing/logging subsystem
//! - Database connection pool, blob store and Redis fan-out
//! - Retention workers
//! - HTTP/WebSocket server

use anyhow::Result;
use tracing::info;

use roomkeeper::config::Settings;
use roomkeeper::startup::Application;

#[tokio::main]
async fn main() -> Result<()> {
    // Settings come first: they decide the log format. Loading also validates.
    let settings = Settings::load()?;

    roomkeeper::telemetry::init_tracing(&settings.telemetry);

    info!(
        host = %settings.server.host,
        port = %settings.server.port,
        environment = %settings.environment,
        retention_enabled = settings.retention.enabled,
        "Configuration loaded"
    );

    let application = Application::build(settings).await?;

    info!("Server ready to accept connections");
    application.run_until_stopped().await?;

    Ok(())
}
