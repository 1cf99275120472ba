//! # Chat Hub
//!
//! A real-time chat backend supporting public, private, and group
//! messaging over WebSocket, with persistent history and
//! cross-instance delivery.
//!
//! This is the application entry point that initializes:
//! - Tracing/logging subsystem
//! - Configuration loading
//! - Database connection pool
//! - Redis cache and relay
//! - HTTP/WebSocket server

use anyhow::Result;
use tracing::info;

use chat_hub::config::Settings;
use chat_hub::startup::Application;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing subscriber for structured logging
    chat_hub::telemetry::init_tracing();

    info!("Starting Chat Hub...");

    // Load configuration from environment and config files
    let settings = Settings::load()?;
    info!(
        host = %settings.server.host,
        port = %settings.server.port,
        environment = %settings.environment,
        "Configuration loaded"
    );

    // Build and run the application
    let application = Application::build(settings).await?;

    info!("Server ready to accept connections");
    application.run_until_stopped().await?;

    Ok(())
}
