use anyhow::Context;
use axum::Router;
use std::net::SocketAddr;
use tracing::{error, info};

use schema_db_backend::api;
use schema_db_backend::config::Config;
use schema_db_backend::services::DbService;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    let config = Config::from_env().context("Failed to load configuration")?;

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.logging.level)),
        )
        .init();

    info!("Starting server on {}", config.server_address());

    // Connect and create tables before accepting any request
    let service = DbService::initialize(&config).await.map_err(|e| {
        if e.is_fatal() {
            error!("Startup aborted: {}", e);
        } else {
            error!("Failed to initialize database: {}", e);
        }
        e
    })?;

    // Create router with state
    let app: Router = api::routes::create_router_with_state(service.clone().into());

    // Start server
    let addr: SocketAddr = config
        .server_address()
        .parse()
        .with_context(|| format!("Invalid server address {}", config.server_address()))?;
    info!("Server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    service.shutdown().await?;
    info!("Server stopped");

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
    }
    info!("Shutdown signal received");
}
