//! Slotswap API Server Entry Point
//!
//! Bootstraps configuration, opens the record store and starts the Axum
//! HTTP server.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use slotswap_api::telemetry::{init_tracing, TelemetryConfig};
use slotswap_api::{
    create_api_router, ApiConfig, ApiError, ApiResult, AppState, AuthConfig, DbConfig, PgStore,
};
use slotswap_storage::{InMemoryStore, SwapStore};

#[tokio::main]
async fn main() -> ApiResult<()> {
    init_tracing(&TelemetryConfig::from_env())?;

    let api_config = ApiConfig::from_env();
    let auth_config = AuthConfig::from_env();

    let store = open_store().await?;
    let app: Router = create_api_router(AppState::new(store), &api_config, auth_config)?;

    let addr = api_config.bind_addr;
    tracing::info!(%addr, environment = %api_config.environment, "Starting Slotswap API server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| ApiError::internal_error(format!("Failed to bind {}: {}", addr, e)))?;

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .map_err(|e| ApiError::internal_error(format!("Server error: {}", e)))?;

    tracing::info!("Server stopped");
    Ok(())
}

/// Pick the record store from `SLOTSWAP_STORE` ("postgres" or "memory",
/// default postgres). Postgres gets its schema applied before serving.
async fn open_store() -> ApiResult<Arc<dyn SwapStore>> {
    let kind = std::env::var("SLOTSWAP_STORE").unwrap_or_else(|_| "postgres".to_string());
    match kind.trim().to_ascii_lowercase().as_str() {
        "memory" => {
            tracing::warn!("Using in-memory store; records are lost on restart");
            Ok(Arc::new(InMemoryStore::new()))
        }
        "postgres" => {
            let db_config = DbConfig::from_env();
            tracing::info!(config = ?db_config, "Connecting to PostgreSQL");
            let store = PgStore::from_config(&db_config)?;
            store.migrate().await?;
            Ok(Arc::new(store))
        }
        other => Err(ApiError::invalid_input(format!(
            "Unknown SLOTSWAP_STORE '{}': expected 'postgres' or 'memory'",
            other
        ))),
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
