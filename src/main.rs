use aethex_community::{AppState, AppConfig};
use aethex_community::routes::create_routes;
use anyhow::Context;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn, Level};
use std::net::SocketAddr;

/// Check the companion API once at startup. It is only a fallback, so failure is not fatal.
async fn check_companion_api(app_state: &AppState) {
    let Some(companion) = &app_state.companion else {
        return;
    };

    match companion.health().await {
        Ok(()) => info!("✅ STARTUP: Companion API is reachable"),
        Err(e) => warn!("⚠️ STARTUP: Companion API health check failed: {}. Feed fallback may be unavailable.", e),
    }
}

/// Check the primary store once at startup; the fallback chain covers outages later on.
async fn check_database(app_state: &AppState) {
    match app_state.db.health_check().await {
        Ok(()) => info!("✅ STARTUP: {} store is reachable", app_state.db.backend),
        Err(e) => warn!("⚠️ STARTUP: {} store check failed: {}. Reads will degrade to fallbacks.", app_state.db.backend, e),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing for logging
    tracing_subscriber::fmt()
        .with_max_level(Level::INFO)
        .init();

    info!("Starting AeThex community server...");

    // Load configuration from environment
    let config = AppConfig::from_env();
    info!("Server configuration loaded (backend: {}, attempt timeout: {}ms)",
          config.data_backend.name(), config.fallback_attempt_timeout_ms);

    if config.uses_dev_jwt_secret() {
        warn!("⚠️ CONFIG: SUPABASE_JWT_SECRET is not set; tokens for the {} backend are verified with the development secret",
              config.data_backend.name());
    }

    // Initialize application state
    let app_state = AppState::new(config.clone())
        .await
        .context("failed to initialize application state")?;
    info!("Application state initialized");

    check_database(&app_state).await;
    check_companion_api(&app_state).await;

    // Build our application with routes
    let app = create_routes()
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(app_state);

    let addr: SocketAddr = config
        .server_address()
        .parse()
        .with_context(|| format!("invalid server address {}", config.server_address()))?;
    let listener = TcpListener::bind(&addr).await?;

    info!("Server running on http://{}", config.server_address());

    // Start serving requests
    axum::serve(listener, app).await?;

    Ok(())
}
