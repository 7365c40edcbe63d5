use anyhow::Result;
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tracing::{debug, error, info, trace, warn};

use crate::config::{initialize_app_state_with_url, Settings};
use crate::router::create_router;
use crate::services::collector::run_collection_loop;

pub async fn serve(database_url: &str, bind_address: &str) -> Result<()> {
    trace!("Entering serve function");
    info!("HABOOB application starting up");
    debug!("Database URL: {}", database_url);
    debug!("Bind address: {}", bind_address);

    // Load settings
    let settings = match Settings::load() {
        Ok(settings) => {
            debug!(
                "Settings loaded: collection every {}s, rate limit {}/min",
                settings.collection_interval_secs, settings.rate_limit_per_minute
            );
            settings
        }
        Err(e) => {
            error!("Failed to load settings: {}", e);
            return Err(e);
        }
    };

    // Initialize application state
    trace!("Initializing application state");
    let state = match initialize_app_state_with_url(database_url, settings).await {
        Ok(state) => {
            debug!("Application state initialized successfully");
            state
        }
        Err(e) => {
            error!("Failed to initialize application state: {}", e);
            return Err(e);
        }
    };

    // Background collection
    if state.settings.collector_enabled {
        info!(
            "Starting data collector every {}s for {} cities",
            state.settings.collection_interval_secs,
            state.cities.len()
        );
        tokio::spawn(run_collection_loop(state.clone()));
    } else {
        warn!("Data collector disabled, readings are fetched on demand only");
    }

    // Create router
    trace!("Creating application router");
    let app = create_router(state);
    debug!("Router created successfully");

    // Start server
    info!("Starting server on {}", bind_address);
    trace!("Attempting to bind TCP listener to {}", bind_address);
    let listener = match TcpListener::bind(&bind_address).await {
        Ok(listener) => {
            debug!("Successfully bound to address: {}", bind_address);
            listener
        }
        Err(e) => {
            error!("Failed to bind to address {}: {}", bind_address, e);
            return Err(e.into());
        }
    };

    info!("HABOOB API server running on http://{}", bind_address);
    info!("Swagger UI available at http://{}/api/docs", bind_address);
    info!("WebSocket updates at ws://{}/ws", bind_address);
    debug!("Server is ready to accept connections");

    trace!("Starting axum server");
    if let Err(e) = axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>()).await {
        error!("Server error: {}", e);
        return Err(e.into());
    }

    info!("Server shutdown gracefully");
    Ok(())
}
