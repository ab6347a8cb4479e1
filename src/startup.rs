//! Application startup and server initialization.
//!
//! This module builds the metrics registry and dependency probe from the
//! configuration, wires them into the router, and serves until shutdown.

use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;

use crate::config::ConfigV1;
use crate::metrics::{HttpMetrics, MetricsError};
use crate::probe::create_probe;
use crate::routes;
use crate::state::AppState;

/// Builds the shared state: a fresh registry with the HTTP metrics declared,
/// and the configured probe.
pub fn build_state(config: Arc<ConfigV1>) -> Result<AppState, MetricsError> {
    let metrics = HttpMetrics::new(&config.metrics)?;
    let probe = create_probe(&config.readiness.probe);

    Ok(AppState {
        config,
        metrics,
        probe,
    })
}

/// Initializes and runs the application server.
///
/// Binds to the address specified in the configuration and serves requests
/// until Ctrl-C or SIGTERM.
///
/// # Errors
///
/// Returns an error if the metrics cannot be declared, the server fails to
/// bind to the specified address, or it encounters a runtime error.
pub async fn run(config: Arc<ConfigV1>) -> Result<(), Box<dyn std::error::Error>> {
    let state = build_state(config.clone())?;
    let app = routes::create_router(state);

    info!("Starting server on {}", config.bind_address);
    let listener = TcpListener::bind(&config.bind_address).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("Shutdown signal received");
}
