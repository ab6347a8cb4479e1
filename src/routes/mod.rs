//! HTTP route definitions and handlers.
//!
//! This module organizes all HTTP endpoints into logical groups:
//! demo API traffic, health checks, and the metrics exposition endpoint.
//! Everything except `/metrics` runs behind the request instrumentation.

mod api_routes;
mod health_routes;
mod metrics;

use axum::http::StatusCode;
use axum::{middleware, Router};

use crate::metrics::HttpMetrics;
use crate::middleware::track_requests;
use crate::state::AppState;
use crate::utils::http_helpers::HTTPError;

/// Creates the application router with all configured routes.
///
/// Combines all route modules into a single router and attaches
/// the application state for access in handlers.
pub fn create_router(state: AppState) -> Router {
    let instrumented = Router::new()
        .merge(api_routes::routes())
        .merge(health_routes::routes())
        .fallback(not_found)
        .layer(middleware::from_fn_with_state(
            state.metrics.clone(),
            track_requests::<HttpMetrics>,
        ));

    instrumented.merge(metrics::routes()).with_state(state)
}

async fn not_found() -> HTTPError {
    HTTPError::new(StatusCode::NOT_FOUND, "Not Found")
}
