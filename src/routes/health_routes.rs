//! Health check endpoints for liveness and readiness probes.

use std::time::Duration;

use axum::extract::{MatchedPath, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::{routing::get, Json, Router};
use chrono::Utc;
use serde_json::{json, Map, Value};

use crate::metrics::MetricsRecorder;
use crate::probe::check_with_timeout;
use crate::state::AppState;

/// Registers health check routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/health/liveness", get(liveness_check))
        .route("/health/readiness", get(readiness_check))
}

/// The process is up and serving requests.
async fn liveness_check() -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(json!({ "status": "alive", "timestamp": Utc::now().to_rfc3339() })),
    )
}

/// Ready when the configured dependency probe answers within the timeout.
async fn readiness_check(
    State(state): State<AppState>,
    path: MatchedPath,
) -> impl IntoResponse {
    let limit = Duration::from_millis(state.config.readiness.timeout_in_ms);
    let outcome = check_with_timeout(state.probe.as_ref(), limit).await;

    let mut checks = Map::new();
    let probe_name = state.probe.get_name().to_string();
    match outcome {
        Ok(()) => {
            checks.insert(probe_name, Value::from("connected"));
            (
                StatusCode::OK,
                Json(json!({ "status": "ready", "checks": checks })),
            )
        }
        Err(reason) => {
            state
                .metrics
                .record_error("dependency_failure", path.as_str());
            checks.insert(probe_name, Value::from(reason));
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({ "status": "not ready", "checks": checks })),
            )
        }
    }
}
