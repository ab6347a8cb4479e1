//! Demo API endpoints.
//!
//! These exist to generate traffic for the request metrics: a user listing
//! backed by the dependency probe, an echo, deliberate errors and deliberately
//! slow responses. Outcomes are driven by request parameters and config, not
//! by chance.

use std::time::Duration;

use axum::body::Bytes;
use axum::extract::{MatchedPath, Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{error, info, warn};

use crate::metrics::MetricsRecorder;
use crate::models::User;
use crate::probe::check_with_timeout;
use crate::state::AppState;
use crate::utils::http_helpers::HTTPError;

/// Registers the demo API routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(root))
        .route("/api/users", get(get_users))
        .route("/api/users/:id", get(get_user))
        .route("/api/echo", post(echo))
        .route("/api/error", get(simulate_error))
        .route("/api/slow", get(slow_response))
}

async fn root(State(state): State<AppState>) -> impl IntoResponse {
    Json(json!({
        "service": state.config.logging.service_name,
        "version": state.config.logging.service_version,
    }))
}

/// Runs the dependency check standing in for a database query. A failure is
/// recorded as `database_error` against `endpoint`.
async fn query_dependency(state: &AppState, endpoint: &str, query: &str) -> Result<(), HTTPError> {
    let limit = Duration::from_millis(state.config.readiness.timeout_in_ms);
    check_with_timeout(state.probe.as_ref(), limit)
        .await
        .map_err(|e| {
            state.metrics.record_error("database_error", endpoint);
            error!("Database error occurred during {} query: {}", query, e);
            HTTPError::internal("Database error")
        })
}

/// Lists users after checking the backing dependency.
async fn get_users(
    State(state): State<AppState>,
    path: MatchedPath,
) -> Result<Json<Vec<User>>, HTTPError> {
    query_dependency(&state, path.as_str(), "read").await?;
    Ok(Json(state.config.demo.users.clone()))
}

async fn get_user(
    State(state): State<AppState>,
    Path(id): Path<u64>,
) -> Result<Json<User>, HTTPError> {
    state
        .config
        .demo
        .users
        .iter()
        .find(|u| u.id == id)
        .cloned()
        .map(Json)
        .ok_or_else(|| HTTPError::new(StatusCode::NOT_FOUND, "User not found"))
}

/// Echoes back a JSON body.
async fn echo(
    State(state): State<AppState>,
    path: MatchedPath,
    body: Bytes,
) -> Result<Json<Value>, HTTPError> {
    let data = serde_json::from_slice::<Value>(&body).map_err(|e| {
        state.metrics.record_error("invalid_input", path.as_str());
        warn!("Rejected echo body: {}", e);
        HTTPError::bad_request("Invalid JSON")
    })?;
    query_dependency(&state, path.as_str(), "write").await?;
    Ok(Json(data))
}

#[derive(Deserialize)]
struct ErrorParams {
    #[serde(rename = "type")]
    kind: Option<String>,
}

/// Always fails: `?type=client` gives 400, anything else 500.
async fn simulate_error(
    State(state): State<AppState>,
    path: MatchedPath,
    Query(params): Query<ErrorParams>,
) -> HTTPError {
    state.metrics.record_error("simulated_error", path.as_str());

    match params.kind.as_deref() {
        Some("client") => {
            warn!("Client error simulated");
            HTTPError::bad_request("Bad Request Simulation")
        }
        _ => {
            error!("Server error simulated");
            HTTPError::internal("Internal Server Error Simulation")
        }
    }
}

#[derive(Deserialize)]
struct SlowParams {
    delay: Option<String>,
}

/// Parses `delay` in seconds, defaulting to one second and capped at `max`.
fn parse_delay(raw: Option<&str>, max: f64) -> Result<Duration, String> {
    let delay = match raw {
        None => 1.0,
        Some(s) => s
            .trim()
            .parse::<f64>()
            .map_err(|_| format!("delay '{}' is not a number", s))?,
    };
    if !delay.is_finite() || delay < 0.0 {
        return Err(format!("delay '{}' must be a non-negative number", delay));
    }
    let delay = delay.min(max);
    Duration::try_from_secs_f64(delay).map_err(|e| format!("delay '{}' is out of range: {}", delay, e))
}

/// Sleeps for `?delay=` seconds before answering.
async fn slow_response(
    State(state): State<AppState>,
    path: MatchedPath,
    Query(params): Query<SlowParams>,
) -> Result<Json<Value>, HTTPError> {
    let delay = parse_delay(params.delay.as_deref(), state.config.demo.max_slow_delay_secs)
        .map_err(|e| {
            state.metrics.record_error("invalid_input", path.as_str());
            HTTPError::bad_request(e)
        })?;

    let secs = delay.as_secs_f64();
    info!("Processing slow request with {}s delay", secs);
    query_dependency(&state, path.as_str(), "complex").await?;
    tokio::time::sleep(delay).await;

    Ok(Json(json!({
        "message": format!("Slow response completed after {} seconds", secs)
    })))
}

#[cfg(test)]
mod tests {
    use super::parse_delay;
    use std::time::Duration;

    #[test]
    fn delay_defaults_and_caps() {
        assert_eq!(parse_delay(None, 5.0), Ok(Duration::from_secs(1)));
        assert_eq!(parse_delay(Some("0.25"), 5.0), Ok(Duration::from_millis(250)));
        assert_eq!(parse_delay(Some("60"), 5.0), Ok(Duration::from_secs(5)));
    }

    #[test]
    fn delay_beyond_duration_range_is_an_error() {
        assert!(parse_delay(Some("1e25"), f64::MAX).is_err());
        assert_eq!(parse_delay(Some("1e25"), 3600.0), Ok(Duration::from_secs(3600)));
    }

    #[test]
    fn delay_rejects_garbage() {
        assert!(parse_delay(Some("soon"), 5.0).is_err());
        assert!(parse_delay(Some("-1"), 5.0).is_err());
        assert!(parse_delay(Some("NaN"), 5.0).is_err());
        assert!(parse_delay(Some("inf"), 5.0).is_err());
    }
}
