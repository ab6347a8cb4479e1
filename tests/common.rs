#![allow(dead_code)]

use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::http::{Method, Request, Response};
use axum::Router;
use figment::{
    providers::{Format, Yaml},
    Figment,
};
use reqmetrics::config::{load_config_from, ConfigV1};
use reqmetrics::routes::create_router;
use reqmetrics::startup::build_state;
use reqmetrics::state::AppState;
use serde_json::Value;

pub const TEST_CONFIG: &str = r#"
version: "1.0.0"
bind_address: 127.0.0.1:8081
logging:
  level: "debug"
  format: "json"
metrics:
  namespace: "app"
  latency_buckets: [0.01, 0.05, 0.1, 0.5, 1, 2, 5]
  max_series_per_metric: 1000
readiness:
  timeout_in_ms: 200
  probe:
    type: "static"
    name: "database"
    latency_ms: 0
    healthy: true
demo:
  max_slow_delay_secs: 0.2
  users:
    - id: 1
      name: Alice
      email: alice@example.com
    - id: 2
      name: Bob
      email: bob@example.com
"#;

/// Parses `TEST_CONFIG` with `overrides` merged on top.
pub fn load_test_config(overrides: &str) -> ConfigV1 {
    load_config_from(
        Figment::new()
            .merge(Yaml::string(TEST_CONFIG))
            .merge(Yaml::string(overrides)),
    )
    .expect("Failed to parse test config YAML")
}

pub fn build_app(config: ConfigV1) -> (Router, AppState) {
    let state = build_state(Arc::new(config)).expect("metrics should register");
    (create_router(state.clone()), state)
}

pub fn request(method: Method, path: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(path)
        .body(Body::empty())
        .expect("failed to build request")
}

pub fn json_request(path: &str, body: &str) -> Request<Body> {
    Request::builder()
        .method(Method::POST)
        .uri(path)
        .header("Content-Type", "application/json")
        .body(Body::from(body.to_string()))
        .expect("failed to build request")
}

pub async fn body_string(response: Response<Body>) -> String {
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body should be readable");
    String::from_utf8(bytes.to_vec()).expect("body should be UTF-8")
}

pub async fn body_json(response: Response<Body>) -> Value {
    serde_json::from_str(&body_string(response).await).expect("body should be JSON")
}

/// Value of `app_request_count` for one series, 0 when absent.
pub fn request_count(state: &AppState, endpoint: &str, method: &str, status: &str) -> u64 {
    state
        .metrics
        .registry()
        .counter_value(&state.metrics.names().request_count, &[endpoint, method, status])
        .unwrap_or(0)
}

/// Value of `app_error_count` for one series, 0 when absent.
pub fn error_count(state: &AppState, error_type: &str, endpoint: &str) -> u64 {
    state
        .metrics
        .registry()
        .counter_value(&state.metrics.names().error_count, &[error_type, endpoint])
        .unwrap_or(0)
}
