use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::routing::get;
use axum::{middleware, Router};
use reqmetrics::config::MetricsConfig;
use reqmetrics::metrics::HttpMetrics;
use reqmetrics::middleware::{track_requests, CLIENT_CLOSED_REQUEST};
use tokio::sync::Notify;
use tower::ServiceExt;

fn metrics() -> HttpMetrics {
    HttpMetrics::new(&MetricsConfig::default()).expect("metrics should register")
}

fn instrument(router: Router, metrics: &HttpMetrics) -> Router {
    router.layer(middleware::from_fn_with_state(
        metrics.clone(),
        track_requests::<HttpMetrics>,
    ))
}

fn get_request(path: &str) -> Request<Body> {
    Request::builder()
        .uri(path)
        .body(Body::empty())
        .expect("failed to build request")
}

fn count(metrics: &HttpMetrics, endpoint: &str, status: &str) -> u64 {
    metrics
        .registry()
        .counter_value(&metrics.names().request_count, &[endpoint, "GET", status])
        .unwrap_or(0)
}

async fn panicking() -> &'static str {
    panic!("handler exploded")
}

#[tokio::test]
async fn gauge_tracks_in_flight_requests() {
    let metrics = metrics();
    let entered = Arc::new(Notify::new());
    let release = Arc::new(Notify::new());

    let (e, r) = (entered.clone(), release.clone());
    let app = instrument(
        Router::new().route(
            "/block",
            get(move || {
                let (e, r) = (e.clone(), r.clone());
                async move {
                    e.notify_one();
                    r.notified().await;
                    "done"
                }
            }),
        ),
        &metrics,
    );

    let handle = tokio::spawn(app.oneshot(get_request("/block")));
    entered.notified().await;
    assert_eq!(metrics.active_requests(), 1);
    assert_eq!(count(&metrics, "/block", "200"), 0);

    release.notify_one();
    let response = handle
        .await
        .expect("task should not panic")
        .expect("request should complete");
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(metrics.active_requests(), 0);
    assert_eq!(count(&metrics, "/block", "200"), 1);
}

#[tokio::test]
async fn panicking_handler_is_recorded_as_server_error() {
    let metrics = metrics();
    let app = instrument(Router::new().route("/panic", get(panicking)), &metrics);

    let response = app
        .oneshot(get_request("/panic"))
        .await
        .expect("request should complete");

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(metrics.active_requests(), 0);
    assert_eq!(count(&metrics, "/panic", "500"), 1);
}

#[tokio::test]
async fn dropped_request_is_recorded_exactly_once() {
    let metrics = metrics();
    let entered = Arc::new(Notify::new());

    let e = entered.clone();
    let app = instrument(
        Router::new().route(
            "/hang",
            get(move || {
                let e = e.clone();
                async move {
                    e.notify_one();
                    std::future::pending::<&'static str>().await
                }
            }),
        ),
        &metrics,
    );

    let handle = tokio::spawn(app.oneshot(get_request("/hang")));
    entered.notified().await;
    assert_eq!(metrics.active_requests(), 1);

    handle.abort();
    let result = handle.await;
    assert!(result.expect_err("task was aborted").is_cancelled());

    assert_eq!(metrics.active_requests(), 0);
    let status = CLIENT_CLOSED_REQUEST.to_string();
    assert_eq!(count(&metrics, "/hang", &status), 1);
}

#[tokio::test]
async fn mixed_outcomes_return_gauge_to_baseline() {
    let metrics = metrics();
    let app = instrument(
        Router::new()
            .route("/ok", get(|| async { "ok" }))
            .route("/fail", get(|| async { StatusCode::BAD_GATEWAY }))
            .route("/panic", get(panicking)),
        &metrics,
    );

    let paths = ["/ok", "/fail", "/panic"];
    let requests = (0..30).map(|i| app.clone().oneshot(get_request(paths[i % 3])));
    for response in futures::future::join_all(requests).await {
        response.expect("request should complete");
    }

    assert_eq!(metrics.active_requests(), 0);
    assert_eq!(count(&metrics, "/ok", "200"), 10);
    assert_eq!(count(&metrics, "/fail", "502"), 10);
    assert_eq!(count(&metrics, "/panic", "500"), 10);
}
