//! Per-request instrumentation.
//!
//! [`track_requests`] wraps every routed handler: it raises the in-flight
//! gauge on entry and, whatever happens to the handler, records latency and
//! the final status exactly once on exit.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::time::Instant;

use axum::extract::{MatchedPath, Request, State};
use axum::http::{HeaderValue, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use futures::FutureExt;
use tracing::{error, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::metrics::MetricsRecorder;
use crate::utils::http_helpers::HTTPError;

/// Response header carrying the id assigned to the request.
pub const REQUEST_ID_HEADER: &str = "x-request-id";
/// Endpoint label for requests that matched no route.
pub const UNMATCHED_ROUTE: &str = "unmatched";
/// Status label for requests dropped before a response was produced.
pub const CLIENT_CLOSED_REQUEST: u16 = 499;

/// Exit bookkeeping for one request, run from `Drop` so it cannot be skipped.
struct InFlight<R: MetricsRecorder> {
    recorder: R,
    endpoint: String,
    method: String,
    path: String,
    request_id: String,
    start: Instant,
    status: Option<StatusCode>,
}

impl<R: MetricsRecorder> InFlight<R> {
    fn enter(recorder: R, endpoint: String, method: String, path: String, request_id: String) -> Self {
        recorder.request_started();
        InFlight {
            recorder,
            endpoint,
            method,
            path,
            request_id,
            start: Instant::now(),
            status: None,
        }
    }

    fn complete(&mut self, status: StatusCode) {
        self.status = Some(status);
    }
}

impl<R: MetricsRecorder> Drop for InFlight<R> {
    fn drop(&mut self) {
        let elapsed = self.start.elapsed();
        let status = self
            .status
            .map(|s| s.as_u16())
            .unwrap_or(CLIENT_CLOSED_REQUEST);
        self.recorder
            .request_finished(&self.endpoint, &self.method, status, elapsed);

        if self.status.is_some() {
            info!(
                request_id = %self.request_id,
                "Processed {} {} in {:.4}s with status {}",
                self.method,
                self.path,
                elapsed.as_secs_f64(),
                status
            );
        } else {
            warn!(
                request_id = %self.request_id,
                "Request {} {} dropped after {:.4}s",
                self.method,
                self.path,
                elapsed.as_secs_f64()
            );
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("unknown panic")
}

/// Middleware recording request count, latency and in-flight requests.
///
/// Requests are labelled by route template (`/api/users/:id`), never by the
/// raw path, to keep label cardinality bounded. A panicking handler is turned
/// into a `500` response.
pub async fn track_requests<R: MetricsRecorder>(
    State(recorder): State<R>,
    request: Request,
    next: Next,
) -> Response {
    let endpoint = request
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_string())
        .unwrap_or_else(|| UNMATCHED_ROUTE.to_string());
    let method = request.method().as_str().to_string();
    let path = request.uri().path().to_string();
    let request_id = Uuid::new_v4().to_string();

    let span = info_span!("request", request_id = %request_id, method = %method, endpoint = %endpoint);
    let mut in_flight = InFlight::enter(recorder, endpoint, method, path, request_id.clone());

    let mut response = match AssertUnwindSafe(next.run(request).instrument(span.clone()))
        .catch_unwind()
        .await
    {
        Ok(response) => response,
        Err(payload) => {
            span.in_scope(|| error!("Handler panicked: {}", panic_message(payload.as_ref())));
            HTTPError::internal("Internal Server Error").into_response()
        }
    };

    in_flight.complete(response.status());
    drop(in_flight);

    if let Ok(value) = HeaderValue::from_str(&request_id) {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_panic_messages() {
        let payload: Box<dyn Any + Send> = Box::new("boom");
        assert_eq!(panic_message(payload.as_ref()), "boom");

        let payload: Box<dyn Any + Send> = Box::new(String::from("bang"));
        assert_eq!(panic_message(payload.as_ref()), "bang");

        let payload: Box<dyn Any + Send> = Box::new(42_u8);
        assert_eq!(panic_message(payload.as_ref()), "unknown panic");
    }
}
