//! HTTP request metrics recorded on top of the [`Registry`].

use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

use super::error::MetricsError;
use super::registry::Registry;
use crate::config::MetricsConfig;
use crate::utils::log_throttle::LogThrottle;

/// How often the same instrumentation fault may be logged.
const ERROR_LOG_INTERVAL: Duration = Duration::from_secs(60);

/// Trait for recording request-level metrics.
///
/// Implementations never fail: a metric that cannot be updated is logged and
/// dropped so the request path is unaffected.
pub trait MetricsRecorder: Clone + Send + Sync + 'static {
    /// Records that a request entered the service.
    fn request_started(&self);

    /// Records a finished request with its route template and final status.
    fn request_finished(&self, endpoint: &str, method: &str, status: u16, elapsed: Duration);

    /// Records a business-level error of the given type.
    fn record_error(&self, error_type: &str, endpoint: &str);
}

/// Fully qualified names of the HTTP metrics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricNames {
    pub request_count: String,
    pub request_latency: String,
    pub error_count: String,
    pub active_requests: String,
}

impl MetricNames {
    fn new(namespace: &str) -> Self {
        let qualify = |name: &str| {
            if namespace.is_empty() {
                name.to_string()
            } else {
                format!("{}_{}", namespace, name)
            }
        };
        MetricNames {
            request_count: qualify("request_count"),
            request_latency: qualify("request_latency_seconds"),
            error_count: qualify("error_count"),
            active_requests: qualify("active_requests"),
        }
    }
}

/// Request counters, latency histogram and in-flight gauge for the service.
#[derive(Clone)]
pub struct HttpMetrics {
    registry: Arc<Registry>,
    names: Arc<MetricNames>,
    throttle: Arc<LogThrottle>,
}

impl HttpMetrics {
    /// Creates a fresh registry and declares the HTTP metrics in it.
    pub fn new(config: &MetricsConfig) -> Result<Self, MetricsError> {
        let registry = Arc::new(Registry::with_series_limit(config.max_series_per_metric));
        let names = MetricNames::new(&config.namespace);

        registry.register_counter(
            &names.request_count,
            "Application Request Count",
            &["endpoint", "method", "http_status"],
        )?;
        registry.register_histogram(
            &names.request_latency,
            "Application Request Latency",
            &["endpoint", "method"],
            &config.latency_buckets,
        )?;
        registry.register_counter(
            &names.error_count,
            "Application Error Count",
            &["error_type", "endpoint"],
        )?;
        registry.register_gauge(
            &names.active_requests,
            "Active Requests Currently Being Processed",
            &[],
        )?;

        Ok(HttpMetrics {
            registry,
            names: Arc::new(names),
            throttle: Arc::new(LogThrottle::new(ERROR_LOG_INTERVAL)),
        })
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    pub fn names(&self) -> &MetricNames {
        &self.names
    }

    /// Renders all metrics in text exposition format.
    pub fn render(&self) -> String {
        self.registry.render()
    }

    /// Logs an instrumentation failure, at most once per key and interval.
    fn report(&self, result: Result<(), MetricsError>) {
        if let Err(e) = result {
            if let Some(suppressed) = self.throttle.should_emit(&e.throttle_key()) {
                warn!(error = %e, suppressed, "Dropping metric update");
            }
        }
    }

    /// Current value of the in-flight gauge.
    pub fn active_requests(&self) -> i64 {
        self.registry
            .gauge_value(&self.names.active_requests, &[])
            .unwrap_or_default()
    }
}

impl MetricsRecorder for HttpMetrics {
    fn request_started(&self) {
        self.report(self.registry.inc_gauge(&self.names.active_requests, 1));
    }

    fn request_finished(&self, endpoint: &str, method: &str, status: u16, elapsed: Duration) {
        self.report(self.registry.dec_gauge(&self.names.active_requests, 1));
        self.report(self.registry.observe_histogram(
            &self.names.request_latency,
            &[endpoint, method],
            elapsed.as_secs_f64(),
        ));
        let status = status.to_string();
        self.report(
            self.registry
                .increment_counter(&self.names.request_count, &[endpoint, method, &status]),
        );
    }

    fn record_error(&self, error_type: &str, endpoint: &str) {
        self.report(
            self.registry
                .increment_counter(&self.names.error_count, &[error_type, endpoint]),
        );
    }
}
