use thiserror::Error;

use super::registry::MetricKind;

/// Errors raised by the metric registry.
///
/// None of these reach an HTTP response; the recorder logs and drops them.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum MetricsError {
    #[error("metric '{0}' is already registered")]
    AlreadyRegistered(String),
    #[error("invalid metric name '{0}'")]
    InvalidMetricName(String),
    #[error("invalid label name '{label}' for metric '{metric}'")]
    InvalidLabelName { metric: String, label: String },
    #[error("invalid buckets for histogram '{metric}': {reason}")]
    InvalidBuckets { metric: String, reason: String },
    #[error("unknown metric '{0}'")]
    UnknownMetric(String),
    #[error("metric '{metric}' is a {actual}, not a {expected}")]
    KindMismatch {
        metric: String,
        expected: MetricKind,
        actual: MetricKind,
    },
    #[error("metric '{metric}' expects {expected} label values, got {got}")]
    LabelArity {
        metric: String,
        expected: usize,
        got: usize,
    },
    #[error("invalid observation {value} for histogram '{metric}'")]
    InvalidObservation { metric: String, value: f64 },
    #[error("metric '{metric}' reached its limit of {limit} series")]
    SeriesLimitReached { metric: String, limit: usize },
}

impl MetricsError {
    /// A stable key used to throttle repeated log lines for the same fault.
    pub fn throttle_key(&self) -> String {
        match self {
            MetricsError::AlreadyRegistered(m)
            | MetricsError::InvalidMetricName(m)
            | MetricsError::UnknownMetric(m) => format!("metrics.{}", m),
            MetricsError::InvalidLabelName { metric, .. }
            | MetricsError::InvalidBuckets { metric, .. } => format!("metrics.{}.definition", metric),
            MetricsError::KindMismatch { metric, .. } => format!("metrics.{}.kind", metric),
            MetricsError::LabelArity { metric, .. } => format!("metrics.{}.arity", metric),
            MetricsError::InvalidObservation { metric, .. } => {
                format!("metrics.{}.observation", metric)
            }
            MetricsError::SeriesLimitReached { metric, .. } => format!("metrics.{}.series", metric),
        }
    }
}
