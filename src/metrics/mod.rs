//! Metrics collection and exposition.
//!
//! [`Registry`] holds counters, gauges and histograms keyed by label tuples;
//! [`HttpMetrics`] declares the request metrics the service records through
//! the request middleware.

mod error;
mod labels;
mod recorder;
mod registry;

pub use error::MetricsError;
pub use labels::LabelValues;
pub use recorder::{HttpMetrics, MetricNames, MetricsRecorder};
pub use registry::{format_float, HistogramSample, MetricKind, MetricSnapshot, Registry, Samples};
