//! Metric registry: counters, gauges and cumulative histograms keyed by
//! label tuples, rendered in the text exposition format.
//!
//! The name map is only written at registration. Each metric keeps its series
//! in a sharded `DashMap`; counters and gauges are plain atomics, a histogram
//! series sits behind its own mutex so buckets, sum and count always agree.

use dashmap::DashMap;
use std::collections::BTreeMap;
use std::fmt::{self, Write};
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use super::error::MetricsError;
use super::labels::{escape_help, is_valid_label_name, is_valid_metric_name, LabelPairs, LabelValues};

/// Series cap applied when none is configured.
const DEFAULT_MAX_SERIES: usize = 10_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricKind {
    Counter,
    Gauge,
    Histogram,
}

impl MetricKind {
    pub fn as_str(self) -> &'static str {
        match self {
            MetricKind::Counter => "counter",
            MetricKind::Gauge => "gauge",
            MetricKind::Histogram => "histogram",
        }
    }
}

impl fmt::Display for MetricKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone)]
struct HistogramState {
    buckets: Vec<u64>,
    sum: f64,
    count: u64,
}

impl HistogramState {
    fn new(bucket_count: usize) -> Self {
        HistogramState {
            buckets: vec![0; bucket_count],
            sum: 0.0,
            count: 0,
        }
    }
}

enum Series {
    Counter(DashMap<LabelValues, AtomicU64>),
    Gauge(DashMap<LabelValues, AtomicI64>),
    Histogram {
        bounds: Vec<f64>,
        cells: DashMap<LabelValues, Mutex<HistogramState>>,
    },
}

impl Series {
    fn kind(&self) -> MetricKind {
        match self {
            Series::Counter(_) => MetricKind::Counter,
            Series::Gauge(_) => MetricKind::Gauge,
            Series::Histogram { .. } => MetricKind::Histogram,
        }
    }
}

struct Family {
    name: String,
    help: String,
    label_names: Vec<String>,
    series: Series,
}

impl Family {
    fn key(&self, labels: &[&str]) -> Result<LabelValues, MetricsError> {
        if labels.len() != self.label_names.len() {
            return Err(MetricsError::LabelArity {
                metric: self.name.clone(),
                expected: self.label_names.len(),
                got: labels.len(),
            });
        }
        Ok(LabelValues::new(labels))
    }

    fn kind_mismatch(&self, expected: MetricKind) -> MetricsError {
        MetricsError::KindMismatch {
            metric: self.name.clone(),
            expected,
            actual: self.series.kind(),
        }
    }
}

/// Applies `apply` to the series for `key`, creating it unless the cap is
/// reached.
///
/// The cap check and the insert are not one atomic step, so concurrent
/// first observations can overshoot the cap by at most the number of racing
/// writers.
fn with_series<V, R>(
    map: &DashMap<LabelValues, V>,
    key: LabelValues,
    metric: &str,
    limit: usize,
    init: impl FnOnce() -> V,
    apply: impl FnOnce(&V) -> R,
) -> Result<R, MetricsError> {
    if let Some(existing) = map.get(&key) {
        return Ok(apply(existing.value()));
    }
    if map.len() >= limit {
        return Err(MetricsError::SeriesLimitReached {
            metric: metric.to_string(),
            limit,
        });
    }
    let entry = map.entry(key).or_insert_with(init);
    Ok(apply(entry.value()))
}

/// One histogram series as copied out of the registry.
#[derive(Debug, Clone, PartialEq)]
pub struct HistogramSample {
    /// Cumulative counts, one per declared bound.
    pub buckets: Vec<u64>,
    pub sum: f64,
    pub count: u64,
}

/// The values of one metric at snapshot time, series sorted by labels.
#[derive(Debug, Clone, PartialEq)]
pub enum Samples {
    Counter(Vec<(LabelValues, u64)>),
    Gauge(Vec<(LabelValues, i64)>),
    Histogram {
        bounds: Vec<f64>,
        series: Vec<(LabelValues, HistogramSample)>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct MetricSnapshot {
    pub name: String,
    pub help: String,
    pub label_names: Vec<String>,
    pub samples: Samples,
}

impl MetricSnapshot {
    pub fn kind(&self) -> MetricKind {
        match self.samples {
            Samples::Counter(_) => MetricKind::Counter,
            Samples::Gauge(_) => MetricKind::Gauge,
            Samples::Histogram { .. } => MetricKind::Histogram,
        }
    }

    /// Appends this metric in text exposition format.
    pub fn encode(&self, out: &mut String) {
        // Build into a local buffer so a metric is appended whole or not at all.
        let mut buf = String::new();
        let _ = self.encode_into(&mut buf);
        out.push_str(&buf);
    }

    fn series_labels<'a>(&'a self, values: &'a LabelValues) -> LabelPairs<'a> {
        LabelPairs {
            names: &self.label_names,
            values,
            extra: None,
        }
    }

    fn encode_into(&self, buf: &mut String) -> fmt::Result {
        let name = &self.name;
        writeln!(buf, "# HELP {} {}", name, escape_help(&self.help))?;
        writeln!(buf, "# TYPE {} {}", name, self.kind())?;

        match &self.samples {
            Samples::Counter(series) => {
                for (values, value) in series {
                    writeln!(buf, "{}{} {}", name, self.series_labels(values), value)?;
                }
            }
            Samples::Gauge(series) => {
                for (values, value) in series {
                    writeln!(buf, "{}{} {}", name, self.series_labels(values), value)?;
                }
            }
            Samples::Histogram { bounds, series } => {
                for (values, sample) in series {
                    for (bound, count) in bounds.iter().zip(&sample.buckets) {
                        let le = format_float(*bound);
                        let labels = LabelPairs {
                            names: &self.label_names,
                            values,
                            extra: Some(("le", le.as_str())),
                        };
                        writeln!(buf, "{}_bucket{} {}", name, labels, count)?;
                    }
                    let inf = LabelPairs {
                        names: &self.label_names,
                        values,
                        extra: Some(("le", "+Inf")),
                    };
                    writeln!(buf, "{}_bucket{} {}", name, inf, sample.count)?;
                    writeln!(
                        buf,
                        "{}_sum{} {}",
                        name,
                        self.series_labels(values),
                        format_float(sample.sum)
                    )?;
                    writeln!(buf, "{}_count{} {}", name, self.series_labels(values), sample.count)?;
                }
            }
        }
        Ok(())
    }
}

/// Formats a float the way the exposition format expects infinities.
pub fn format_float(v: f64) -> String {
    if v.is_nan() {
        "NaN".to_string()
    } else if v == f64::INFINITY {
        "+Inf".to_string()
    } else if v == f64::NEG_INFINITY {
        "-Inf".to_string()
    } else {
        v.to_string()
    }
}

/// A collection of named metrics.
///
/// Built once at startup and shared by handle; there is no global instance.
pub struct Registry {
    families: RwLock<BTreeMap<String, Arc<Family>>>,
    max_series: usize,
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl Registry {
    pub fn new() -> Self {
        Self::with_series_limit(DEFAULT_MAX_SERIES)
    }

    /// Creates a registry where each metric holds at most `max_series` label
    /// tuples.
    pub fn with_series_limit(max_series: usize) -> Self {
        Registry {
            families: RwLock::new(BTreeMap::new()),
            max_series: max_series.max(1),
        }
    }

    pub fn register_counter(
        &self,
        name: &str,
        help: &str,
        label_names: &[&str],
    ) -> Result<(), MetricsError> {
        let labels = validate_definition(name, label_names)?;
        let series = DashMap::new();
        if labels.is_empty() {
            series.insert(LabelValues::default(), AtomicU64::new(0));
        }
        self.insert(name, help, labels, Series::Counter(series))
    }

    pub fn register_gauge(
        &self,
        name: &str,
        help: &str,
        label_names: &[&str],
    ) -> Result<(), MetricsError> {
        let labels = validate_definition(name, label_names)?;
        let series = DashMap::new();
        if labels.is_empty() {
            series.insert(LabelValues::default(), AtomicI64::new(0));
        }
        self.insert(name, help, labels, Series::Gauge(series))
    }

    /// Registers a histogram. `buckets` are upper bounds and must be finite
    /// and strictly increasing; the `+Inf` bucket is implicit.
    pub fn register_histogram(
        &self,
        name: &str,
        help: &str,
        label_names: &[&str],
        buckets: &[f64],
    ) -> Result<(), MetricsError> {
        let labels = validate_definition(name, label_names)?;
        if labels.iter().any(|l| l == "le") {
            return Err(MetricsError::InvalidLabelName {
                metric: name.to_string(),
                label: "le".to_string(),
            });
        }
        validate_buckets(name, buckets)?;

        let cells = DashMap::new();
        if labels.is_empty() {
            cells.insert(
                LabelValues::default(),
                Mutex::new(HistogramState::new(buckets.len())),
            );
        }
        self.insert(
            name,
            help,
            labels,
            Series::Histogram {
                bounds: buckets.to_vec(),
                cells,
            },
        )
    }

    fn insert(
        &self,
        name: &str,
        help: &str,
        label_names: Vec<String>,
        series: Series,
    ) -> Result<(), MetricsError> {
        let mut families = self.families.write().unwrap_or_else(PoisonError::into_inner);
        if families.contains_key(name) {
            return Err(MetricsError::AlreadyRegistered(name.to_string()));
        }
        families.insert(
            name.to_string(),
            Arc::new(Family {
                name: name.to_string(),
                help: help.to_string(),
                label_names,
                series,
            }),
        );
        Ok(())
    }

    fn family(&self, name: &str) -> Result<Arc<Family>, MetricsError> {
        self.families
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
            .ok_or_else(|| MetricsError::UnknownMetric(name.to_string()))
    }

    /// Adds one to the counter series for `labels`, creating it if needed.
    pub fn increment_counter(&self, name: &str, labels: &[&str]) -> Result<(), MetricsError> {
        let family = self.family(name)?;
        let Series::Counter(map) = &family.series else {
            return Err(family.kind_mismatch(MetricKind::Counter));
        };
        let key = family.key(labels)?;
        with_series(
            map,
            key,
            &family.name,
            self.max_series,
            || AtomicU64::new(0),
            |counter| counter.fetch_add(1, Ordering::Relaxed),
        )?;
        Ok(())
    }

    /// Records one observation. Negative and NaN values are rejected.
    pub fn observe_histogram(
        &self,
        name: &str,
        labels: &[&str],
        value: f64,
    ) -> Result<(), MetricsError> {
        let family = self.family(name)?;
        let Series::Histogram { bounds, cells } = &family.series else {
            return Err(family.kind_mismatch(MetricKind::Histogram));
        };
        if value.is_nan() || value < 0.0 {
            return Err(MetricsError::InvalidObservation {
                metric: family.name.clone(),
                value,
            });
        }
        let key = family.key(labels)?;
        with_series(
            cells,
            key,
            &family.name,
            self.max_series,
            || Mutex::new(HistogramState::new(bounds.len())),
            |cell| {
                let mut state = cell.lock().unwrap_or_else(PoisonError::into_inner);
                for (bound, bucket) in bounds.iter().zip(state.buckets.iter_mut()) {
                    if value <= *bound {
                        *bucket += 1;
                    }
                }
                state.sum += value;
                state.count += 1;
            },
        )
    }

    /// Adjusts a gauge series by a signed delta.
    pub fn adjust_gauge(&self, name: &str, labels: &[&str], delta: i64) -> Result<(), MetricsError> {
        let family = self.family(name)?;
        let Series::Gauge(map) = &family.series else {
            return Err(family.kind_mismatch(MetricKind::Gauge));
        };
        let key = family.key(labels)?;
        with_series(
            map,
            key,
            &family.name,
            self.max_series,
            || AtomicI64::new(0),
            |gauge| gauge.fetch_add(delta, Ordering::Relaxed),
        )?;
        Ok(())
    }

    /// Raises an unlabelled gauge by `delta`.
    pub fn inc_gauge(&self, name: &str, delta: i64) -> Result<(), MetricsError> {
        self.adjust_gauge(name, &[], delta)
    }

    /// Lowers an unlabelled gauge by `delta`.
    pub fn dec_gauge(&self, name: &str, delta: i64) -> Result<(), MetricsError> {
        self.adjust_gauge(name, &[], delta.saturating_neg())
    }

    /// Copies every metric, ordered by name with series ordered by labels.
    ///
    /// Each series is read under its own guard; values of different series
    /// may come from slightly different instants.
    pub fn snapshot(&self) -> Vec<MetricSnapshot> {
        let families: Vec<Arc<Family>> = self
            .families
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect();

        families.iter().map(|f| snapshot_family(f)).collect()
    }

    /// Renders every metric in text exposition format.
    pub fn render(&self) -> String {
        let mut out = String::new();
        for metric in self.snapshot() {
            metric.encode(&mut out);
        }
        out
    }

    pub fn counter_value(&self, name: &str, labels: &[&str]) -> Option<u64> {
        let family = self.family(name).ok()?;
        match &family.series {
            Series::Counter(map) => map
                .get(&LabelValues::new(labels))
                .map(|c| c.load(Ordering::Relaxed)),
            _ => None,
        }
    }

    pub fn gauge_value(&self, name: &str, labels: &[&str]) -> Option<i64> {
        let family = self.family(name).ok()?;
        match &family.series {
            Series::Gauge(map) => map
                .get(&LabelValues::new(labels))
                .map(|g| g.load(Ordering::Relaxed)),
            _ => None,
        }
    }

    pub fn histogram_sample(&self, name: &str, labels: &[&str]) -> Option<HistogramSample> {
        let family = self.family(name).ok()?;
        match &family.series {
            Series::Histogram { cells, .. } => cells
                .get(&LabelValues::new(labels))
                .map(|cell| to_sample(&cell.lock().unwrap_or_else(PoisonError::into_inner))),
            _ => None,
        }
    }
}

fn to_sample(state: &HistogramState) -> HistogramSample {
    HistogramSample {
        buckets: state.buckets.clone(),
        sum: state.sum,
        count: state.count,
    }
}

fn snapshot_family(family: &Family) -> MetricSnapshot {
    let samples = match &family.series {
        Series::Counter(map) => {
            let mut series: Vec<_> = map
                .iter()
                .map(|e| (e.key().clone(), e.value().load(Ordering::Relaxed)))
                .collect();
            series.sort_by(|a, b| a.0.cmp(&b.0));
            Samples::Counter(series)
        }
        Series::Gauge(map) => {
            let mut series: Vec<_> = map
                .iter()
                .map(|e| (e.key().clone(), e.value().load(Ordering::Relaxed)))
                .collect();
            series.sort_by(|a, b| a.0.cmp(&b.0));
            Samples::Gauge(series)
        }
        Series::Histogram { bounds, cells } => {
            let mut series: Vec<_> = cells
                .iter()
                .map(|e| {
                    let state = e.value().lock().unwrap_or_else(PoisonError::into_inner);
                    (e.key().clone(), to_sample(&state))
                })
                .collect();
            series.sort_by(|a, b| a.0.cmp(&b.0));
            Samples::Histogram {
                bounds: bounds.clone(),
                series,
            }
        }
    };

    MetricSnapshot {
        name: family.name.clone(),
        help: family.help.clone(),
        label_names: family.label_names.clone(),
        samples,
    }
}

fn validate_definition(name: &str, label_names: &[&str]) -> Result<Vec<String>, MetricsError> {
    if !is_valid_metric_name(name) {
        return Err(MetricsError::InvalidMetricName(name.to_string()));
    }
    let mut seen: Vec<String> = Vec::with_capacity(label_names.len());
    for label in label_names {
        if !is_valid_label_name(label) || seen.iter().any(|s| s == label) {
            return Err(MetricsError::InvalidLabelName {
                metric: name.to_string(),
                label: label.to_string(),
            });
        }
        seen.push(label.to_string());
    }
    Ok(seen)
}

fn validate_buckets(name: &str, buckets: &[f64]) -> Result<(), MetricsError> {
    let invalid = |reason: &str| MetricsError::InvalidBuckets {
        metric: name.to_string(),
        reason: reason.to_string(),
    };
    if buckets.is_empty() {
        return Err(invalid("at least one bucket is required"));
    }
    if buckets.iter().any(|b| !b.is_finite()) {
        return Err(invalid("bounds must be finite"));
    }
    if buckets.windows(2).any(|w| w[0] >= w[1]) {
        return Err(invalid("bounds must be strictly increasing"));
    }
    Ok(())
}
