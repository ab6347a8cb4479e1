use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Settings for the HTTP request metrics.
#[derive(Deserialize, Serialize, Debug, Clone, JsonSchema)]
pub struct MetricsConfig {
    /// Prefix joined to every metric name with `_`; empty for none.
    #[serde(default = "default_namespace")]
    pub namespace: String,
    /// Upper bounds of the latency histogram, in seconds.
    #[serde(default = "default_latency_buckets")]
    pub latency_buckets: Vec<f64>,
    /// Label tuples kept per metric before new ones are dropped.
    #[serde(default = "default_max_series")]
    pub max_series_per_metric: usize,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        MetricsConfig {
            namespace: default_namespace(),
            latency_buckets: default_latency_buckets(),
            max_series_per_metric: default_max_series(),
        }
    }
}

fn default_namespace() -> String {
    "app".to_string()
}

fn default_latency_buckets() -> Vec<f64> {
    vec![0.01, 0.05, 0.1, 0.5, 1.0, 2.0, 5.0]
}

fn default_max_series() -> usize {
    1000
}
