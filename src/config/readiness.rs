use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::probe::ProbeConfig;

/// Readiness check settings: which dependency to probe and how long to wait.
#[derive(Deserialize, Serialize, Debug, Clone, JsonSchema)]
pub struct ReadinessConfig {
    #[serde(default = "default_timeout_in_ms")]
    pub timeout_in_ms: u64,
    #[serde(default)]
    pub probe: ProbeConfig,
}

impl Default for ReadinessConfig {
    fn default() -> Self {
        ReadinessConfig {
            timeout_in_ms: default_timeout_in_ms(),
            probe: ProbeConfig::default(),
        }
    }
}

fn default_timeout_in_ms() -> u64 {
    1000
}
