use std::time::Duration;

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::DependencyProbe;

/// A probe with a fixed latency and outcome, for local runs and tests.
#[derive(Deserialize, Serialize, Debug, Clone, JsonSchema)]
pub struct StaticProbeConfig {
    #[serde(default = "default_name")]
    pub name: String,
    /// Time each check takes before answering.
    #[serde(default)]
    pub latency_ms: u64,
    #[serde(default = "default_healthy")]
    pub healthy: bool,
    /// Reason returned when `healthy` is false.
    #[serde(default = "default_failure_message")]
    pub failure_message: String,
}

impl Default for StaticProbeConfig {
    fn default() -> Self {
        StaticProbeConfig {
            name: default_name(),
            latency_ms: 0,
            healthy: default_healthy(),
            failure_message: default_failure_message(),
        }
    }
}

fn default_name() -> String {
    "database".to_string()
}

fn default_healthy() -> bool {
    true
}

fn default_failure_message() -> String {
    "dependency unavailable".to_string()
}

pub struct StaticProbe {
    config: StaticProbeConfig,
}

impl StaticProbe {
    pub fn new(config: &StaticProbeConfig) -> Self {
        Self {
            config: config.clone(),
        }
    }
}

#[async_trait]
impl DependencyProbe for StaticProbe {
    fn get_name(&self) -> &str {
        &self.config.name
    }

    fn get_type(&self) -> &str {
        "static"
    }

    async fn check(&self) -> Result<(), String> {
        if self.config.latency_ms > 0 {
            tokio::time::sleep(Duration::from_millis(self.config.latency_ms)).await;
        }
        if self.config.healthy {
            Ok(())
        } else {
            Err(self.config.failure_message.clone())
        }
    }
}
