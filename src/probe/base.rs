use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tokio::time::timeout;
use tracing::{debug, info, warn};

use super::static_probe::{StaticProbe, StaticProbeConfig};
use super::tcp_probe::{TcpProbe, TcpProbeConfig};

/// Which probe backs the readiness check. Selected by a "type" tag in YAML.
#[derive(Deserialize, Serialize, JsonSchema, Debug, Clone)]
#[serde(tag = "type")]
pub enum ProbeConfig {
    #[serde(rename = "static")]
    Static(StaticProbeConfig),

    #[serde(rename = "tcp")]
    Tcp(TcpProbeConfig),
}

impl Default for ProbeConfig {
    fn default() -> Self {
        ProbeConfig::Static(StaticProbeConfig::default())
    }
}

/// A dependency the service needs before it can take traffic.
#[async_trait]
pub trait DependencyProbe: Send + Sync {
    fn get_name(&self) -> &str;
    fn get_type(&self) -> &str;
    /// Returns `Err` with a human readable reason when the dependency is down.
    async fn check(&self) -> Result<(), String>;
}

/// Create a probe from its config.
pub fn create_probe(config: &ProbeConfig) -> Arc<dyn DependencyProbe> {
    let probe: Arc<dyn DependencyProbe> = match config {
        ProbeConfig::Static(cfg) => Arc::new(StaticProbe::new(cfg)),
        ProbeConfig::Tcp(cfg) => Arc::new(TcpProbe::new(cfg)),
    };
    info!(
        "Using {} probe '{}' for readiness",
        probe.get_type(),
        probe.get_name()
    );
    probe
}

/// Runs a probe, treating a probe slower than `limit` as failed.
pub async fn check_with_timeout(probe: &dyn DependencyProbe, limit: Duration) -> Result<(), String> {
    match timeout(limit, probe.check()).await {
        Ok(Ok(())) => {
            debug!("Probe '{}' succeeded", probe.get_name());
            Ok(())
        }
        Ok(Err(e)) => {
            warn!("Probe '{}' failed: {}", probe.get_name(), e);
            Err(e)
        }
        Err(_) => {
            warn!("Probe '{}' timed out after {:?}", probe.get_name(), limit);
            Err(format!("timed out after {}ms", limit.as_millis()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn static_config(latency_ms: u64, healthy: bool) -> ProbeConfig {
        ProbeConfig::Static(StaticProbeConfig {
            name: "database".to_string(),
            latency_ms,
            healthy,
            failure_message: "connection refused".to_string(),
        })
    }

    #[tokio::test]
    async fn healthy_probe_passes() {
        let probe = create_probe(&static_config(0, true));
        assert_eq!(
            check_with_timeout(probe.as_ref(), Duration::from_millis(100)).await,
            Ok(())
        );
    }

    #[tokio::test]
    async fn failing_probe_reports_reason() {
        let probe = create_probe(&static_config(0, false));
        assert_eq!(
            check_with_timeout(probe.as_ref(), Duration::from_millis(100)).await,
            Err("connection refused".to_string())
        );
    }

    #[tokio::test(start_paused = true)]
    async fn slow_probe_times_out() {
        let probe = create_probe(&static_config(500, true));
        assert_eq!(
            check_with_timeout(probe.as_ref(), Duration::from_millis(50)).await,
            Err("timed out after 50ms".to_string())
        );
    }
}
