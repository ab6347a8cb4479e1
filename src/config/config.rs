use std::net::SocketAddr;

use figment::providers::{Env, Format, Yaml};
use figment::Figment;
use schemars::{schema_for, JsonSchema};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::demo::DemoConfig;
use super::logging::LoggingConfig;
use super::metrics::MetricsConfig;
use super::readiness::ReadinessConfig;

/// Environment variable naming the YAML file to load.
pub const CONFIG_PATH_ENV: &str = "REQMETRICS_CONFIG";
/// Prefix for environment overrides, e.g. `REQMETRICS_LOGGING__LEVEL=debug`.
pub const ENV_PREFIX: &str = "REQMETRICS_";
/// Upper bound for `demo.max_slow_delay_secs`.
pub const MAX_SLOW_DELAY_SECS: f64 = 3600.0;

/// A top-level enum for versioned configurations.
#[derive(Deserialize, Serialize, JsonSchema)]
#[serde(tag = "version")]
pub enum Config {
    #[serde(rename = "1.0.0")]
    ConfigV1(ConfigV1),
}

/// Main config for v1.0.0.
#[derive(Deserialize, Serialize, Debug, Clone, JsonSchema)]
pub struct ConfigV1 {
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
    #[serde(default)]
    pub readiness: ReadinessConfig,
    #[serde(default)]
    pub demo: DemoConfig,
}

fn default_bind_address() -> String {
    "0.0.0.0:5000".to_string()
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error(transparent)]
    Parse(#[from] figment::Error),
    #[error("invalid bind_address '{0}'")]
    BindAddress(String),
    #[error("invalid PORT '{0}'")]
    Port(String),
    #[error("metrics.max_series_per_metric must be at least 1")]
    MaxSeries,
    #[error("metrics.latency_buckets must be finite and strictly increasing")]
    LatencyBuckets,
    #[error("readiness.timeout_in_ms must be greater than zero")]
    ReadinessTimeout,
    #[error("demo.max_slow_delay_secs must be between 0 and 3600")]
    SlowDelay,
}

impl ConfigV1 {
    /// Checks values serde cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.bind_address
            .parse::<SocketAddr>()
            .map_err(|_| ConfigError::BindAddress(self.bind_address.clone()))?;

        if self.metrics.max_series_per_metric == 0 {
            return Err(ConfigError::MaxSeries);
        }
        let buckets = &self.metrics.latency_buckets;
        if buckets.is_empty()
            || buckets.iter().any(|b| !b.is_finite())
            || buckets.windows(2).any(|w| w[0] >= w[1])
        {
            return Err(ConfigError::LatencyBuckets);
        }
        if self.readiness.timeout_in_ms == 0 {
            return Err(ConfigError::ReadinessTimeout);
        }
        let delay = self.demo.max_slow_delay_secs;
        if !(0.0..=MAX_SLOW_DELAY_SECS).contains(&delay) {
            return Err(ConfigError::SlowDelay);
        }
        Ok(())
    }

    /// Replaces the port of `bind_address`, as set by a `PORT` variable.
    pub fn apply_port_override(&mut self, port: &str) -> Result<(), ConfigError> {
        let port: u16 = port
            .trim()
            .parse()
            .map_err(|_| ConfigError::Port(port.to_string()))?;
        let mut addr: SocketAddr = self
            .bind_address
            .parse()
            .map_err(|_| ConfigError::BindAddress(self.bind_address.clone()))?;
        addr.set_port(port);
        self.bind_address = addr.to_string();
        Ok(())
    }
}

/// Extracts and validates a configuration from any figment.
pub fn load_config_from(figment: Figment) -> Result<ConfigV1, ConfigError> {
    let config = match figment.extract::<Config>()? {
        Config::ConfigV1(c) => c,
    };
    config.validate()?;
    Ok(config)
}

/// Load config from the YAML file (default "./config.yaml", or the path in
/// `REQMETRICS_CONFIG`) merged with `REQMETRICS_` environment variables, then
/// apply `PORT`.
pub fn load_config() -> Result<ConfigV1, ConfigError> {
    let path = std::env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| "./config.yaml".to_string());
    let figment = Figment::new().merge(Yaml::file(&path)).merge(
        Env::prefixed(ENV_PREFIX)
            .ignore(&["config"])
            .split("__"),
    );

    let mut config = load_config_from(figment)?;
    if let Ok(port) = std::env::var("PORT") {
        config.apply_port_override(&port)?;
    }
    Ok(config)
}

/// Print the JSON schema for the configuration to stdout.
pub fn print_schema() -> Result<(), serde_json::Error> {
    let schema = schema_for!(Config);
    println!("{}", serde_json::to_string_pretty(&schema)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::probe::ProbeConfig;

    fn parse(yaml: &str) -> Result<ConfigV1, ConfigError> {
        load_config_from(Figment::new().merge(Yaml::string(yaml)))
    }

    #[test]
    fn minimal_config_uses_defaults() {
        let config = parse("version: \"1.0.0\"\n").unwrap();
        assert_eq!(config.bind_address, "0.0.0.0:5000");
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.metrics.namespace, "app");
        assert_eq!(
            config.metrics.latency_buckets,
            vec![0.01, 0.05, 0.1, 0.5, 1.0, 2.0, 5.0]
        );
        assert_eq!(config.readiness.timeout_in_ms, 1000);
        assert!(matches!(config.readiness.probe, ProbeConfig::Static(_)));
        assert_eq!(config.demo.users.len(), 2);
        assert_eq!(config.demo.max_slow_delay_secs, 5.0);
    }

    #[test]
    fn full_config_parses() {
        let config = parse(
            r#"
version: "1.0.0"
bind_address: 127.0.0.1:8080
logging:
  level: debug
  format: json
metrics:
  namespace: shop
  latency_buckets: [0.1, 0.5, 1.0]
  max_series_per_metric: 50
readiness:
  timeout_in_ms: 250
  probe:
    type: tcp
    address: db.internal:5432
demo:
  max_slow_delay_secs: 2
  users:
    - id: 7
      name: Carol
      email: carol@example.com
"#,
        )
        .unwrap();

        assert_eq!(config.bind_address, "127.0.0.1:8080");
        assert_eq!(config.logging.format, "json");
        assert_eq!(config.metrics.max_series_per_metric, 50);
        match &config.readiness.probe {
            ProbeConfig::Tcp(tcp) => assert_eq!(tcp.address, "db.internal:5432"),
            other => panic!("expected tcp probe, got {:?}", other),
        }
        assert_eq!(config.demo.users[0].name, "Carol");
    }

    #[test]
    fn unknown_version_is_rejected() {
        assert!(matches!(
            parse("version: \"2.0.0\"\n"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn invalid_values_are_rejected() {
        assert!(matches!(
            parse("version: \"1.0.0\"\nbind_address: nowhere\n"),
            Err(ConfigError::BindAddress(_))
        ));
        assert!(matches!(
            parse("version: \"1.0.0\"\nmetrics:\n  latency_buckets: [1.0, 0.5]\n"),
            Err(ConfigError::LatencyBuckets)
        ));
        assert!(matches!(
            parse("version: \"1.0.0\"\nmetrics:\n  max_series_per_metric: 0\n"),
            Err(ConfigError::MaxSeries)
        ));
        assert!(matches!(
            parse("version: \"1.0.0\"\nreadiness:\n  timeout_in_ms: 0\n"),
            Err(ConfigError::ReadinessTimeout)
        ));
        assert!(matches!(
            parse("version: \"1.0.0\"\ndemo:\n  max_slow_delay_secs: -1\n"),
            Err(ConfigError::SlowDelay)
        ));
        assert!(matches!(
            parse("version: \"1.0.0\"\ndemo:\n  max_slow_delay_secs: 1e30\n"),
            Err(ConfigError::SlowDelay)
        ));
        assert!(parse("version: \"1.0.0\"\ndemo:\n  max_slow_delay_secs: 3600\n").is_ok());
    }

    #[test]
    fn port_override_replaces_only_the_port() {
        let mut config = parse("version: \"1.0.0\"\nbind_address: 127.0.0.1:5000\n").unwrap();
        config.apply_port_override("9090").unwrap();
        assert_eq!(config.bind_address, "127.0.0.1:9090");
        assert!(matches!(
            config.apply_port_override("http"),
            Err(ConfigError::Port(_))
        ));
    }

    fn load_in_jail() -> Result<ConfigV1, figment::Error> {
        load_config().map_err(|e| figment::Error::from(e.to_string()))
    }

    #[test]
    fn env_variables_override_the_file() {
        figment::Jail::expect_with(|jail| {
            jail.create_file(
                "config.yaml",
                r#"
version: "1.0.0"
bind_address: 127.0.0.1:5000
logging:
  level: info
metrics:
  namespace: file
"#,
            )?;
            jail.set_env("REQMETRICS_LOGGING__LEVEL", "debug");
            jail.set_env("REQMETRICS_METRICS__MAX_SERIES_PER_METRIC", "25");

            let config = load_in_jail()?;
            assert_eq!(config.logging.level, "debug");
            assert_eq!(config.metrics.namespace, "file");
            assert_eq!(config.metrics.max_series_per_metric, 25);
            assert_eq!(config.bind_address, "127.0.0.1:5000");
            Ok(())
        });
    }

    #[test]
    fn config_path_comes_from_env() {
        figment::Jail::expect_with(|jail| {
            jail.create_file("config.yaml", "version: \"1.0.0\"\nmetrics:\n  namespace: default\n")?;
            jail.create_file("other.yaml", "version: \"1.0.0\"\nmetrics:\n  namespace: other\n")?;
            jail.set_env(CONFIG_PATH_ENV, "other.yaml");

            let config = load_in_jail()?;
            assert_eq!(config.metrics.namespace, "other");
            Ok(())
        });
    }

    #[test]
    fn port_variable_is_applied_after_merging() {
        figment::Jail::expect_with(|jail| {
            jail.create_file("config.yaml", "version: \"1.0.0\"\nbind_address: 127.0.0.1:5000\n")?;
            jail.set_env("PORT", "9191");
            assert_eq!(load_in_jail()?.bind_address, "127.0.0.1:9191");

            jail.set_env("PORT", "not-a-port");
            assert!(matches!(load_config(), Err(ConfigError::Port(_))));
            Ok(())
        });
    }

    #[test]
    fn invalid_env_value_is_an_error() {
        figment::Jail::expect_with(|jail| {
            jail.create_file("config.yaml", "version: \"1.0.0\"\n")?;
            jail.set_env("REQMETRICS_DEMO__MAX_SLOW_DELAY_SECS", "7200");
            assert!(matches!(load_config(), Err(ConfigError::SlowDelay)));
            Ok(())
        });
    }
}
