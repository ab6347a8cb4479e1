use async_trait::async_trait;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tokio::net::TcpStream;
use tracing::debug;

use super::DependencyProbe;

/// A probe that succeeds when a TCP connection to `address` can be opened.
#[derive(Deserialize, Serialize, Debug, Clone, JsonSchema)]
pub struct TcpProbeConfig {
    #[serde(default = "default_name")]
    pub name: String,
    /// `host:port` of the dependency.
    pub address: String,
}

fn default_name() -> String {
    "database".to_string()
}

pub struct TcpProbe {
    config: TcpProbeConfig,
}

impl TcpProbe {
    pub fn new(config: &TcpProbeConfig) -> Self {
        Self {
            config: config.clone(),
        }
    }
}

#[async_trait]
impl DependencyProbe for TcpProbe {
    fn get_name(&self) -> &str {
        &self.config.name
    }

    fn get_type(&self) -> &str {
        "tcp"
    }

    async fn check(&self) -> Result<(), String> {
        debug!("Connecting to {} for probe '{}'", self.config.address, self.config.name);
        TcpStream::connect(&self.config.address)
            .await
            .map(|_| ())
            .map_err(|e| format!("cannot reach {}: {}", self.config.address, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    fn probe_for(address: String) -> TcpProbe {
        TcpProbe::new(&TcpProbeConfig {
            name: "database".to_string(),
            address,
        })
    }

    #[tokio::test]
    async fn connects_to_listening_socket() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap().to_string();

        assert!(probe_for(address).check().await.is_ok());
    }

    #[tokio::test]
    async fn fails_when_nothing_listens() {
        // Bind then drop to get a port that is very likely closed.
        let address = {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            listener.local_addr().unwrap().to_string()
        };

        let err = probe_for(address.clone()).check().await.unwrap_err();
        assert!(err.starts_with(&format!("cannot reach {}", address)));
    }
}
