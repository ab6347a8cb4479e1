//! Downstream dependency probes used by the readiness check and the demo
//! endpoints that stand in for database reads.

mod base;
mod static_probe;
mod tcp_probe;

pub use base::{check_with_timeout, create_probe, DependencyProbe, ProbeConfig};
pub use static_probe::{StaticProbe, StaticProbeConfig};
pub use tcp_probe::{TcpProbe, TcpProbeConfig};
