// This module re-exports important pieces for convenience,
// so we can "use crate::config::*" easily.
pub mod config;
pub mod demo;
pub mod logging;
pub mod metrics;
pub mod readiness;

pub use config::*;
pub use demo::*;
pub use logging::*;
pub use metrics::*;
pub use readiness::*;
