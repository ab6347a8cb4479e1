//! Shared application state.
//!
//! Contains the state that is shared across all request handlers:
//! configuration, the request metrics and the dependency probe.

use crate::config::ConfigV1;
use crate::metrics::HttpMetrics;
use crate::probe::DependencyProbe;
use std::sync::Arc;

/// Application state shared across all HTTP handlers.
///
/// This state is cloned for each request handler; every field is a cheap
/// handle onto data built once at startup.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration loaded at startup.
    pub config: Arc<ConfigV1>,
    /// Request metrics and the registry they live in.
    pub metrics: HttpMetrics,
    /// Dependency checked by readiness and the user listing.
    pub probe: Arc<dyn DependencyProbe>,
}
