//! Application state shared across all handlers.

use std::sync::Arc;
use std::time::Instant;

use gbphub_core::config::AppConfig;
use gbphub_worker::BatchRegistry;

/// Application state containing all shared dependencies.
///
/// Passed to every Axum handler via `State<AppState>`.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Application configuration
    pub config: Arc<AppConfig>,
    /// Batch runners by workload
    pub registry: Arc<BatchRegistry>,
    /// When the process started serving
    pub started_at: Instant,
}

impl AppState {
    /// Create the state.
    pub fn new(config: Arc<AppConfig>, registry: Arc<BatchRegistry>) -> Self {
        Self {
            config,
            registry,
            started_at: Instant::now(),
        }
    }
}
