//! Application state shared across handlers.

use std::sync::Arc;
use std::time::Instant;

use iris_bridge::WorkerBridge;
use iris_session::SessionStore;

use crate::config::ServerConfig;

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Bridge to the diagnosis worker.
    pub bridge: Arc<WorkerBridge>,

    /// Session store for follow-up context.
    pub sessions: SessionStore,

    /// Server configuration.
    pub config: Arc<ServerConfig>,

    /// Process start, for health-check uptime.
    pub started_at: Instant,
}

impl AppState {
    /// Create a new application state.
    pub fn new(bridge: WorkerBridge, sessions: SessionStore, config: ServerConfig) -> Self {
        Self {
            bridge: Arc::new(bridge),
            sessions,
            config: Arc::new(config),
            started_at: Instant::now(),
        }
    }
}
