//! Health check endpoint.

use axum::{Json, extract::State};
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::state::AppState;

/// Health check response.
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub success: bool,
    /// Service status.
    pub status: String,
    /// Service version.
    pub version: String,
    /// Current time (ISO 8601).
    pub timestamp: String,
    /// Seconds since the server started.
    pub uptime_secs: u64,
}

/// GET /api/health: liveness check.
pub async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        success: true,
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: Utc::now().to_rfc3339(),
        uptime_secs: state.started_at.elapsed().as_secs(),
    })
}
