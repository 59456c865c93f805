//! HTTP route handlers.

mod diagnosis;
mod health;
mod sessions;

pub use diagnosis::diagnosis_handler;
pub use health::{HealthResponse, health_handler};
pub use sessions::{delete_session_handler, get_session_handler};

use axum::{Json, http::Uri};
use serde_json::{Value, json};

use crate::error::ServerError;

/// GET /: service descriptor.
pub async fn index() -> Json<Value> {
    Json(json!({
        "name": "IRIS Diagnosis API",
        "version": env!("CARGO_PKG_VERSION"),
        "description": "API for staging chronic kidney disease in cats",
        "endpoints": {
            "diagnosis": "POST /api/diagnosis",
            "health": "GET /api/health",
            "session": "GET|DELETE /api/sessions/{id}",
        },
    }))
}

/// Fallback for unknown routes.
pub async fn not_found(uri: Uri) -> ServerError {
    ServerError::NotFound(format!("no route for {}", uri.path()))
}
