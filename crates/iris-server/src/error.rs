//! Error types for the server.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use iris_bridge::{BridgeError, ErrorKind};

/// A single field-level validation failure.
#[derive(Debug, Clone, Serialize)]
pub struct FieldError {
    /// Dotted path of the offending field.
    pub field: String,
    /// Human-readable message.
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Server error type.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Request body failed validation.
    #[error("invalid request body")]
    Validation(Vec<FieldError>),

    /// Resource not found.
    #[error("not found: {0}")]
    NotFound(String),

    /// Worker bridge failure.
    #[error(transparent)]
    Bridge(#[from] BridgeError),

    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),
}

/// Result type for server operations.
pub type Result<T> = std::result::Result<T, ServerError>;

/// Error response body.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Always `false`.
    pub success: bool,
    /// Human-readable error message.
    pub error: String,
    /// Stable code for programmatic handling.
    pub code: String,
    /// Structured diagnostics, when available.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let (status, code, details) = match &self {
            ServerError::Validation(errors) => (
                StatusCode::BAD_REQUEST,
                "VALIDATION_ERROR",
                Some(serde_json::json!(errors)),
            ),
            ServerError::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND", None),
            ServerError::Bridge(err) => {
                // Timeout means "no definitive answer in time", which maps
                // to a gateway timeout; every other kind is an upstream
                // failure.
                let status = match err.kind() {
                    ErrorKind::Timeout => StatusCode::GATEWAY_TIMEOUT,
                    _ => StatusCode::INTERNAL_SERVER_ERROR,
                };
                (status, err.code(), Some(err.details()))
            }
            ServerError::Internal(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", None)
            }
        };

        let message = self.to_string();
        match &self {
            ServerError::Validation(_) | ServerError::NotFound(_) => {
                tracing::warn!(status = %status, code, error = %message, "client error");
            }
            _ => {
                tracing::error!(status = %status, code, error = %message, "request failed");
            }
        }

        let body = ErrorResponse {
            success: false,
            error: message,
            code: code.to_string(),
            details,
        };

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_timeout_maps_to_gateway_timeout() {
        let err = ServerError::Bridge(BridgeError::Timeout {
            timeout: Duration::from_millis(60_000),
            elapsed: Duration::from_millis(60_004),
        });
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::GATEWAY_TIMEOUT);
    }

    #[test]
    fn test_other_bridge_errors_map_to_internal() {
        let err = ServerError::Bridge(BridgeError::InputWrite {
            source: std::io::Error::new(std::io::ErrorKind::BrokenPipe, "pipe"),
        });
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_validation_maps_to_bad_request() {
        let err = ServerError::Validation(vec![FieldError::new(
            "formulario",
            "either sdma or creatinina is required",
        )]);
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
