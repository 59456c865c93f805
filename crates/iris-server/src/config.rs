//! Server configuration.

use std::net::SocketAddr;

use axum::http::HeaderValue;
use tower_http::cors::{Any, CorsLayer};
use tracing::warn;

/// Default maximum request body size (1 MB).
pub const DEFAULT_MAX_PAYLOAD_SIZE: usize = 1024 * 1024;

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind the server to.
    pub bind_address: SocketAddr,

    /// CORS allowed origin; `"*"` allows any origin.
    pub cors_origin: String,

    /// Maximum request body size in bytes.
    pub max_payload_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: SocketAddr::from(([127, 0, 0, 1], 3001)),
            cors_origin: "*".to_string(),
            max_payload_size: DEFAULT_MAX_PAYLOAD_SIZE,
        }
    }
}

impl ServerConfig {
    /// Create a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the bind address.
    pub fn with_bind_address(mut self, addr: SocketAddr) -> Self {
        self.bind_address = addr;
        self
    }

    /// Set the CORS allowed origin.
    pub fn with_cors_origin(mut self, origin: impl Into<String>) -> Self {
        self.cors_origin = origin.into();
        self
    }

    /// Set the maximum request body size.
    pub fn with_max_payload_size(mut self, bytes: usize) -> Self {
        self.max_payload_size = bytes;
        self
    }

    /// Build the CORS layer for this configuration.
    pub(crate) fn cors_layer(&self) -> CorsLayer {
        let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);
        if self.cors_origin == "*" {
            return layer.allow_origin(Any);
        }
        match HeaderValue::from_str(&self.cors_origin) {
            Ok(origin) => layer.allow_origin(origin),
            Err(_) => {
                warn!(origin = %self.cors_origin, "invalid CORS origin, allowing any");
                layer.allow_origin(Any)
            }
        }
    }
}
