//! HTTP API for the IRIS diagnosis service.
//!
//! Thin orchestration layer over [`iris_bridge`] and [`iris_session`]:
//! validates request bodies, threads the conversational session through
//! the store, runs one worker exchange per request, and maps bridge
//! failures onto HTTP statuses.
//!
//! # Example
//!
//! ```ignore
//! use iris_bridge::{WorkerBridge, WorkerConfig};
//! use iris_session::{SessionStore, StoreConfig};
//! use iris_server::{Server, ServerConfig};
//!
//! let bridge = WorkerBridge::new(WorkerConfig::default());
//! let sessions = SessionStore::new(StoreConfig::default());
//! let server = Server::new(bridge, sessions, ServerConfig::default());
//! server.run().await?;
//! ```

pub mod config;
pub mod error;
pub mod routes;
pub mod state;
pub mod validate;

pub use config::ServerConfig;
pub use error::{ErrorResponse, FieldError, Result, ServerError};
pub use state::AppState;
pub use validate::{ClinicalForm, DiagnosisRequest};

use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{get, post},
};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::info;

use iris_bridge::WorkerBridge;
use iris_session::SessionStore;

/// The IRIS diagnosis HTTP server.
pub struct Server {
    state: AppState,
}

impl Server {
    /// Create a new server.
    pub fn new(bridge: WorkerBridge, sessions: SessionStore, config: ServerConfig) -> Self {
        Self {
            state: AppState::new(bridge, sessions, config),
        }
    }

    /// Create a server from a pre-built application state.
    pub fn from_state(state: AppState) -> Self {
        Self { state }
    }

    /// Build the router with all routes and middleware.
    pub fn router(&self) -> Router {
        Router::new()
            .route("/", get(routes::index))
            .nest("/api", self.api_routes())
            .fallback(routes::not_found)
            .layer(TraceLayer::new_for_http())
            .layer(self.state.config.cors_layer())
            .layer(DefaultBodyLimit::max(self.state.config.max_payload_size))
            .with_state(self.state.clone())
    }

    fn api_routes(&self) -> Router<AppState> {
        Router::new()
            .route("/diagnosis", post(routes::diagnosis_handler))
            .route("/health", get(routes::health_handler))
            .route(
                "/sessions/{id}",
                get(routes::get_session_handler).delete(routes::delete_session_handler),
            )
    }

    /// Run the server on the configured bind address.
    pub async fn run(self) -> Result<()> {
        let addr = self.state.config.bind_address;
        let router = self.router();

        info!(%addr, "starting server");

        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| ServerError::Internal(format!("failed to bind {addr}: {e}")))?;

        axum::serve(listener, router)
            .await
            .map_err(|e| ServerError::Internal(format!("server error: {e}")))?;

        Ok(())
    }
}
