//! Session inspection and removal endpoints.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};

use iris_session::Session;

use crate::error::{Result, ServerError};
use crate::state::AppState;

/// GET /api/sessions/{id}: read a live session.
pub async fn get_session_handler(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<Json<Session>> {
    state
        .sessions
        .snapshot(&session_id)
        .map(Json)
        .ok_or_else(|| ServerError::NotFound(format!("session {session_id} not found")))
}

/// DELETE /api/sessions/{id}: drop a session.
pub async fn delete_session_handler(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<StatusCode> {
    if state.sessions.clear(&session_id) {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ServerError::NotFound(format!(
            "session {session_id} not found"
        )))
    }
}
