//! The diagnosis endpoint: validate, thread the session, call the worker.

use std::time::Instant;

use axum::{Json, extract::State};
use serde_json::{Value, json};
use tracing::info;

use iris_session::{Role, SessionPatch};

use crate::error::{Result, ServerError};
use crate::state::AppState;
use crate::validate::{self, DiagnosisRequest};

/// POST /api/diagnosis: run one diagnosis through the worker.
///
/// The reply is the worker's own payload with `metadata.total_time_ms` and
/// the (new or resumed) `session_id` added.
pub async fn diagnosis_handler(
    State(state): State<AppState>,
    Json(mut request): Json<DiagnosisRequest>,
) -> Result<Json<Value>> {
    let started = Instant::now();
    validate::validate(&mut request).map_err(ServerError::Validation)?;

    info!(
        sdma = ?request.formulario.sdma,
        creatinina = ?request.formulario.creatinina,
        has_question = !request.texto_livre.is_empty(),
        resumed = request.session_id.is_some(),
        "diagnosis request"
    );

    let session = state.sessions.get_or_create(request.session_id.as_deref());
    if !request.texto_livre.is_empty() {
        state
            .sessions
            .add_message(&session.id, Role::User, request.texto_livre.clone());
    }

    let reply = state
        .bridge
        .execute(&json!({
            "formulario": &request.formulario,
            "texto_livre": &request.texto_livre,
        }))
        .await?;

    // Record the exchange on the session for follow-ups.
    if let Some(answer) = reply.payload.get("resposta_completa").and_then(Value::as_str) {
        state
            .sessions
            .add_message(&session.id, Role::Assistant, answer.to_string());
    }
    state.sessions.update(
        &session.id,
        SessionPatch::new()
            .with_clinical_context(json!(request.formulario))
            .with_last_result(reply.payload.clone()),
    );

    let mut body = reply.payload;
    if let Some(object) = body.as_object_mut() {
        if let Some(metadata) = object.get_mut("metadata").and_then(Value::as_object_mut) {
            metadata.insert(
                "total_time_ms".to_string(),
                json!(started.elapsed().as_millis() as u64),
            );
        }
        object.insert("session_id".to_string(), json!(session.id));
    }

    info!(
        session_id = %session.id,
        total_ms = started.elapsed().as_millis() as u64,
        "diagnosis complete"
    );
    Ok(Json(body))
}
