use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::errors::AppError;
use crate::services::conversation;
use crate::services::session::SessionStep;
use crate::state::AppState;

#[derive(Deserialize, Default)]
pub struct StartSessionRequest {
    pub session_id: Option<String>,
}

#[derive(Serialize)]
pub struct SessionResponse {
    pub session_id: String,
    pub reply: String,
    pub step: SessionStep,
}

// POST /api/sessions
pub async fn start_session(
    State(state): State<Arc<AppState>>,
    body: Option<Json<StartSessionRequest>>,
) -> (StatusCode, Json<SessionResponse>) {
    let requested = body.and_then(|Json(b)| b.session_id);
    let session_id = requested
        .map(|id| id.trim().to_string())
        .filter(|id| !id.is_empty())
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

    let reply = conversation::start_session(&state, &session_id);
    (
        StatusCode::CREATED,
        Json(SessionResponse {
            session_id,
            reply,
            step: SessionStep::PatientIntake,
        }),
    )
}

#[derive(Deserialize)]
pub struct TurnRequest {
    pub message: Option<String>,
}

// POST /api/sessions/:id/turn
pub async fn send_turn(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
    Json(body): Json<TurnRequest>,
) -> Result<Json<SessionResponse>, AppError> {
    let turn = conversation::process_turn(&state, &session_id, body.message.as_deref()).await?;
    Ok(Json(SessionResponse {
        session_id,
        reply: turn.reply,
        step: turn.step,
    }))
}
