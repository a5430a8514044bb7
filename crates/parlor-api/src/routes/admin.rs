//! Administration routes: forced questions and question-bank imports.
//!
//! Authentication for these routes belongs to the deployment's ingress;
//! the handlers only validate the game-level preconditions.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use parlor_core::error::GameError;
use parlor_core::id::{SessionId, UserId};
use parlor_core::model::{Category, ForcedQuestion, Level};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ApiError;
use crate::state::AppState;

/// Request body for queueing a forced question.
#[derive(Debug, Deserialize)]
pub struct ForceQuestionRequest {
    /// The participant the override targets.
    pub target: UserId,
    /// Only consumed for picks of this category, if set.
    pub category: Option<Category>,
    /// Only consumed for picks of this level, if set.
    pub level: Option<Level>,
    /// Question text.
    pub text: String,
}

/// Request body for bulk question import.
#[derive(Debug, Deserialize)]
pub struct ImportQuestionsRequest {
    /// Category of every imported question.
    pub category: Category,
    /// Level of every imported question.
    pub level: Level,
    /// Question texts.
    pub texts: Vec<String>,
}

/// Response body for bulk question import.
#[derive(Debug, Serialize)]
pub struct ImportQuestionsResponse {
    /// Number of questions inserted.
    pub inserted: u64,
}

/// POST /api/v1/admin/sessions/{id}/forced
async fn force_question(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<ForceQuestionRequest>,
) -> Result<StatusCode, ApiError> {
    if request.text.trim().is_empty() {
        return Err(ApiError(GameError::Validation(
            "question text must not be empty".to_owned(),
        )));
    }

    let session_id = SessionId(id);
    let actives = state.store.list_active_participants(session_id).await?;
    if !actives.iter().any(|p| p.user_id == request.target) {
        return Err(ApiError(GameError::Validation(
            "target is not an active participant of this session".to_owned(),
        )));
    }

    state
        .store
        .enqueue_forced(&ForcedQuestion {
            session_id,
            target: request.target,
            category: request.category,
            level: request.level,
            text: request.text,
            enqueued_at: state.clock.now(),
        })
        .await?;
    tracing::info!(session = %session_id, target = %request.target, "forced question queued");
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/v1/admin/questions
async fn import_questions(
    State(state): State<AppState>,
    Json(request): Json<ImportQuestionsRequest>,
) -> Result<Json<ImportQuestionsResponse>, ApiError> {
    let texts: Vec<String> = request
        .texts
        .iter()
        .map(|t| t.trim())
        .filter(|t| !t.is_empty())
        .map(str::to_owned)
        .collect();
    if texts.is_empty() {
        return Err(ApiError(GameError::Validation(
            "no question texts supplied".to_owned(),
        )));
    }

    let inserted = state
        .store
        .add_questions(request.category, request.level, &texts)
        .await?;
    Ok(Json(ImportQuestionsResponse { inserted }))
}

/// Returns the router for the administration routes.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/sessions/{id}/forced", post(force_question))
        .route("/questions", post(import_questions))
}
