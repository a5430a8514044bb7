//! Session lifecycle and event routes.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use parlor_core::error::GameError;
use parlor_core::event::SessionEvent;
use parlor_core::id::{SessionId, UserId};
use parlor_core::model::{
    AskedQuestion, Participant, Phase, Session, SessionKind, SessionRules, SessionStatus,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ApiError;
use crate::state::AppState;

/// Request body for creating a session.
#[derive(Debug, Deserialize)]
pub struct CreateSessionRequest {
    /// Group-hosted or two-party inline.
    pub kind: SessionKind,
    /// The creating user, who becomes the owner and first participant.
    pub owner: UserId,
    /// Owner display name.
    pub owner_name: String,
}

/// Read-only view of one participant.
#[derive(Debug, Serialize)]
pub struct ParticipantView {
    /// Chat-surface account id.
    pub user_id: UserId,
    /// Display name.
    pub name: String,
    /// Rerolls remaining.
    pub rerolls_left: u32,
    /// Turns skipped.
    pub skips: u32,
    /// Penalties collected.
    pub penalties: u32,
    /// Turns taken.
    pub turns: u32,
    /// Whether the participant is in the turn rotation.
    pub active: bool,
}

impl From<&Participant> for ParticipantView {
    fn from(p: &Participant) -> Self {
        Self {
            user_id: p.user_id,
            name: p.name.clone(),
            rerolls_left: p.rerolls_left,
            skips: p.skips,
            penalties: p.penalties,
            turns: p.turns,
            active: p.active,
        }
    }
}

/// Read-only view of a session returned by every session route.
#[derive(Debug, Serialize)]
pub struct SessionView {
    /// Session identifier.
    pub id: SessionId,
    /// Group-hosted or two-party inline.
    pub kind: SessionKind,
    /// Lifecycle status.
    pub status: SessionStatus,
    /// Sub-state of a running session.
    pub phase: Phase,
    /// Session owner.
    pub owner: UserId,
    /// Whose turn it is, if the session has active participants.
    pub current_participant: Option<UserId>,
    /// All participants in join order.
    pub participants: Vec<ParticipantView>,
    /// The question on the board. Outside the question phases it is only
    /// included when the session shows previous questions.
    pub last_question: Option<AskedQuestion>,
    /// Owner-togglable rule flags.
    pub rules: SessionRules,
}

impl From<&Session> for SessionView {
    fn from(session: &Session) -> Self {
        let in_question = session.phase == Phase::Question || session.phase == Phase::WaitConfirm;
        let last_question = if in_question || session.rules.show_previous_question {
            session.last_question.clone()
        } else {
            None
        };
        Self {
            id: session.id,
            kind: session.kind,
            status: session.status,
            phase: session.phase,
            owner: session.owner,
            current_participant: session.current_participant().map(|p| p.user_id),
            participants: session.participants.iter().map(Into::into).collect(),
            last_question,
            rules: session.rules,
        }
    }
}

/// POST /api/v1/sessions
async fn create_session(
    State(state): State<AppState>,
    Json(request): Json<CreateSessionRequest>,
) -> Result<(StatusCode, Json<SessionView>), ApiError> {
    let session = state
        .registry
        .create_session(request.kind, request.owner, &request.owner_name)
        .await?;
    Ok((StatusCode::CREATED, Json(SessionView::from(&session))))
}

/// GET /api/v1/sessions/{id}
async fn get_session(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionView>, ApiError> {
    let session = state.registry.snapshot(SessionId(id)).await?;
    Ok(Json(SessionView::from(&session)))
}

/// POST /api/v1/sessions/{id}/events
async fn post_event(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(event): Json<SessionEvent>,
) -> Result<Json<SessionView>, ApiError> {
    if matches!(event, SessionEvent::Timeout { .. }) {
        // Timer expiries are produced by the scheduler, never accepted
        // from the outside.
        return Err(ApiError(GameError::Validation(
            "timeout events are internal".to_owned(),
        )));
    }
    let session = state.registry.dispatch(SessionId(id), event).await?;
    Ok(Json(SessionView::from(&session)))
}

/// Returns the router for the session routes.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(create_session))
        .route("/{id}", get(get_session))
        .route("/{id}/events", post(post_event))
}
