//! A delivery gateway that writes boards to the log.
//!
//! The real chat-platform client lives outside this repository; this
//! gateway lets the server run end-to-end without one, rendering each
//! board as a structured log line.

use async_trait::async_trait;
use parlor_core::delivery::{DeliveryGateway, DeliveryOutcome};
use parlor_core::error::GameError;
use parlor_core::id::SurfaceRef;
use parlor_core::model::{Phase, Session, SessionStatus};

/// Gateway that renders boards into the tracing log.
#[derive(Debug, Default)]
pub struct LogGateway;

/// Compact one-line board rendering.
fn render(session: &Session) -> String {
    let players = session
        .active_participants()
        .map(|p| p.name.as_str())
        .collect::<Vec<_>>()
        .join(", ");
    let mut line = format!(
        "[{}] {} | players: {players}",
        session.status.as_str(),
        session.phase.as_str(),
    );
    if let Some(current) = session.current_participant()
        && session.status == SessionStatus::Running
    {
        line.push_str(&format!(" | turn: {}", current.name));
    }
    if let Some(question) = &session.last_question
        && (session.phase == Phase::Question
            || session.phase == Phase::WaitConfirm
            || session.rules.show_previous_question)
    {
        line.push_str(&format!(" | q: {}", question.text));
    }
    line
}

#[async_trait]
impl DeliveryGateway for LogGateway {
    async fn deliver(&self, session: &Session) -> DeliveryOutcome {
        tracing::info!(session = %session.id, board = %render(session), "board delivered");
        DeliveryOutcome::Success
    }

    async fn recreate_surface(&self, session: &Session) -> Result<SurfaceRef, GameError> {
        Ok(SurfaceRef(format!("log:{}", session.id)))
    }
}
