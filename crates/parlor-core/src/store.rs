//! Durable store seams.
//!
//! The coordinator is the only writer for a given session; the question
//! bank and forced-question queue are written by the administration path
//! and only read (or consumed) here.

use async_trait::async_trait;

use crate::error::GameError;
use crate::id::{SessionId, SurfaceRef, UserId};
use crate::model::{ActionRecord, ActionStatus, Category, ForcedQuestion, Level, Participant,
                   Session};

/// Durable access to session, participant, and action records.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Loads a full session snapshot (participants included), or `None` if
    /// no such session exists.
    async fn load_session(&self, id: SessionId) -> Result<Option<Session>, GameError>;

    /// Persists the session's own fields as one typed write. Participant
    /// rows go through `upsert_participant`; the coordinator writes only
    /// the participants an event actually touched.
    async fn save_session(&self, session: &Session) -> Result<(), GameError>;

    /// Active participants of a session in turn order.
    async fn list_active_participants(
        &self,
        session_id: SessionId,
    ) -> Result<Vec<Participant>, GameError>;

    /// Inserts or updates a single participant row.
    async fn upsert_participant(
        &self,
        session_id: SessionId,
        participant: &Participant,
    ) -> Result<(), GameError>;

    /// Appends an immutable action-log entry.
    async fn append_action(&self, action: &ActionRecord) -> Result<(), GameError>;

    /// The most recent action-log entry for a session, if any.
    async fn last_action(&self, session_id: SessionId)
    -> Result<Option<ActionRecord>, GameError>;

    /// Updates the status of the most recent action-log entry.
    async fn update_last_action_status(
        &self,
        session_id: SessionId,
        status: ActionStatus,
    ) -> Result<(), GameError>;

    /// Records a replacement board surface after the gateway recreated it.
    async fn update_surface(
        &self,
        session_id: SessionId,
        surface: &SurfaceRef,
    ) -> Result<(), GameError>;
}

/// Read/consume access to the question bank and forced-question queue.
#[async_trait]
pub trait QuestionBank: Send + Sync {
    /// A uniformly random enabled question of the given category and level,
    /// or `None` if the bank has no eligible row.
    async fn pick_random_eligible(
        &self,
        category: Category,
        level: Level,
    ) -> Result<Option<String>, GameError>;

    /// Queues an override question for a participant.
    async fn enqueue_forced(&self, forced: &ForcedQuestion) -> Result<(), GameError>;

    /// Consumes the oldest queued override matching the participant and
    /// filters. The row is deleted in the same operation, so an override is
    /// served at most once.
    async fn pop_forced(
        &self,
        session_id: SessionId,
        target: UserId,
        category: Category,
        level: Level,
    ) -> Result<Option<String>, GameError>;

    /// Bulk-imports questions into the bank. Returns the number inserted.
    async fn add_questions(
        &self,
        category: Category,
        level: Level,
        texts: &[String],
    ) -> Result<u64, GameError>;
}

/// Both store seams behind one object, for components that need session
/// persistence and question access together.
pub trait Store: SessionStore + QuestionBank {}

impl<T: SessionStore + QuestionBank> Store for T {}
