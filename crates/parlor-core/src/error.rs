//! Domain error types.

use thiserror::Error;

use crate::id::SessionId;
use crate::model::Phase;

/// Top-level domain error type.
///
/// Every variant except `Storage` is a pure rejection: the session state is
/// guaranteed unchanged when one is returned.
#[derive(Debug, Error)]
pub enum GameError {
    /// The actor is not allowed to perform this action.
    #[error("not allowed: {0}")]
    Unauthorized(&'static str),

    /// The action is not valid in the session's current phase.
    #[error("invalid phase: expected {expected}, session is in {actual}")]
    InvalidPhase {
        /// The phase the action requires.
        expected: Phase,
        /// The phase the session is actually in.
        actual: Phase,
    },

    /// A consumable ran out (no eligible question, no rerolls left).
    #[error("exhausted: {0}")]
    ResourceExhausted(&'static str),

    /// The action is turned off by a session rule flag.
    #[error("disabled by session rules: {0}")]
    ConfigDisabled(&'static str),

    /// The session has ended and accepts no further events.
    #[error("session has ended")]
    SessionEnded,

    /// No session exists for the given id.
    #[error("session not found: {0}")]
    NotFound(SessionId),

    /// A validation error in domain logic.
    #[error("validation error: {0}")]
    Validation(String),

    /// A persistence failure. The in-memory state is left unchanged and the
    /// caller may retry the event.
    #[error("storage error: {0}")]
    Storage(String),
}
