//! Side effects produced by transitions.

use parlor_core::id::UserId;
use parlor_core::model::{ActionRecord, ActionStatus};

/// An instruction the coordinator carries out after committing a
/// transition. The engine only describes effects; it never performs them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Arm (or re-arm) the session's turn timer for a participant. Arming
    /// always cancels the previously armed timer first.
    ArmTimer {
        /// The participant whose turn the timer guards.
        participant: UserId,
    },
    /// Cancel the armed turn timer, if any.
    CancelTimer,
    /// Append an entry to the action log.
    Record(ActionRecord),
    /// Update the status of the most recent action-log entry.
    UpdateLastAction(ActionStatus),
}
