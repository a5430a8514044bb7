//! Inbound session events.
//!
//! Everything that can mutate a session — button actions, admin injections,
//! timer expiries — arrives as one of these and goes through the same
//! per-session serialization.

use serde::{Deserialize, Serialize};

use crate::id::UserId;

/// Category choice on a pick. `Any` resolves uniformly at pick time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CategoryChoice {
    /// Truth.
    Truth,
    /// Dare.
    Dare,
    /// Let the dice decide.
    Any,
}

/// Level choice on a pick. `Any` resolves uniformly at pick time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LevelChoice {
    /// Normal level.
    Normal,
    /// Mature level.
    Mature,
    /// Let the dice decide.
    Any,
}

/// One of the three owner-togglable rule flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleToggle {
    /// Toggle `allow_mid_join`.
    MidJoin,
    /// Toggle `show_previous_question`.
    ShowPreviousQuestion,
    /// Toggle `allow_mature`.
    MatureContent,
}

/// An event routed into a session coordinator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionEvent {
    /// A user joins (or re-joins) the session.
    Join {
        /// Joining user.
        actor: UserId,
        /// Display name at join time.
        name: String,
    },
    /// A participant leaves the rotation (soft removal).
    Leave {
        /// Leaving user.
        actor: UserId,
    },
    /// The owner starts the game.
    Start {
        /// Issuing user.
        actor: UserId,
    },
    /// The current participant picks a category and level.
    Pick {
        /// Issuing user.
        actor: UserId,
        /// Category choice.
        category: CategoryChoice,
        /// Level choice.
        level: LevelChoice,
    },
    /// The current participant spends a reroll to pick again.
    Reroll {
        /// Issuing user.
        actor: UserId,
    },
    /// The current participant's turn is skipped.
    Skip {
        /// Issuing user.
        actor: UserId,
    },
    /// The current participant reports the question as done.
    Done {
        /// Issuing user.
        actor: UserId,
    },
    /// The current participant refuses the question.
    Refuse {
        /// Issuing user.
        actor: UserId,
    },
    /// The counterpart confirms or rejects a claimed completion.
    Confirm {
        /// Issuing user.
        actor: UserId,
        /// `true` to confirm, `false` to reject.
        accepted: bool,
    },
    /// The turn timer expired for a participant. Internal: emitted only by
    /// the timer scheduler, never accepted from the outside.
    Timeout {
        /// The participant whose timer was armed.
        participant: UserId,
    },
    /// The owner toggles a rule flag.
    Configure {
        /// Issuing user.
        actor: UserId,
        /// Which flag to toggle.
        toggle: RuleToggle,
    },
    /// The owner ends the session.
    End {
        /// Issuing user.
        actor: UserId,
    },
}

impl SessionEvent {
    /// Short name for logging.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Join { .. } => "join",
            Self::Leave { .. } => "leave",
            Self::Start { .. } => "start",
            Self::Pick { .. } => "pick",
            Self::Reroll { .. } => "reroll",
            Self::Skip { .. } => "skip",
            Self::Done { .. } => "done",
            Self::Refuse { .. } => "refuse",
            Self::Confirm { .. } => "confirm",
            Self::Timeout { .. } => "timeout",
            Self::Configure { .. } => "configure",
            Self::End { .. } => "end",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_json_shape() {
        let event: SessionEvent = serde_json::from_value(serde_json::json!({
            "type": "pick",
            "actor": 7,
            "category": "any",
            "level": "normal",
        }))
        .unwrap();

        assert_eq!(
            event,
            SessionEvent::Pick {
                actor: UserId(7),
                category: CategoryChoice::Any,
                level: LevelChoice::Normal,
            }
        );
    }

    #[test]
    fn test_confirm_event_round_trips() {
        let event = SessionEvent::Confirm {
            actor: UserId(42),
            accepted: false,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "confirm");
        assert_eq!(serde_json::from_value::<SessionEvent>(json).unwrap(), event);
    }
}
