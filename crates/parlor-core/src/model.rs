//! Data model for sessions, participants, and the question bank.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::id::{SessionId, SurfaceRef, UserId};

/// How the session was created: in a group chat, or inline between two
/// parties in a private chat.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionKind {
    /// Hosted in a group chat, any number of participants.
    Group,
    /// Spawned inline inside a two-party chat.
    Inline,
}

/// Lifecycle status of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    /// Gathering participants; the game has not started.
    Lobby,
    /// The game is in progress.
    Running,
    /// Terminal. No further events are accepted.
    Ended,
}

/// Sub-state of a running session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// Not started yet.
    Lobby,
    /// The current participant picks a category and level.
    Choose,
    /// A question is on the board, awaiting done/refuse.
    Question,
    /// Two-participant game: the counterpart confirms or rejects.
    WaitConfirm,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Lobby => "lobby",
            Self::Choose => "choose",
            Self::Question => "question",
            Self::WaitConfirm => "wait_confirm",
        })
    }
}

/// Question category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    /// Answer a question truthfully.
    Truth,
    /// Perform a dare.
    Dare,
}

/// Question intensity level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Level {
    /// Safe for any audience.
    Normal,
    /// Adults-only; gated by the `allow_mature` session rule.
    Mature,
}

/// What kind of entry an action-log row records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionCategory {
    /// A truth question was asked.
    Truth,
    /// A dare was asked.
    Dare,
    /// The current participant refused their question.
    Refuse,
    /// The counterpart rejected a claimed completion.
    Reject,
    /// The turn timer expired.
    Timeout,
}

impl From<Category> for ActionCategory {
    fn from(category: Category) -> Self {
        match category {
            Category::Truth => Self::Truth,
            Category::Dare => Self::Dare,
        }
    }
}

/// Status of an action-log entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionStatus {
    /// Question asked, outcome pending.
    Asked,
    /// Claimed done, awaiting counterpart confirmation.
    DonePending,
    /// Completed (self-reported or confirmed).
    Confirmed,
    /// The counterpart rejected the claim.
    Rejected,
    /// The participant refused.
    Refused,
    /// The turn timer expired.
    TimedOut,
}

/// The question currently (or most recently) on the board.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AskedQuestion {
    /// Question text.
    pub text: String,
    /// Category it was asked under.
    pub category: Category,
    /// Level it was asked under.
    pub level: Level,
    /// Participant it was asked of.
    pub asked_by: UserId,
}

/// Per-session rule flags, togglable by the owner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionRules {
    /// Whether new participants may join a running game.
    pub allow_mid_join: bool,
    /// Whether the previous question is shown on the board.
    pub show_previous_question: bool,
    /// Whether mature-level questions may be picked.
    pub allow_mature: bool,
}

impl Default for SessionRules {
    fn default() -> Self {
        Self {
            allow_mid_join: true,
            show_previous_question: true,
            allow_mature: true,
        }
    }
}

/// One participant of one session.
///
/// Participants are never deleted: leaving clears `active`, which removes
/// them from the turn rotation while preserving their statistics and the
/// (session, user) uniqueness.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participant {
    /// Chat-surface account id.
    pub user_id: UserId,
    /// Display name at join time.
    pub name: String,
    /// Join timestamp; ascending join order defines turn order.
    pub joined_at: DateTime<Utc>,
    /// Rerolls remaining. Only ever decremented.
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

impl Participant {
    /// Creates a fresh, active participant with a full reroll budget.
    #[must_use]
    pub fn new(user_id: UserId, name: String, joined_at: DateTime<Utc>, rerolls: u32) -> Self {
        Self {
            user_id,
            name,
            joined_at,
            rerolls_left: rerolls,
            skips: 0,
            penalties: 0,
            turns: 0,
            active: true,
        }
    }
}

/// One game session: the aggregate the coordinator owns and serializes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    /// Session identifier.
    pub id: SessionId,
    /// Group-hosted or two-party inline.
    pub kind: SessionKind,
    /// Lifecycle status.
    pub status: SessionStatus,
    /// The user who created the session.
    pub owner: UserId,
    /// All participants in join order, inactive ones included.
    pub participants: Vec<Participant>,
    /// Turn cursor. Always interpreted modulo the count of active
    /// participants at resolution time, never as an absolute index.
    pub turn_index: usize,
    /// Sub-state of a running session.
    pub phase: Phase,
    /// Owner-togglable rule flags.
    pub rules: SessionRules,
    /// Last question put on the board, if any.
    pub last_question: Option<AskedQuestion>,
    /// Board surface handle, owned by the delivery gateway.
    pub surface: Option<SurfaceRef>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

impl Session {
    /// Creates a lobby session with no participants.
    #[must_use]
    pub fn new(id: SessionId, kind: SessionKind, owner: UserId, created_at: DateTime<Utc>) -> Self {
        Self {
            id,
            kind,
            status: SessionStatus::Lobby,
            owner,
            participants: Vec::new(),
            turn_index: 0,
            phase: Phase::Lobby,
            rules: SessionRules::default(),
            last_question: None,
            surface: None,
            created_at,
        }
    }

    /// Active participants in turn order.
    pub fn active_participants(&self) -> impl Iterator<Item = &Participant> {
        self.participants.iter().filter(|p| p.active)
    }

    /// Number of active participants.
    #[must_use]
    pub fn active_count(&self) -> usize {
        self.active_participants().count()
    }

    /// The participant whose turn it is, if any.
    ///
    /// Resolved as `turn_index % active_count` over the active list, so a
    /// departure never leaves the cursor pointing outside the rotation.
    #[must_use]
    pub fn current_participant(&self) -> Option<&Participant> {
        let count = self.active_count();
        if count == 0 {
            return None;
        }
        self.active_participants().nth(self.turn_index % count)
    }

    /// Looks up a participant by user id, active or not.
    #[must_use]
    pub fn participant(&self, user: UserId) -> Option<&Participant> {
        self.participants.iter().find(|p| p.user_id == user)
    }

    /// Mutable participant lookup by user id.
    pub fn participant_mut(&mut self, user: UserId) -> Option<&mut Participant> {
        self.participants.iter_mut().find(|p| p.user_id == user)
    }

    /// Whether the session is in `Running` status.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.status == SessionStatus::Running
    }
}

/// Immutable action-log entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionRecord {
    /// Session the action belongs to.
    pub session_id: SessionId,
    /// Participant the action concerns.
    pub actor: UserId,
    /// Entry kind.
    pub category: ActionCategory,
    /// Question level (penalty entries use `Normal`).
    pub level: Level,
    /// Question or penalty text.
    pub text: String,
    /// Outcome status.
    pub status: ActionStatus,
    /// When the entry was recorded.
    pub recorded_at: DateTime<Utc>,
}

/// An admin-queued override question for a specific participant.
///
/// Consumed at most once, FIFO within matching filter, before random
/// selection; deleted on consumption.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForcedQuestion {
    /// Session the override targets.
    pub session_id: SessionId,
    /// Participant the override targets.
    pub target: UserId,
    /// Only consumed for picks of this category, if set.
    pub category: Option<Category>,
    /// Only consumed for picks of this level, if set.
    pub level: Option<Level>,
    /// Question text.
    pub text: String,
    /// When the override was queued.
    pub enqueued_at: DateTime<Utc>,
}

// Stable string forms, used by the store. These must not change once data
// has been persisted under them.

impl SessionKind {
    /// Stable string form used by the store.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Group => "group",
            Self::Inline => "inline",
        }
    }
}

impl FromStr for SessionKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "group" => Ok(Self::Group),
            "inline" => Ok(Self::Inline),
            other => Err(format!("unknown SessionKind: {other}")),
        }
    }
}

impl SessionStatus {
    /// Stable string form used by the store.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Lobby => "lobby",
            Self::Running => "running",
            Self::Ended => "ended",
        }
    }
}

impl FromStr for SessionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "lobby" => Ok(Self::Lobby),
            "running" => Ok(Self::Running),
            "ended" => Ok(Self::Ended),
            other => Err(format!("unknown SessionStatus: {other}")),
        }
    }
}

impl Phase {
    /// Stable string form used by the store.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Lobby => "lobby",
            Self::Choose => "choose",
            Self::Question => "question",
            Self::WaitConfirm => "wait_confirm",
        }
    }
}

impl FromStr for Phase {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "lobby" => Ok(Self::Lobby),
            "choose" => Ok(Self::Choose),
            "question" => Ok(Self::Question),
            "wait_confirm" => Ok(Self::WaitConfirm),
            other => Err(format!("unknown Phase: {other}")),
        }
    }
}

impl Category {
    /// Stable string form used by the store.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Truth => "truth",
            Self::Dare => "dare",
        }
    }
}

impl FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "truth" => Ok(Self::Truth),
            "dare" => Ok(Self::Dare),
            other => Err(format!("unknown Category: {other}")),
        }
    }
}

impl Level {
    /// Stable string form used by the store.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Normal => "normal",
            Self::Mature => "mature",
        }
    }
}

impl FromStr for Level {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "normal" => Ok(Self::Normal),
            "mature" => Ok(Self::Mature),
            other => Err(format!("unknown Level: {other}")),
        }
    }
}

impl ActionCategory {
    /// Stable string form used by the store.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Truth => "truth",
            Self::Dare => "dare",
            Self::Refuse => "refuse",
            Self::Reject => "reject",
            Self::Timeout => "timeout",
        }
    }
}

impl FromStr for ActionCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "truth" => Ok(Self::Truth),
            "dare" => Ok(Self::Dare),
            "refuse" => Ok(Self::Refuse),
            "reject" => Ok(Self::Reject),
            "timeout" => Ok(Self::Timeout),
            other => Err(format!("unknown ActionCategory: {other}")),
        }
    }
}

impl ActionStatus {
    /// Stable string form used by the store.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Asked => "asked",
            Self::DonePending => "done_pending",
            Self::Confirmed => "confirmed",
            Self::Rejected => "rejected",
            Self::Refused => "refused",
            Self::TimedOut => "timed_out",
        }
    }
}

impl FromStr for ActionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "asked" => Ok(Self::Asked),
            "done_pending" => Ok(Self::DonePending),
            "confirmed" => Ok(Self::Confirmed),
            "rejected" => Ok(Self::Rejected),
            "refused" => Ok(Self::Refused),
            "timed_out" => Ok(Self::TimedOut),
            other => Err(format!("unknown ActionStatus: {other}")),
        }
    }
}
