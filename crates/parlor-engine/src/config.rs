//! Gameplay tunables.

use std::time::Duration;

use parlor_core::id::UserId;

/// Gameplay configuration, fixed at bootstrap and shared by every session.
#[derive(Debug, Clone)]
pub struct GameConfig {
    /// How long a participant has before their turn times out.
    pub turn_timeout: Duration,
    /// Reroll budget each participant starts with.
    pub max_rerolls: u32,
    /// Probability that refusing (or having a claim rejected) burns one
    /// reroll, when any remain.
    pub reroll_burn_on_refusal: f64,
    /// Probability that a turn timeout burns one reroll, when any remain.
    pub reroll_burn_on_timeout: f64,
    /// Global administrator, allowed the owner-only actions on any session.
    pub admin: Option<UserId>,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            turn_timeout: Duration::from_secs(60),
            max_rerolls: 3,
            reroll_burn_on_refusal: 0.7,
            reroll_burn_on_timeout: 0.5,
            admin: None,
        }
    }
}
