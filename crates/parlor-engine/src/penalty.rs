//! Penalty selection.

use parlor_core::rng::DiceRng;

/// The penalty pool. One entry is picked uniformly whenever a participant
/// refuses, gets rejected, or times out.
const PENALTIES: [&str; 5] = [
    "Penalty: one strike recorded against you",
    "Penalty: send a five-second voice note to the group",
    "Penalty: next round you must pick at random",
    "Penalty: one of your rerolls is gone",
    "Penalty: the host picks your next question",
];

/// Picks a penalty text uniformly from the pool.
#[allow(clippy::cast_possible_truncation)]
pub(crate) fn pick(rng: &mut dyn DiceRng) -> String {
    let idx = rng.next_u32_range(0, PENALTIES.len() as u32 - 1) as usize;
    PENALTIES[idx].to_owned()
}
