//! The transition function.

use parlor_core::clock::Clock;
use parlor_core::error::GameError;
use parlor_core::event::{CategoryChoice, LevelChoice, RuleToggle, SessionEvent};
use parlor_core::id::UserId;
use parlor_core::model::{
    ActionCategory, ActionRecord, ActionStatus, AskedQuestion, Category, Level, Participant,
    Phase, Session, SessionStatus,
};
use parlor_core::rng::DiceRng;

use crate::config::GameConfig;
use crate::effect::Effect;
use crate::penalty;

/// The game rules, applied to one session at a time.
///
/// Every transition validates before it mutates: an `Err` return guarantees
/// the session is exactly as it was. The coordinator additionally applies
/// transitions to a working copy and swaps on success, so a partial
/// mutation can never become authoritative.
#[derive(Debug, Clone)]
pub struct Engine {
    config: GameConfig,
}

impl Engine {
    /// Creates an engine with the given gameplay configuration.
    #[must_use]
    pub fn new(config: GameConfig) -> Self {
        Self { config }
    }

    /// The gameplay configuration.
    #[must_use]
    pub fn config(&self) -> &GameConfig {
        &self.config
    }

    /// Applies an event to the session and returns the effects to carry
    /// out.
    ///
    /// `Pick` events do not pass through here: they resolve in two steps
    /// (`resolve_pick`, then question lookup, then `apply_pick`) so that a
    /// rejected pick never consumes a forced question.
    ///
    /// # Errors
    ///
    /// Rejects bad actors, wrong phases, exhausted resources, and
    /// rule-disabled actions; the session is unchanged in every error
    /// case.
    pub fn apply(
        &self,
        session: &mut Session,
        event: &SessionEvent,
        clock: &dyn Clock,
        rng: &mut dyn DiceRng,
    ) -> Result<Vec<Effect>, GameError> {
        match event {
            SessionEvent::Join { actor, name } => self.join(session, *actor, name, clock),
            SessionEvent::Leave { actor } => self.leave(session, *actor),
            SessionEvent::Start { actor } => self.start(session, *actor),
            SessionEvent::Pick { .. } => Err(GameError::Validation(
                "pick events resolve through resolve_pick and apply_pick".to_owned(),
            )),
            SessionEvent::Reroll { actor } => self.reroll(session, *actor),
            SessionEvent::Skip { actor } => self.skip(session, *actor),
            SessionEvent::Done { actor } => self.done(session, *actor),
            SessionEvent::Refuse { actor } => self.refuse(session, *actor, clock, rng),
            SessionEvent::Confirm { actor, accepted } => {
                self.confirm(session, *actor, *accepted, clock, rng)
            }
            SessionEvent::Timeout { participant } => self.timeout(session, *participant, clock, rng),
            SessionEvent::Configure { actor, toggle } => self.configure(session, *actor, *toggle),
            SessionEvent::End { actor } => self.end(session, *actor),
        }
    }

    /// Validates a pick and resolves the concrete category and level,
    /// without mutating anything.
    ///
    /// Random choices resolve uniformly *before* the mature-content check,
    /// so a random pick can land on mature and be rejected.
    ///
    /// # Errors
    ///
    /// `InvalidPhase` outside `Choose`, `Unauthorized` for non-current
    /// actors, `ConfigDisabled` for mature picks with the flag off.
    pub fn resolve_pick(
        &self,
        session: &Session,
        actor: UserId,
        category: CategoryChoice,
        level: LevelChoice,
        rng: &mut dyn DiceRng,
    ) -> Result<(Category, Level), GameError> {
        require_phase(session, Phase::Choose)?;
        require_current(session, actor)?;

        let category = match category {
            CategoryChoice::Truth => Category::Truth,
            CategoryChoice::Dare => Category::Dare,
            CategoryChoice::Any => {
                if rng.next_u32_range(0, 1) == 0 {
                    Category::Truth
                } else {
                    Category::Dare
                }
            }
        };
        let level = match level {
            LevelChoice::Normal => Level::Normal,
            LevelChoice::Mature => Level::Mature,
            LevelChoice::Any => {
                if rng.next_u32_range(0, 1) == 0 {
                    Level::Normal
                } else {
                    Level::Mature
                }
            }
        };

        if level == Level::Mature && !session.rules.allow_mature {
            return Err(GameError::ConfigDisabled("mature questions are turned off"));
        }

        Ok((category, level))
    }

    /// Puts a resolved question on the board.
    ///
    /// # Errors
    ///
    /// Same phase/actor rejections as `resolve_pick`; the two are split
    /// only so the caller can fetch the question text in between.
    pub fn apply_pick(
        &self,
        session: &mut Session,
        actor: UserId,
        category: Category,
        level: Level,
        text: String,
        clock: &dyn Clock,
    ) -> Result<Vec<Effect>, GameError> {
        require_phase(session, Phase::Choose)?;
        require_current(session, actor)?;

        session.phase = Phase::Question;
        session.last_question = Some(AskedQuestion {
            text: text.clone(),
            category,
            level,
            asked_by: actor,
        });

        Ok(vec![
            Effect::Record(ActionRecord {
                session_id: session.id,
                actor,
                category: category.into(),
                level,
                text,
                status: ActionStatus::Asked,
                recorded_at: clock.now(),
            }),
            Effect::ArmTimer { participant: actor },
        ])
    }

    fn join(
        &self,
        session: &mut Session,
        actor: UserId,
        name: &str,
        clock: &dyn Clock,
    ) -> Result<Vec<Effect>, GameError> {
        if session.status == SessionStatus::Ended {
            return Err(GameError::SessionEnded);
        }
        if session.is_running() && !session.rules.allow_mid_join {
            return Err(GameError::ConfigDisabled("mid-game joining is turned off"));
        }

        if let Some(existing) = session.participant_mut(actor) {
            // Re-joining reactivates; statistics and join order survive.
            existing.active = true;
            existing.name = name.to_owned();
        } else {
            session.participants.push(Participant::new(
                actor,
                name.to_owned(),
                clock.now(),
                self.config.max_rerolls,
            ));
        }
        Ok(vec![])
    }

    fn leave(&self, session: &mut Session, actor: UserId) -> Result<Vec<Effect>, GameError> {
        if session.status == SessionStatus::Ended {
            return Err(GameError::SessionEnded);
        }

        let old_actives: Vec<UserId> = session.active_participants().map(|p| p.user_id).collect();
        let Some(leaver_pos) = old_actives.iter().position(|&u| u == actor) else {
            return Err(GameError::Validation(
                "not an active participant of this session".to_owned(),
            ));
        };
        let old_count = old_actives.len();
        let current_user = session.current_participant().map(|p| p.user_id);

        if let Some(p) = session.participant_mut(actor) {
            p.active = false;
        }

        if !session.is_running() {
            return Ok(vec![]);
        }

        if old_count == 1 {
            // The last participant walked out of a running game.
            session.status = SessionStatus::Ended;
            return Ok(vec![Effect::CancelTimer]);
        }

        if current_user == Some(actor) {
            // The turn passes to whoever followed the leaver in rotation.
            let successor = old_actives[(leaver_pos + 1) % old_count];
            let new_index = active_position(session, successor).unwrap_or(0);
            session.turn_index = new_index;
            session.phase = Phase::Choose;
            if let Some(p) = session.participant_mut(successor) {
                p.turns += 1;
            }
            return Ok(vec![Effect::ArmTimer {
                participant: successor,
            }]);
        }

        // Keep the current participant current: departures before it in
        // join order would otherwise shift the cursor onto someone else.
        if let Some(current) = current_user
            && let Some(new_index) = active_position(session, current)
        {
            session.turn_index = new_index;
        }
        Ok(vec![])
    }

    fn start(&self, session: &mut Session, actor: UserId) -> Result<Vec<Effect>, GameError> {
        if session.status == SessionStatus::Ended {
            return Err(GameError::SessionEnded);
        }
        if session.status != SessionStatus::Lobby {
            return Err(GameError::InvalidPhase {
                expected: Phase::Lobby,
                actual: session.phase,
            });
        }
        if !self.privileged(session, actor) {
            return Err(GameError::Unauthorized("only the owner may start the game"));
        }
        if session.active_count() < 2 {
            return Err(GameError::Validation(
                "at least two active participants are required to start".to_owned(),
            ));
        }

        session.status = SessionStatus::Running;
        session.phase = Phase::Choose;
        session.turn_index = 0;
        let first = session
            .current_participant()
            .map(|p| p.user_id)
            .ok_or_else(|| GameError::Validation("no active participants".to_owned()))?;
        if let Some(p) = session.participant_mut(first) {
            p.turns += 1;
        }
        Ok(vec![Effect::ArmTimer { participant: first }])
    }

    fn reroll(&self, session: &mut Session, actor: UserId) -> Result<Vec<Effect>, GameError> {
        require_phase(session, Phase::Choose)?;
        require_current(session, actor)?;

        let participant = session
            .participant_mut(actor)
            .ok_or_else(|| GameError::Validation("unknown participant".to_owned()))?;
        if participant.rerolls_left == 0 {
            return Err(GameError::ResourceExhausted("no rerolls remaining"));
        }
        participant.rerolls_left -= 1;
        Ok(vec![Effect::ArmTimer { participant: actor }])
    }

    fn skip(&self, session: &mut Session, actor: UserId) -> Result<Vec<Effect>, GameError> {
        require_phase(session, Phase::Choose)?;
        let current = session
            .current_participant()
            .map(|p| p.user_id)
            .ok_or_else(|| GameError::Validation("no active participants".to_owned()))?;
        if actor != current && !self.privileged(session, actor) {
            return Err(GameError::Unauthorized(
                "only the current participant or the owner may skip",
            ));
        }

        if let Some(p) = session.participant_mut(current) {
            p.skips += 1;
        }
        let effects = advance_turn(session).map_or_else(Vec::new, |next| {
            vec![Effect::ArmTimer { participant: next }]
        });
        Ok(effects)
    }

    fn done(&self, session: &mut Session, actor: UserId) -> Result<Vec<Effect>, GameError> {
        require_phase(session, Phase::Question)?;
        require_current(session, actor)?;

        if session.active_count() == 2 {
            // Two-party game: the counterpart has to vouch for the claim.
            session.phase = Phase::WaitConfirm;
            return Ok(vec![
                Effect::UpdateLastAction(ActionStatus::DonePending),
                Effect::ArmTimer { participant: actor },
            ]);
        }

        let mut effects = vec![Effect::UpdateLastAction(ActionStatus::Confirmed)];
        if let Some(next) = advance_turn(session) {
            effects.push(Effect::ArmTimer { participant: next });
        }
        Ok(effects)
    }

    fn refuse(
        &self,
        session: &mut Session,
        actor: UserId,
        clock: &dyn Clock,
        rng: &mut dyn DiceRng,
    ) -> Result<Vec<Effect>, GameError> {
        require_phase(session, Phase::Question)?;
        require_current(session, actor)?;

        let text = penalize(session, actor, self.config.reroll_burn_on_refusal, rng);
        let mut effects = vec![Effect::Record(ActionRecord {
            session_id: session.id,
            actor,
            category: ActionCategory::Refuse,
            level: Level::Normal,
            text,
            status: ActionStatus::Refused,
            recorded_at: clock.now(),
        })];
        if let Some(next) = advance_turn(session) {
            effects.push(Effect::ArmTimer { participant: next });
        }
        Ok(effects)
    }

    fn confirm(
        &self,
        session: &mut Session,
        actor: UserId,
        accepted: bool,
        clock: &dyn Clock,
        rng: &mut dyn DiceRng,
    ) -> Result<Vec<Effect>, GameError> {
        require_phase(session, Phase::WaitConfirm)?;
        if session.active_count() != 2 {
            return Err(GameError::Validation(
                "confirmation requires exactly two active participants".to_owned(),
            ));
        }
        let current = session
            .current_participant()
            .map(|p| p.user_id)
            .ok_or_else(|| GameError::Validation("no active participants".to_owned()))?;
        let counterpart = session
            .active_participants()
            .map(|p| p.user_id)
            .find(|&u| u != current)
            .ok_or_else(|| GameError::Validation("no counterpart found".to_owned()))?;
        if actor != counterpart {
            return Err(GameError::Unauthorized("only the counterpart may confirm"));
        }

        let mut effects = Vec::new();
        if accepted {
            effects.push(Effect::UpdateLastAction(ActionStatus::Confirmed));
        } else {
            effects.push(Effect::UpdateLastAction(ActionStatus::Rejected));
            let text = penalize(session, current, self.config.reroll_burn_on_refusal, rng);
            effects.push(Effect::Record(ActionRecord {
                session_id: session.id,
                actor: current,
                category: ActionCategory::Reject,
                level: Level::Normal,
                text,
                status: ActionStatus::Rejected,
                recorded_at: clock.now(),
            }));
        }
        if let Some(next) = advance_turn(session) {
            effects.push(Effect::ArmTimer { participant: next });
        }
        Ok(effects)
    }

    fn timeout(
        &self,
        session: &mut Session,
        participant: UserId,
        clock: &dyn Clock,
        rng: &mut dyn DiceRng,
    ) -> Result<Vec<Effect>, GameError> {
        // A stale timer is not an error: the turn simply moved on first.
        if !session.is_running() {
            return Ok(vec![]);
        }
        match session.current_participant() {
            Some(p) if p.user_id == participant => {}
            _ => return Ok(vec![]),
        }

        let text = penalize(session, participant, self.config.reroll_burn_on_timeout, rng);
        let mut effects = vec![Effect::Record(ActionRecord {
            session_id: session.id,
            actor: participant,
            category: ActionCategory::Timeout,
            level: Level::Normal,
            text,
            status: ActionStatus::TimedOut,
            recorded_at: clock.now(),
        })];
        if let Some(next) = advance_turn(session) {
            effects.push(Effect::ArmTimer { participant: next });
        }
        Ok(effects)
    }

    fn configure(
        &self,
        session: &mut Session,
        actor: UserId,
        toggle: RuleToggle,
    ) -> Result<Vec<Effect>, GameError> {
        if session.status == SessionStatus::Ended {
            return Err(GameError::SessionEnded);
        }
        if !self.privileged(session, actor) {
            return Err(GameError::Unauthorized(
                "only the owner may change session rules",
            ));
        }

        match toggle {
            RuleToggle::MidJoin => {
                session.rules.allow_mid_join = !session.rules.allow_mid_join;
            }
            RuleToggle::ShowPreviousQuestion => {
                session.rules.show_previous_question = !session.rules.show_previous_question;
            }
            RuleToggle::MatureContent => {
                session.rules.allow_mature = !session.rules.allow_mature;
            }
        }
        Ok(vec![])
    }

    fn end(&self, session: &mut Session, actor: UserId) -> Result<Vec<Effect>, GameError> {
        if session.status == SessionStatus::Ended {
            return Err(GameError::SessionEnded);
        }
        if !self.privileged(session, actor) {
            return Err(GameError::Unauthorized("only the owner may end the game"));
        }

        session.status = SessionStatus::Ended;
        Ok(vec![Effect::CancelTimer])
    }

    fn privileged(&self, session: &Session, actor: UserId) -> bool {
        actor == session.owner || self.config.admin == Some(actor)
    }
}

/// Rejects ended sessions and any phase other than `expected`.
fn require_phase(session: &Session, expected: Phase) -> Result<(), GameError> {
    if session.status == SessionStatus::Ended {
        return Err(GameError::SessionEnded);
    }
    if session.phase != expected {
        return Err(GameError::InvalidPhase {
            expected,
            actual: session.phase,
        });
    }
    Ok(())
}

fn require_current(session: &Session, actor: UserId) -> Result<(), GameError> {
    match session.current_participant() {
        Some(p) if p.user_id == actor => Ok(()),
        _ => Err(GameError::Unauthorized("it is not your turn")),
    }
}

/// Moves the turn to the next active participant and returns it.
///
/// `index = (index + 1) mod active_count`, then the new current
/// participant's turn counter is bumped. Also resets the phase to `Choose`.
fn advance_turn(session: &mut Session) -> Option<UserId> {
    session.phase = Phase::Choose;
    let count = session.active_count();
    if count == 0 {
        return None;
    }
    session.turn_index = (session.turn_index % count + 1) % count;
    let next = session.current_participant().map(|p| p.user_id)?;
    if let Some(p) = session.participant_mut(next) {
        p.turns += 1;
    }
    Some(next)
}

/// Index of a user within the active rotation.
fn active_position(session: &Session, user: UserId) -> Option<usize> {
    session.active_participants().position(|p| p.user_id == user)
}

/// Applies a penalty to a participant: bumps the counter, maybe burns a
/// reroll, and returns the penalty text for the action log.
fn penalize(
    session: &mut Session,
    user: UserId,
    burn_probability: f64,
    rng: &mut dyn DiceRng,
) -> String {
    let text = penalty::pick(rng);
    if let Some(p) = session.participant_mut(user) {
        p.penalties += 1;
        if p.rerolls_left > 0 && rng.next_f64() < burn_probability {
            p.rerolls_left -= 1;
        }
    }
    text
}
