//! The per-session coordinator.
//!
//! One task owns the authoritative in-memory state of one session and
//! drains an ordered inbox, so two events for the same session can never
//! interleave their read-modify-write. Each event runs against a working
//! copy; only a fully persisted transition becomes authoritative.

use std::sync::Arc;

use parlor_core::error::GameError;
use parlor_core::event::SessionEvent;
use parlor_core::id::{SurfaceRef, UserId};
use parlor_core::model::{Category, Level, Session, SessionStatus};
use parlor_core::rng::DiceRng;
use parlor_engine::{Effect, Engine};
use tokio::sync::{mpsc, oneshot, watch};

use crate::delivery;
use crate::registry::RuntimeDeps;
use crate::timer::TurnTimer;

const INBOX_CAPACITY: usize = 64;

/// A message routed into a coordinator's inbox.
#[derive(Debug)]
pub(crate) enum Msg {
    /// An external event with its reply channel.
    Apply {
        event: SessionEvent,
        reply: oneshot::Sender<Result<Session, GameError>>,
    },
    /// The turn timer fired. Dropped if `generation` is no longer the
    /// armed timer's generation.
    TimerFired { participant: UserId, generation: u64 },
    /// The delivery worker replaced a lost board surface.
    SurfaceReplaced { surface: SurfaceRef },
}

/// A cheap handle for routing events into a live coordinator.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    tx: mpsc::Sender<Msg>,
    snapshots: watch::Receiver<Session>,
}

impl SessionHandle {
    /// Routes an event through the coordinator and returns the post-event
    /// snapshot.
    ///
    /// # Errors
    ///
    /// Whatever the engine or the store rejected the event with;
    /// `SessionEnded` if the coordinator has already stopped.
    pub async fn apply(&self, event: SessionEvent) -> Result<Session, GameError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(Msg::Apply {
                event,
                reply: reply_tx,
            })
            .await
            .map_err(|_| GameError::SessionEnded)?;
        reply_rx.await.map_err(|_| GameError::SessionEnded)?
    }

    /// The latest committed snapshot.
    #[must_use]
    pub fn snapshot(&self) -> Session {
        self.snapshots.borrow().clone()
    }

    /// Whether the coordinator behind this handle has stopped.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

pub(crate) struct Coordinator {
    session: Session,
    engine: Engine,
    deps: Arc<RuntimeDeps>,
    rng: Box<dyn DiceRng>,
    inbox: mpsc::Receiver<Msg>,
    self_tx: mpsc::Sender<Msg>,
    timer: TurnTimer,
    publisher: watch::Sender<Session>,
}

impl Coordinator {
    /// Spawns the coordinator task and its delivery worker for a session,
    /// returning the handle used to route events in.
    pub(crate) fn spawn(session: Session, engine: Engine, deps: Arc<RuntimeDeps>) -> SessionHandle {
        let (tx, inbox) = mpsc::channel(INBOX_CAPACITY);
        let (publisher, snapshots) = watch::channel(session.clone());

        delivery::spawn_worker(
            snapshots.clone(),
            deps.gateway.clone(),
            deps.delivery.clone(),
            tx.clone(),
            session.id,
        );

        let coordinator = Self {
            rng: (deps.rng_factory)(),
            session,
            engine,
            deps,
            inbox,
            self_tx: tx.clone(),
            timer: TurnTimer::default(),
            publisher,
        };
        tokio::spawn(coordinator.run());

        SessionHandle { tx, snapshots }
    }

    async fn run(mut self) {
        let id = self.session.id;
        tracing::info!(session = %id, "session coordinator started");

        // A coordinator resumed over a running session re-arms the current
        // participant's timer; the persisted snapshot cannot carry one.
        if self.session.is_running()
            && let Some(current) = self.session.current_participant()
        {
            self.timer.arm(
                current.user_id,
                self.engine.config().turn_timeout,
                self.self_tx.clone(),
            );
        }

        while let Some(msg) = self.inbox.recv().await {
            match msg {
                Msg::Apply { event, reply } => {
                    let name = event.name();
                    let result = self.process(event).await;
                    if let Err(error) = &result {
                        tracing::debug!(session = %id, event = name, %error, "event rejected");
                    }
                    let _ = reply.send(result);
                }
                Msg::TimerFired {
                    participant,
                    generation,
                } => {
                    if !self.timer.is_current(generation) {
                        tracing::debug!(session = %id, %participant, "stale timer dropped");
                        continue;
                    }
                    if let Err(error) =
                        self.process(SessionEvent::Timeout { participant }).await
                    {
                        tracing::warn!(session = %id, %error, "timeout processing failed");
                    }
                }
                Msg::SurfaceReplaced { surface } => {
                    self.session.surface = Some(surface.clone());
                    if let Err(error) =
                        self.deps.store.update_surface(id, &surface).await
                    {
                        tracing::warn!(session = %id, %error, "failed to persist new surface");
                    }
                }
            }

            if self.session.status == SessionStatus::Ended {
                break;
            }
        }

        self.timer.cancel();
        tracing::info!(session = %id, "session coordinator stopped");
    }

    /// Runs one event: transition on a working copy, persist, swap,
    /// schedule timers, publish for delivery.
    async fn process(&mut self, event: SessionEvent) -> Result<Session, GameError> {
        let mut working = self.session.clone();

        let effects = match &event {
            SessionEvent::Pick {
                actor,
                category,
                level,
            } => {
                let (category, level) = self.engine.resolve_pick(
                    &working,
                    *actor,
                    *category,
                    *level,
                    self.rng.as_mut(),
                )?;
                let text = self.resolve_question(*actor, category, level).await?;
                self.engine.apply_pick(
                    &mut working,
                    *actor,
                    category,
                    level,
                    text,
                    self.deps.clock.as_ref(),
                )?
            }
            other => self.engine.apply(
                &mut working,
                other,
                self.deps.clock.as_ref(),
                self.rng.as_mut(),
            )?,
        };

        self.persist(&working, &effects).await?;
        self.session = working;
        self.schedule(&effects);
        self.publisher.send_replace(self.session.clone());
        Ok(self.session.clone())
    }

    /// Resolves the question text for an authorized pick: forced queue
    /// first (consumed at most once), then a random eligible bank row.
    async fn resolve_question(
        &self,
        actor: UserId,
        category: Category,
        level: Level,
    ) -> Result<String, GameError> {
        if let Some(text) = self
            .deps
            .store
            .pop_forced(self.session.id, actor, category, level)
            .await?
        {
            tracing::debug!(session = %self.session.id, %actor, "serving forced question");
            return Ok(text);
        }
        self.deps
            .store
            .pick_random_eligible(category, level)
            .await?
            .ok_or(GameError::ResourceExhausted("no eligible question in the bank"))
    }

    /// Writes the transition's outcome: the session row, the participants
    /// the event touched, and any action-log entries.
    async fn persist(&self, working: &Session, effects: &[Effect]) -> Result<(), GameError> {
        let store = &self.deps.store;
        store.save_session(working).await?;
        for participant in &working.participants {
            let changed = self
                .session
                .participant(participant.user_id)
                .is_none_or(|before| before != participant);
            if changed {
                store.upsert_participant(working.id, participant).await?;
            }
        }
        for effect in effects {
            match effect {
                Effect::Record(record) => store.append_action(record).await?,
                Effect::UpdateLastAction(status) => {
                    store.update_last_action_status(working.id, *status).await?;
                }
                Effect::ArmTimer { .. } | Effect::CancelTimer => {}
            }
        }
        Ok(())
    }

    fn schedule(&mut self, effects: &[Effect]) {
        for effect in effects {
            match effect {
                Effect::ArmTimer { participant } => {
                    self.timer.arm(
                        *participant,
                        self.engine.config().turn_timeout,
                        self.self_tx.clone(),
                    );
                }
                Effect::CancelTimer => self.timer.cancel(),
                Effect::Record(_) | Effect::UpdateLastAction(_) => {}
            }
        }
    }
}
