//! The session registry.
//!
//! Owns the map from session id to live coordinator handle. A coordinator
//! is created on first event for a session (resuming from the store when
//! needed) and retired once the session has ended; ended sessions are
//! never resurrected.

use std::collections::HashMap;
use std::sync::Arc;

use parlor_core::clock::{Clock, SystemClock};
use parlor_core::delivery::DeliveryGateway;
use parlor_core::error::GameError;
use parlor_core::event::SessionEvent;
use parlor_core::id::{SessionId, UserId};
use parlor_core::model::{Session, SessionKind, SessionStatus};
use parlor_core::rng::{DiceRng, ThreadDiceRng};
use parlor_core::store::Store;
use parlor_engine::{Engine, GameConfig};
use tokio::sync::Mutex;

use crate::coordinator::{Coordinator, SessionHandle};
use crate::delivery::DeliveryPolicy;

/// Produces the RNG a coordinator draws from. One RNG per coordinator
/// keeps draws off any shared lock.
pub type RngFactory = Arc<dyn Fn() -> Box<dyn DiceRng> + Send + Sync>;

/// Everything the runtime needs from the outside world.
pub struct RuntimeDeps {
    /// Durable store for sessions and questions.
    pub store: Arc<dyn Store>,
    /// Board delivery gateway.
    pub gateway: Arc<dyn DeliveryGateway>,
    /// Time source.
    pub clock: Arc<dyn Clock>,
    /// RNG source, one per coordinator.
    pub rng_factory: RngFactory,
    /// Gameplay tunables.
    pub game: GameConfig,
    /// Delivery retry and pacing tunables.
    pub delivery: DeliveryPolicy,
}

impl RuntimeDeps {
    /// Production wiring: system clock, thread RNG, default tunables.
    #[must_use]
    pub fn new(store: Arc<dyn Store>, gateway: Arc<dyn DeliveryGateway>) -> Self {
        Self {
            store,
            gateway,
            clock: Arc::new(SystemClock),
            rng_factory: Arc::new(|| Box::new(ThreadDiceRng)),
            game: GameConfig::default(),
            delivery: DeliveryPolicy::default(),
        }
    }
}

/// Registry of live session coordinators.
pub struct SessionRegistry {
    deps: Arc<RuntimeDeps>,
    engine: Engine,
    handles: Mutex<HashMap<SessionId, SessionHandle>>,
}

impl SessionRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new(deps: RuntimeDeps) -> Self {
        Self {
            engine: Engine::new(deps.game.clone()),
            deps: Arc::new(deps),
            handles: Mutex::new(HashMap::new()),
        }
    }

    /// Creates a new lobby session with the owner already joined, mints
    /// its board surface, persists it, and spawns its coordinator.
    ///
    /// # Errors
    ///
    /// `Storage` if the initial persist fails.
    pub async fn create_session(
        &self,
        kind: SessionKind,
        owner: UserId,
        owner_name: &str,
    ) -> Result<Session, GameError> {
        let mut session = Session::new(SessionId::new(), kind, owner, self.deps.clock.now());

        let mut rng = (self.deps.rng_factory)();
        self.engine.apply(
            &mut session,
            &SessionEvent::Join {
                actor: owner,
                name: owner_name.to_owned(),
            },
            self.deps.clock.as_ref(),
            rng.as_mut(),
        )?;

        match self.deps.gateway.recreate_surface(&session).await {
            Ok(surface) => session.surface = Some(surface),
            Err(error) => {
                // The delivery worker will mint one on its first permanent
                // failure; the session itself is fine.
                tracing::warn!(session = %session.id, %error, "could not mint board surface");
            }
        }

        self.deps.store.save_session(&session).await?;
        for participant in &session.participants {
            self.deps
                .store
                .upsert_participant(session.id, participant)
                .await?;
        }

        let handle = Coordinator::spawn(session.clone(), self.engine.clone(), self.deps.clone());
        self.handles.lock().await.insert(session.id, handle);
        tracing::info!(session = %session.id, %owner, kind = kind.as_str(), "session created");

        Ok(session)
    }

    /// Routes an event into the session's coordinator, spawning or
    /// resuming it if needed.
    ///
    /// # Errors
    ///
    /// `NotFound` for unknown ids, `SessionEnded` for terminal sessions,
    /// otherwise whatever the engine or store rejected the event with.
    pub async fn dispatch(
        &self,
        id: SessionId,
        event: SessionEvent,
    ) -> Result<Session, GameError> {
        // One retry: the handle may belong to a coordinator that stopped
        // between lookup and send.
        for _ in 0..2 {
            let handle = self.handle_for(id).await?;
            match handle.apply(event.clone()).await {
                Err(GameError::SessionEnded) if handle.is_closed() => {
                    self.handles.lock().await.remove(&id);
                }
                result => return result,
            }
        }
        Err(GameError::SessionEnded)
    }

    /// The latest snapshot of a session: live coordinator state when one
    /// exists, otherwise the persisted state (ended sessions included).
    ///
    /// # Errors
    ///
    /// `NotFound` if the id is unknown to both.
    pub async fn snapshot(&self, id: SessionId) -> Result<Session, GameError> {
        if let Some(handle) = self.handles.lock().await.get(&id)
            && !handle.is_closed()
        {
            return Ok(handle.snapshot());
        }
        self.deps
            .store
            .load_session(id)
            .await?
            .ok_or(GameError::NotFound(id))
    }

    /// Number of live coordinators.
    pub async fn live_sessions(&self) -> usize {
        let mut handles = self.handles.lock().await;
        handles.retain(|_, handle| !handle.is_closed());
        handles.len()
    }

    async fn handle_for(&self, id: SessionId) -> Result<SessionHandle, GameError> {
        let mut handles = self.handles.lock().await;
        if let Some(handle) = handles.get(&id) {
            if !handle.is_closed() {
                return Ok(handle.clone());
            }
            handles.remove(&id);
        }

        let session = self
            .deps
            .store
            .load_session(id)
            .await?
            .ok_or(GameError::NotFound(id))?;
        if session.status == SessionStatus::Ended {
            return Err(GameError::SessionEnded);
        }

        tracing::info!(session = %id, "resuming session coordinator from store");
        let handle = Coordinator::spawn(session, self.engine.clone(), self.deps.clone());
        handles.insert(id, handle.clone());
        Ok(handle)
    }
}
