//! Test stores — in-memory and always-failing implementations of the
//! store seams.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use parlor_core::error::GameError;
use parlor_core::id::{SessionId, SurfaceRef, UserId};
use parlor_core::model::{
    ActionRecord, ActionStatus, Category, ForcedQuestion, Level, Participant, Session,
};
use parlor_core::store::{QuestionBank, SessionStore};

#[derive(Debug, Clone)]
struct QuestionRow {
    category: Category,
    level: Level,
    text: String,
    enabled: bool,
}

#[derive(Debug, Default)]
struct Inner {
    sessions: HashMap<SessionId, Session>,
    actions: HashMap<SessionId, Vec<ActionRecord>>,
    forced: Vec<(u64, ForcedQuestion)>,
    forced_seq: u64,
    questions: Vec<QuestionRow>,
}

/// A complete in-memory implementation of both store seams.
///
/// Question picks are deterministic (first eligible row) so tests do not
/// depend on randomness in the double.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    inner: Mutex<Inner>,
    fail_writes: AtomicBool,
}

impl InMemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent write fail with a storage error (or stop
    /// failing), for exercising reject-and-keep-state paths.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    fn check_writable(&self) -> Result<(), GameError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(GameError::Storage("simulated write failure".to_owned()));
        }
        Ok(())
    }

    /// Seeds one enabled question row.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn seed_question(&self, category: Category, level: Level, text: &str) {
        self.inner.lock().unwrap().questions.push(QuestionRow {
            category,
            level,
            text: text.to_owned(),
            enabled: true,
        });
    }

    /// All recorded actions for a session, oldest first.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    #[must_use]
    pub fn actions(&self, session_id: SessionId) -> Vec<ActionRecord> {
        self.inner
            .lock()
            .unwrap()
            .actions
            .get(&session_id)
            .cloned()
            .unwrap_or_default()
    }

    /// Number of queued forced questions across all sessions.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    #[must_use]
    pub fn forced_len(&self) -> usize {
        self.inner.lock().unwrap().forced.len()
    }
}

#[async_trait]
impl SessionStore for InMemoryStore {
    async fn load_session(&self, id: SessionId) -> Result<Option<Session>, GameError> {
        Ok(self.inner.lock().unwrap().sessions.get(&id).cloned())
    }

    async fn save_session(&self, session: &Session) -> Result<(), GameError> {
        self.check_writable()?;
        self.inner
            .lock()
            .unwrap()
            .sessions
            .insert(session.id, session.clone());
        Ok(())
    }

    async fn list_active_participants(
        &self,
        session_id: SessionId,
    ) -> Result<Vec<Participant>, GameError> {
        Ok(self
            .inner
            .lock()
            .unwrap()
            .sessions
            .get(&session_id)
            .map(|s| s.active_participants().cloned().collect())
            .unwrap_or_default())
    }

    async fn upsert_participant(
        &self,
        session_id: SessionId,
        participant: &Participant,
    ) -> Result<(), GameError> {
        self.check_writable()?;
        let mut inner = self.inner.lock().unwrap();
        let Some(session) = inner.sessions.get_mut(&session_id) else {
            return Err(GameError::NotFound(session_id));
        };
        if let Some(existing) = session
            .participants
            .iter_mut()
            .find(|p| p.user_id == participant.user_id)
        {
            *existing = participant.clone();
        } else {
            session.participants.push(participant.clone());
        }
        Ok(())
    }

    async fn append_action(&self, action: &ActionRecord) -> Result<(), GameError> {
        self.check_writable()?;
        self.inner
            .lock()
            .unwrap()
            .actions
            .entry(action.session_id)
            .or_default()
            .push(action.clone());
        Ok(())
    }

    async fn last_action(
        &self,
        session_id: SessionId,
    ) -> Result<Option<ActionRecord>, GameError> {
        Ok(self
            .inner
            .lock()
            .unwrap()
            .actions
            .get(&session_id)
            .and_then(|log| log.last().cloned()))
    }

    async fn update_last_action_status(
        &self,
        session_id: SessionId,
        status: ActionStatus,
    ) -> Result<(), GameError> {
        let mut inner = self.inner.lock().unwrap();
        if let Some(last) = inner
            .actions
            .get_mut(&session_id)
            .and_then(|log| log.last_mut())
        {
            last.status = status;
        }
        Ok(())
    }

    async fn update_surface(
        &self,
        session_id: SessionId,
        surface: &SurfaceRef,
    ) -> Result<(), GameError> {
        let mut inner = self.inner.lock().unwrap();
        let Some(session) = inner.sessions.get_mut(&session_id) else {
            return Err(GameError::NotFound(session_id));
        };
        session.surface = Some(surface.clone());
        Ok(())
    }
}

#[async_trait]
impl QuestionBank for InMemoryStore {
    async fn pick_random_eligible(
        &self,
        category: Category,
        level: Level,
    ) -> Result<Option<String>, GameError> {
        Ok(self
            .inner
            .lock()
            .unwrap()
            .questions
            .iter()
            .find(|q| q.enabled && q.category == category && q.level == level)
            .map(|q| q.text.clone()))
    }

    async fn enqueue_forced(&self, forced: &ForcedQuestion) -> Result<(), GameError> {
        let mut inner = self.inner.lock().unwrap();
        inner.forced_seq += 1;
        let seq = inner.forced_seq;
        inner.forced.push((seq, forced.clone()));
        Ok(())
    }

    async fn pop_forced(
        &self,
        session_id: SessionId,
        target: UserId,
        category: Category,
        level: Level,
    ) -> Result<Option<String>, GameError> {
        let mut inner = self.inner.lock().unwrap();
        let found = inner
            .forced
            .iter()
            .filter(|(_, f)| {
                f.session_id == session_id
                    && f.target == target
                    && f.category.is_none_or(|c| c == category)
                    && f.level.is_none_or(|l| l == level)
            })
            .min_by_key(|(seq, _)| *seq)
            .map(|(seq, f)| (*seq, f.text.clone()));
        if let Some((seq, text)) = found {
            inner.forced.retain(|(s, _)| *s != seq);
            Ok(Some(text))
        } else {
            Ok(None)
        }
    }

    async fn add_questions(
        &self,
        category: Category,
        level: Level,
        texts: &[String],
    ) -> Result<u64, GameError> {
        let mut inner = self.inner.lock().unwrap();
        for text in texts {
            inner.questions.push(QuestionRow {
                category,
                level,
                text: text.clone(),
                enabled: true,
            });
        }
        Ok(texts.len() as u64)
    }
}

/// A store that always returns a storage error. Useful for testing the
/// reject-and-keep-state path of the coordinator.
#[derive(Debug, Default)]
pub struct FailingStore;

fn refused() -> GameError {
    GameError::Storage("connection refused".to_owned())
}

#[async_trait]
impl SessionStore for FailingStore {
    async fn load_session(&self, _id: SessionId) -> Result<Option<Session>, GameError> {
        Err(refused())
    }

    async fn save_session(&self, _session: &Session) -> Result<(), GameError> {
        Err(refused())
    }

    async fn list_active_participants(
        &self,
        _session_id: SessionId,
    ) -> Result<Vec<Participant>, GameError> {
        Err(refused())
    }

    async fn upsert_participant(
        &self,
        _session_id: SessionId,
        _participant: &Participant,
    ) -> Result<(), GameError> {
        Err(refused())
    }

    async fn append_action(&self, _action: &ActionRecord) -> Result<(), GameError> {
        Err(refused())
    }

    async fn last_action(
        &self,
        _session_id: SessionId,
    ) -> Result<Option<ActionRecord>, GameError> {
        Err(refused())
    }

    async fn update_last_action_status(
        &self,
        _session_id: SessionId,
        _status: ActionStatus,
    ) -> Result<(), GameError> {
        Err(refused())
    }

    async fn update_surface(
        &self,
        _session_id: SessionId,
        _surface: &SurfaceRef,
    ) -> Result<(), GameError> {
        Err(refused())
    }
}

#[async_trait]
impl QuestionBank for FailingStore {
    async fn pick_random_eligible(
        &self,
        _category: Category,
        _level: Level,
    ) -> Result<Option<String>, GameError> {
        Err(refused())
    }

    async fn enqueue_forced(&self, _forced: &ForcedQuestion) -> Result<(), GameError> {
        Err(refused())
    }

    async fn pop_forced(
        &self,
        _session_id: SessionId,
        _target: UserId,
        _category: Category,
        _level: Level,
    ) -> Result<Option<String>, GameError> {
        Err(refused())
    }

    async fn add_questions(
        &self,
        _category: Category,
        _level: Level,
        _texts: &[String],
    ) -> Result<u64, GameError> {
        Err(refused())
    }
}
