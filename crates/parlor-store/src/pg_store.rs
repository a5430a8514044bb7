//! `PostgreSQL` implementation of the store seams.
//!
//! All queries use the runtime API with explicit binds, so the crate
//! builds without a live database.

use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parlor_core::error::GameError;
use parlor_core::id::{SessionId, SurfaceRef, UserId};
use parlor_core::model::{
    ActionCategory, ActionRecord, ActionStatus, AskedQuestion, Category, ForcedQuestion, Level,
    Participant, Phase, Session, SessionKind, SessionRules, SessionStatus,
};
use parlor_core::store::{QuestionBank, SessionStore};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};

/// PostgreSQL-backed session store and question bank.
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Creates a `PgStore` over an existing pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Runs the embedded migrations.
    ///
    /// # Errors
    ///
    /// Returns `Storage` if a migration fails to apply.
    pub async fn migrate(&self) -> Result<(), GameError> {
        sqlx::migrate!("../../migrations")
            .run(&self.pool)
            .await
            .map_err(storage_err)
    }

    async fn load_participants(&self, id: SessionId) -> Result<Vec<Participant>, GameError> {
        let rows = sqlx::query(
            "SELECT user_id, name, joined_at, rerolls_left, skips, penalties, turns, active \
             FROM participants WHERE session_id = $1 ORDER BY joined_at ASC, seq ASC",
        )
        .bind(id.0)
        .fetch_all(&self.pool)
        .await
        .map_err(storage_err)?;
        rows.iter().map(participant_from_row).collect()
    }
}

fn storage_err(error: impl std::fmt::Display) -> GameError {
    GameError::Storage(error.to_string())
}

fn parse_column<T>(value: &str, column: &str) -> Result<T, GameError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value
        .parse()
        .map_err(|e| GameError::Storage(format!("corrupt {column} column: {e}")))
}

fn counter(value: i64, column: &str) -> Result<u32, GameError> {
    u32::try_from(value).map_err(|e| GameError::Storage(format!("corrupt {column} column: {e}")))
}

fn participant_from_row(row: &PgRow) -> Result<Participant, GameError> {
    Ok(Participant {
        user_id: UserId(row.try_get("user_id").map_err(storage_err)?),
        name: row.try_get("name").map_err(storage_err)?,
        joined_at: row.try_get("joined_at").map_err(storage_err)?,
        rerolls_left: counter(
            row.try_get("rerolls_left").map_err(storage_err)?,
            "rerolls_left",
        )?,
        skips: counter(row.try_get("skips").map_err(storage_err)?, "skips")?,
        penalties: counter(row.try_get("penalties").map_err(storage_err)?, "penalties")?,
        turns: counter(row.try_get("turns").map_err(storage_err)?, "turns")?,
        active: row.try_get("active").map_err(storage_err)?,
    })
}

fn session_from_row(row: &PgRow) -> Result<Session, GameError> {
    let kind: String = row.try_get("kind").map_err(storage_err)?;
    let status: String = row.try_get("status").map_err(storage_err)?;
    let phase: String = row.try_get("phase").map_err(storage_err)?;
    let turn_index: i64 = row.try_get("turn_index").map_err(storage_err)?;

    let last_q_text: Option<String> = row.try_get("last_q_text").map_err(storage_err)?;
    let last_q_category: Option<String> = row.try_get("last_q_category").map_err(storage_err)?;
    let last_q_level: Option<String> = row.try_get("last_q_level").map_err(storage_err)?;
    let last_q_by: Option<i64> = row.try_get("last_q_by").map_err(storage_err)?;
    let last_question = match (last_q_text, last_q_category, last_q_level, last_q_by) {
        (Some(text), Some(category), Some(level), Some(by)) => Some(AskedQuestion {
            text,
            category: parse_column::<Category>(&category, "last_q_category")?,
            level: parse_column::<Level>(&level, "last_q_level")?,
            asked_by: UserId(by),
        }),
        _ => None,
    };

    let surface: Option<String> = row.try_get("surface").map_err(storage_err)?;
    let created_at: DateTime<Utc> = row.try_get("created_at").map_err(storage_err)?;

    Ok(Session {
        id: SessionId(row.try_get("id").map_err(storage_err)?),
        kind: parse_column::<SessionKind>(&kind, "kind")?,
        status: parse_column::<SessionStatus>(&status, "status")?,
        owner: UserId(row.try_get("owner_id").map_err(storage_err)?),
        participants: Vec::new(),
        turn_index: usize::try_from(turn_index)
            .map_err(|e| GameError::Storage(format!("corrupt turn_index column: {e}")))?,
        phase: parse_column::<Phase>(&phase, "phase")?,
        rules: SessionRules {
            allow_mid_join: row.try_get("allow_mid_join").map_err(storage_err)?,
            show_previous_question: row
                .try_get("show_previous_question")
                .map_err(storage_err)?,
            allow_mature: row.try_get("allow_mature").map_err(storage_err)?,
        },
        last_question,
        surface: surface.map(SurfaceRef),
        created_at,
    })
}

fn action_from_row(row: &PgRow) -> Result<ActionRecord, GameError> {
    let category: String = row.try_get("category").map_err(storage_err)?;
    let level: String = row.try_get("level").map_err(storage_err)?;
    let status: String = row.try_get("status").map_err(storage_err)?;
    Ok(ActionRecord {
        session_id: SessionId(row.try_get("session_id").map_err(storage_err)?),
        actor: UserId(row.try_get("actor_id").map_err(storage_err)?),
        category: parse_column::<ActionCategory>(&category, "category")?,
        level: parse_column::<Level>(&level, "level")?,
        text: row.try_get("text").map_err(storage_err)?,
        status: parse_column::<ActionStatus>(&status, "status")?,
        recorded_at: row.try_get("recorded_at").map_err(storage_err)?,
    })
}

#[async_trait]
impl SessionStore for PgStore {
    async fn load_session(&self, id: SessionId) -> Result<Option<Session>, GameError> {
        let row = sqlx::query(
            "SELECT id, kind, status, owner_id, turn_index, phase, allow_mid_join, \
             show_previous_question, allow_mature, last_q_text, last_q_category, \
             last_q_level, last_q_by, surface, created_at \
             FROM sessions WHERE id = $1",
        )
        .bind(id.0)
        .fetch_optional(&self.pool)
        .await
        .map_err(storage_err)?;

        let Some(row) = row else {
            return Ok(None);
        };
        let mut session = session_from_row(&row)?;
        session.participants = self.load_participants(id).await?;
        Ok(Some(session))
    }

    async fn save_session(&self, session: &Session) -> Result<(), GameError> {
        let turn_index = i64::try_from(session.turn_index).map_err(storage_err)?;
        let last = session.last_question.as_ref();
        sqlx::query(
            "INSERT INTO sessions (id, kind, status, owner_id, turn_index, phase, \
             allow_mid_join, show_previous_question, allow_mature, last_q_text, \
             last_q_category, last_q_level, last_q_by, surface, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15) \
             ON CONFLICT (id) DO UPDATE SET \
             status = EXCLUDED.status, \
             turn_index = EXCLUDED.turn_index, \
             phase = EXCLUDED.phase, \
             allow_mid_join = EXCLUDED.allow_mid_join, \
             show_previous_question = EXCLUDED.show_previous_question, \
             allow_mature = EXCLUDED.allow_mature, \
             last_q_text = EXCLUDED.last_q_text, \
             last_q_category = EXCLUDED.last_q_category, \
             last_q_level = EXCLUDED.last_q_level, \
             last_q_by = EXCLUDED.last_q_by, \
             surface = EXCLUDED.surface",
        )
        .bind(session.id.0)
        .bind(session.kind.as_str())
        .bind(session.status.as_str())
        .bind(session.owner.0)
        .bind(turn_index)
        .bind(session.phase.as_str())
        .bind(session.rules.allow_mid_join)
        .bind(session.rules.show_previous_question)
        .bind(session.rules.allow_mature)
        .bind(last.map(|q| q.text.as_str()))
        .bind(last.map(|q| q.category.as_str()))
        .bind(last.map(|q| q.level.as_str()))
        .bind(last.map(|q| q.asked_by.0))
        .bind(session.surface.as_ref().map(|s| s.0.as_str()))
        .bind(session.created_at)
        .execute(&self.pool)
        .await
        .map_err(storage_err)?;
        Ok(())
    }

    async fn list_active_participants(
        &self,
        session_id: SessionId,
    ) -> Result<Vec<Participant>, GameError> {
        let rows = sqlx::query(
            "SELECT user_id, name, joined_at, rerolls_left, skips, penalties, turns, active \
             FROM participants WHERE session_id = $1 AND active \
             ORDER BY joined_at ASC, seq ASC",
        )
        .bind(session_id.0)
        .fetch_all(&self.pool)
        .await
        .map_err(storage_err)?;
        rows.iter().map(participant_from_row).collect()
    }

    async fn upsert_participant(
        &self,
        session_id: SessionId,
        participant: &Participant,
    ) -> Result<(), GameError> {
        sqlx::query(
            "INSERT INTO participants (session_id, user_id, name, joined_at, rerolls_left, \
             skips, penalties, turns, active) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) \
             ON CONFLICT (session_id, user_id) DO UPDATE SET \
             name = EXCLUDED.name, \
             rerolls_left = EXCLUDED.rerolls_left, \
             skips = EXCLUDED.skips, \
             penalties = EXCLUDED.penalties, \
             turns = EXCLUDED.turns, \
             active = EXCLUDED.active",
        )
        .bind(session_id.0)
        .bind(participant.user_id.0)
        .bind(&participant.name)
        .bind(participant.joined_at)
        .bind(i64::from(participant.rerolls_left))
        .bind(i64::from(participant.skips))
        .bind(i64::from(participant.penalties))
        .bind(i64::from(participant.turns))
        .bind(participant.active)
        .execute(&self.pool)
        .await
        .map_err(storage_err)?;
        Ok(())
    }

    async fn append_action(&self, action: &ActionRecord) -> Result<(), GameError> {
        sqlx::query(
            "INSERT INTO actions (session_id, actor_id, category, level, text, status, \
             recorded_at) VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(action.session_id.0)
        .bind(action.actor.0)
        .bind(action.category.as_str())
        .bind(action.level.as_str())
        .bind(&action.text)
        .bind(action.status.as_str())
        .bind(action.recorded_at)
        .execute(&self.pool)
        .await
        .map_err(storage_err)?;
        Ok(())
    }

    async fn last_action(
        &self,
        session_id: SessionId,
    ) -> Result<Option<ActionRecord>, GameError> {
        let row = sqlx::query(
            "SELECT session_id, actor_id, category, level, text, status, recorded_at \
             FROM actions WHERE session_id = $1 ORDER BY id DESC LIMIT 1",
        )
        .bind(session_id.0)
        .fetch_optional(&self.pool)
        .await
        .map_err(storage_err)?;
        row.as_ref().map(action_from_row).transpose()
    }

    async fn update_last_action_status(
        &self,
        session_id: SessionId,
        status: ActionStatus,
    ) -> Result<(), GameError> {
        sqlx::query(
            "UPDATE actions SET status = $2 WHERE id = \
             (SELECT id FROM actions WHERE session_id = $1 ORDER BY id DESC LIMIT 1)",
        )
        .bind(session_id.0)
        .bind(status.as_str())
        .execute(&self.pool)
        .await
        .map_err(storage_err)?;
        Ok(())
    }

    async fn update_surface(
        &self,
        session_id: SessionId,
        surface: &SurfaceRef,
    ) -> Result<(), GameError> {
        sqlx::query("UPDATE sessions SET surface = $2 WHERE id = $1")
            .bind(session_id.0)
            .bind(surface.0.as_str())
            .execute(&self.pool)
            .await
            .map_err(storage_err)?;
        Ok(())
    }
}

#[async_trait]
impl QuestionBank for PgStore {
    async fn pick_random_eligible(
        &self,
        category: Category,
        level: Level,
    ) -> Result<Option<String>, GameError> {
        let row = sqlx::query(
            "SELECT text FROM questions WHERE enabled AND category = $1 AND level = $2 \
             ORDER BY random() LIMIT 1",
        )
        .bind(category.as_str())
        .bind(level.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(storage_err)?;
        row.map(|r| r.try_get("text").map_err(storage_err)).transpose()
    }

    async fn enqueue_forced(&self, forced: &ForcedQuestion) -> Result<(), GameError> {
        sqlx::query(
            "INSERT INTO forced_questions (session_id, target_id, category, level, text, \
             enqueued_at) VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(forced.session_id.0)
        .bind(forced.target.0)
        .bind(forced.category.map(|c| c.as_str()))
        .bind(forced.level.map(|l| l.as_str()))
        .bind(&forced.text)
        .bind(forced.enqueued_at)
        .execute(&self.pool)
        .await
        .map_err(storage_err)?;
        Ok(())
    }

    async fn pop_forced(
        &self,
        session_id: SessionId,
        target: UserId,
        category: Category,
        level: Level,
    ) -> Result<Option<String>, GameError> {
        // Single-statement delete-and-return keeps consumption atomic: an
        // override can never be served twice.
        let row = sqlx::query(
            "DELETE FROM forced_questions WHERE id = \
             (SELECT id FROM forced_questions \
              WHERE session_id = $1 AND target_id = $2 \
                AND (category IS NULL OR category = $3) \
                AND (level IS NULL OR level = $4) \
              ORDER BY id ASC LIMIT 1 FOR UPDATE SKIP LOCKED) \
             RETURNING text",
        )
        .bind(session_id.0)
        .bind(target.0)
        .bind(category.as_str())
        .bind(level.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(storage_err)?;
        row.map(|r| r.try_get("text").map_err(storage_err)).transpose()
    }

    async fn add_questions(
        &self,
        category: Category,
        level: Level,
        texts: &[String],
    ) -> Result<u64, GameError> {
        let mut tx = self.pool.begin().await.map_err(storage_err)?;
        let mut inserted = 0;
        for text in texts {
            let result =
                sqlx::query("INSERT INTO questions (category, level, text) VALUES ($1, $2, $3)")
                    .bind(category.as_str())
                    .bind(level.as_str())
                    .bind(text)
                    .execute(&mut *tx)
                    .await
                    .map_err(storage_err)?;
            inserted += result.rows_affected();
        }
        tx.commit().await.map_err(storage_err)?;
        Ok(inserted)
    }
}
