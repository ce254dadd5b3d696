//! Postgres-backed `StateStore`. Mirrors the `WorkflowRepository`
//! wrapping a `PgPool` elsewhere in this stack: runtime `sqlx::query_as`
//! rather than the `query!` macro, so the crate builds without a live
//! `DATABASE_URL`. Schema:
//!
//! ```sql
//! CREATE TABLE conversations (
//!     id uuid PRIMARY KEY,
//!     game_id text NOT NULL,
//!     status text NOT NULL,
//!     current_move_state text,
//!     awaiting_response boolean NOT NULL DEFAULT false,
//!     last_question text,
//!     awaiting_slot_for_move text,
//!     awaiting_slot_name text,
//!     metadata jsonb NOT NULL DEFAULT '{}',
//!     created_at timestamptz NOT NULL,
//!     updated_at timestamptz NOT NULL
//! );
//! CREATE TABLE turns (
//!     conversation_id uuid NOT NULL REFERENCES conversations(id) ON DELETE CASCADE,
//!     turn_num bigint NOT NULL,
//!     user_input text NOT NULL,
//!     sanitized_input text NOT NULL,
//!     matched_move text,
//!     confidence real,
//!     response text,
//!     extracted_params jsonb NOT NULL DEFAULT '{}',
//!     outcome text NOT NULL,
//!     created_at timestamptz NOT NULL,
//!     PRIMARY KEY (conversation_id, turn_num)
//! );
//! CREATE TABLE slot_values (
//!     conversation_id uuid NOT NULL REFERENCES conversations(id) ON DELETE CASCADE,
//!     slot_name text NOT NULL,
//!     value jsonb NOT NULL,
//!     filled_at timestamptz NOT NULL,
//!     PRIMARY KEY (conversation_id, slot_name)
//! );
//! CREATE TABLE extracted_context (
//!     conversation_id uuid NOT NULL REFERENCES conversations(id) ON DELETE CASCADE,
//!     key text NOT NULL,
//!     value jsonb NOT NULL,
//!     source text NOT NULL,
//!     recorded_at timestamptz NOT NULL
//! );
//! CREATE INDEX turns_by_conversation ON turns (conversation_id, turn_num DESC);
//! CREATE INDEX context_by_conversation ON extracted_context (conversation_id, recorded_at DESC);
//! ```

use crate::error::StateError;
use crate::model::{
    Conversation, ConversationStatus, ExtractedContext, NewTurn, PendingState, SlotValue, Turn,
    TurnOutcome,
};
use crate::store::StateStore;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::{PgPool, Row};
use std::collections::HashMap;
use uuid::Uuid;

pub struct PgStateStore {
    pool: PgPool,
}

impl PgStateStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn status_str(status: ConversationStatus) -> &'static str {
    match status {
        ConversationStatus::Active => "active",
        ConversationStatus::Completed => "completed",
        ConversationStatus::Abandoned => "abandoned",
    }
}

fn status_from_str(s: &str) -> ConversationStatus {
    match s {
        "completed" => ConversationStatus::Completed,
        "abandoned" => ConversationStatus::Abandoned,
        _ => ConversationStatus::Active,
    }
}

fn outcome_str(outcome: TurnOutcome) -> &'static str {
    match outcome {
        TurnOutcome::Success => "success",
        TurnOutcome::Failure => "failure",
        TurnOutcome::Unknown => "unknown",
    }
}

fn outcome_from_str(s: &str) -> TurnOutcome {
    match s {
        "success" => TurnOutcome::Success,
        "failure" => TurnOutcome::Failure,
        _ => TurnOutcome::Unknown,
    }
}

fn conversation_from_row(row: sqlx::postgres::PgRow) -> Conversation {
    Conversation {
        id: row.get("id"),
        game_id: row.get("game_id"),
        status: status_from_str(row.get::<String, _>("status").as_str()),
        current_move_state: row.get("current_move_state"),
        awaiting_response: row.get("awaiting_response"),
        last_question: row.get("last_question"),
        awaiting_slot_for_move: row.get("awaiting_slot_for_move"),
        awaiting_slot_name: row.get("awaiting_slot_name"),
        metadata: row.get("metadata"),
        created_at: row.get::<DateTime<Utc>, _>("created_at"),
        updated_at: row.get::<DateTime<Utc>, _>("updated_at"),
    }
}

const CONVERSATION_COLUMNS: &str = "id, game_id, status, current_move_state, awaiting_response, \
     last_question, awaiting_slot_for_move, awaiting_slot_name, metadata, created_at, updated_at";

#[async_trait]
impl StateStore for PgStateStore {
    async fn get_or_create_conversation(
        &self,
        id: Uuid,
        game_id: &str,
    ) -> Result<Conversation, StateError> {
        if let Some(existing) = self.get_conversation(id).await? {
            return Ok(existing);
        }

        let now = Utc::now();
        sqlx::query(
            r#"
            INSERT INTO conversations (id, game_id, status, metadata, created_at, updated_at)
            VALUES ($1, $2, $3, '{}'::jsonb, $4, $4)
            ON CONFLICT (id) DO NOTHING
            "#,
        )
        .bind(id)
        .bind(game_id)
        .bind(status_str(ConversationStatus::Active))
        .bind(now)
        .execute(&self.pool)
        .await?;

        self.get_conversation(id)
            .await?
            .ok_or(StateError::NotFound(id))
    }

    async fn get_conversation(&self, id: Uuid) -> Result<Option<Conversation>, StateError> {
        let row = sqlx::query(&format!(
            "SELECT {CONVERSATION_COLUMNS} FROM conversations WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(conversation_from_row))
    }

    async fn save_turn(&self, conversation_id: Uuid, turn: NewTurn) -> Result<Turn, StateError> {
        let mut tx = self.pool.begin().await?;

        let next_num: i64 = sqlx::query(
            "SELECT COALESCE(MAX(turn_num), 0) + 1 AS next FROM turns WHERE conversation_id = $1 FOR UPDATE",
        )
        .bind(conversation_id)
        .fetch_one(&mut *tx)
        .await?
        .get("next");

        let created_at = Utc::now();
        sqlx::query(
            r#"
            INSERT INTO turns (conversation_id, turn_num, user_input, sanitized_input,
                                matched_move, confidence, response, extracted_params,
                                outcome, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(conversation_id)
        .bind(next_num)
        .bind(&turn.user_input)
        .bind(&turn.sanitized_input)
        .bind(&turn.matched_move)
        .bind(turn.confidence)
        .bind(&turn.response)
        .bind(&turn.extracted_params)
        .bind(outcome_str(turn.outcome))
        .bind(created_at)
        .execute(&mut *tx)
        .await?;

        sqlx::query("UPDATE conversations SET updated_at = $2 WHERE id = $1")
            .bind(conversation_id)
            .bind(created_at)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        Ok(Turn {
            conversation_id,
            turn_num: next_num,
            user_input: turn.user_input,
            sanitized_input: turn.sanitized_input,
            matched_move: turn.matched_move,
            confidence: turn.confidence,
            response: turn.response,
            extracted_params: turn.extracted_params,
            outcome: turn.outcome,
            created_at,
        })
    }

    async fn list_turns(&self, conversation_id: Uuid) -> Result<Vec<Turn>, StateError> {
        let rows = sqlx::query(
            "SELECT conversation_id, turn_num, user_input, sanitized_input, matched_move, \
             confidence, response, extracted_params, outcome, created_at \
             FROM turns WHERE conversation_id = $1 ORDER BY turn_num ASC",
        )
        .bind(conversation_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| Turn {
                conversation_id: row.get("conversation_id"),
                turn_num: row.get("turn_num"),
                user_input: row.get("user_input"),
                sanitized_input: row.get("sanitized_input"),
                matched_move: row.get("matched_move"),
                confidence: row.get("confidence"),
                response: row.get("response"),
                extracted_params: row.get("extracted_params"),
                outcome: outcome_from_str(row.get::<String, _>("outcome").as_str()),
                created_at: row.get("created_at"),
            })
            .collect())
    }

    async fn upsert_slot(
        &self,
        conversation_id: Uuid,
        slot_name: &str,
        value: Value,
    ) -> Result<(), StateError> {
        sqlx::query(
            r#"
            INSERT INTO slot_values (conversation_id, slot_name, value, filled_at)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (conversation_id, slot_name)
            DO UPDATE SET value = $3, filled_at = $4
            "#,
        )
        .bind(conversation_id)
        .bind(slot_name)
        .bind(&value)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_slots(
        &self,
        conversation_id: Uuid,
    ) -> Result<HashMap<String, SlotValue>, StateError> {
        let rows = sqlx::query(
            "SELECT slot_name, value, filled_at FROM slot_values WHERE conversation_id = $1",
        )
        .bind(conversation_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| {
                let slot_name: String = row.get("slot_name");
                (
                    slot_name.clone(),
                    SlotValue {
                        slot_name,
                        value: row.get("value"),
                        filled_at: row.get("filled_at"),
                    },
                )
            })
            .collect())
    }

    async fn clear_slots(&self, conversation_id: Uuid) -> Result<(), StateError> {
        sqlx::query("DELETE FROM slot_values WHERE conversation_id = $1")
            .bind(conversation_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn record_context(
        &self,
        conversation_id: Uuid,
        key: &str,
        value: Value,
        source: &str,
    ) -> Result<(), StateError> {
        sqlx::query(
            r#"
            INSERT INTO extracted_context (conversation_id, key, value, source, recorded_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(conversation_id)
        .bind(key)
        .bind(&value)
        .bind(source)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_context(&self, conversation_id: Uuid) -> Result<Vec<ExtractedContext>, StateError> {
        let rows = sqlx::query(
            "SELECT key, value, source, recorded_at FROM extracted_context \
             WHERE conversation_id = $1 ORDER BY recorded_at ASC",
        )
        .bind(conversation_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| ExtractedContext {
                key: row.get("key"),
                value: row.get("value"),
                source: row.get("source"),
                recorded_at: row.get("recorded_at"),
            })
            .collect())
    }

    async fn set_status(
        &self,
        conversation_id: Uuid,
        status: ConversationStatus,
    ) -> Result<(), StateError> {
        sqlx::query("UPDATE conversations SET status = $2, updated_at = $3 WHERE id = $1")
            .bind(conversation_id)
            .bind(status_str(status))
            .bind(Utc::now())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn set_pending_state(
        &self,
        conversation_id: Uuid,
        state: PendingState,
    ) -> Result<(), StateError> {
        sqlx::query(
            r#"
            UPDATE conversations
            SET current_move_state = $2,
                awaiting_response = $3,
                last_question = $4,
                awaiting_slot_for_move = $5,
                awaiting_slot_name = $6,
                updated_at = $7
            WHERE id = $1
            "#,
        )
        .bind(conversation_id)
        .bind(&state.current_move_state)
        .bind(state.awaiting_response)
        .bind(&state.last_question)
        .bind(&state.awaiting_slot_for_move)
        .bind(&state.awaiting_slot_name)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn delete_conversation(&self, id: Uuid) -> Result<(), StateError> {
        // turns/slot_values/extracted_context cascade via ON DELETE CASCADE.
        sqlx::query("DELETE FROM conversations WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
