//! The `StateStore` contract. One trait, two backends: an in-memory one
//! for tests and single-process deployments, and a Postgres one
//! (`postgres::PgStateStore`) via `sqlx` for everything else - the same
//! shape as the `SnapshotStore`/`ChangesetStore` port traits, each with
//! an in-memory and a Postgres implementation behind one interface.

use crate::error::StateError;
use crate::model::{Conversation, ExtractedContext, NewTurn, PendingState, SlotValue, Turn};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use uuid::Uuid;

#[async_trait]
pub trait StateStore: Send + Sync {
    /// Idempotent: returns the existing conversation if `id` is already
    /// known, otherwise creates it.
    async fn get_or_create_conversation(
        &self,
        id: Uuid,
        game_id: &str,
    ) -> Result<Conversation, StateError>;

    async fn get_conversation(&self, id: Uuid) -> Result<Option<Conversation>, StateError>;

    /// Appends a turn, assigning it the next strictly-increasing
    /// `turn_num` for this conversation. Calls for the same conversation
    /// serialize against each other so two concurrent turns can never be
    /// assigned the same number.
    async fn save_turn(&self, conversation_id: Uuid, turn: NewTurn) -> Result<Turn, StateError>;

    async fn list_turns(&self, conversation_id: Uuid) -> Result<Vec<Turn>, StateError>;

    async fn upsert_slot(
        &self,
        conversation_id: Uuid,
        slot_name: &str,
        value: Value,
    ) -> Result<(), StateError>;

    async fn get_slots(
        &self,
        conversation_id: Uuid,
    ) -> Result<HashMap<String, SlotValue>, StateError>;

    /// Atomically clears every slot for the conversation, used when a
    /// move's action block completes and its slots should not leak into
    /// the next move.
    async fn clear_slots(&self, conversation_id: Uuid) -> Result<(), StateError>;

    async fn record_context(
        &self,
        conversation_id: Uuid,
        key: &str,
        value: Value,
        source: &str,
    ) -> Result<(), StateError>;

    async fn get_context(&self, conversation_id: Uuid) -> Result<Vec<ExtractedContext>, StateError>;

    async fn set_status(
        &self,
        conversation_id: Uuid,
        status: crate::model::ConversationStatus,
    ) -> Result<(), StateError>;

    /// Applies a turn's effect on what the conversation is waiting for
    /// next - which move is mid-negotiation, whether the last response
    /// was a question, which slot is being awaited. Called alongside
    /// `save_turn` so a conversation's turn history and its pending
    /// state never drift apart.
    async fn set_pending_state(
        &self,
        conversation_id: Uuid,
        state: PendingState,
    ) -> Result<(), StateError>;

    /// Deletes the conversation and every turn/slot/context row that
    /// belongs to it.
    async fn delete_conversation(&self, id: Uuid) -> Result<(), StateError>;
}
