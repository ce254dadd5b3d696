//! Conversation/turn/slot/context records persisted by the state store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conversation {
    pub id: Uuid,
    pub game_id: String,
    pub status: ConversationStatus,
    /// Move currently being negotiated/slot-filled, if any. `None` means
    /// the conversation is between moves and the next turn starts a fresh
    /// match.
    pub current_move_state: Option<String>,
    /// Set once a response ends in a question; the next turn's router
    /// checks this before running the cascade matcher at all.
    pub awaiting_response: bool,
    pub last_question: Option<String>,
    pub awaiting_slot_for_move: Option<String>,
    pub awaiting_slot_name: Option<String>,
    pub metadata: Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConversationStatus {
    Active,
    Completed,
    Abandoned,
}

/// What a turn actually did, independent of match confidence - a move can
/// match confidently and still fail at the action stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnOutcome {
    Success,
    Failure,
    Unknown,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Turn {
    pub conversation_id: Uuid,
    pub turn_num: i64,
    pub user_input: String,
    /// `user_input` after the input firewall has run; this, not the raw
    /// text, is what actually gets matched against.
    pub sanitized_input: String,
    pub matched_move: Option<String>,
    pub confidence: Option<f32>,
    pub response: Option<String>,
    pub extracted_params: Value,
    pub outcome: TurnOutcome,
    pub created_at: DateTime<Utc>,
}

/// What the engine hands the store to persist a turn; `turn_num` is
/// assigned by the store, not the caller, so two concurrent callers can
/// never race to claim the same number.
#[derive(Debug, Clone)]
pub struct NewTurn {
    pub user_input: String,
    pub sanitized_input: String,
    pub matched_move: Option<String>,
    pub confidence: Option<f32>,
    pub response: Option<String>,
    pub extracted_params: Value,
    pub outcome: TurnOutcome,
}

/// What a turn changes about the conversation's pending state, applied
/// atomically alongside the turn that produced it. `None` clears a field
/// back to "not waiting on anything"; `Some` sets it.
#[derive(Debug, Clone, Default)]
pub struct PendingState {
    pub current_move_state: Option<String>,
    pub awaiting_response: bool,
    pub last_question: Option<String>,
    pub awaiting_slot_for_move: Option<String>,
    pub awaiting_slot_name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlotValue {
    pub slot_name: String,
    pub value: Value,
    pub filled_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractedContext {
    pub key: String,
    pub value: Value,
    pub source: String,
    pub recorded_at: DateTime<Utc>,
}
