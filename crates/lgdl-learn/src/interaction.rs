//! What the turn engine hands to the learning engine after every turn.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    /// The matched move's actions ran and the conversation moved on.
    Executed,
    /// The user's clarification reply pointed at a different move than the
    /// one that was initially locked in.
    Corrected,
    /// Negotiation gave up, or the user dropped the conversation mid-turn.
    Abandoned,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NegotiationMetadata {
    pub rounds: usize,
    pub initial_score: f32,
    pub final_score: f32,
}

/// One completed turn, read-only input to the learning engine. Never
/// consumed by anything on the live matching path.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Interaction {
    pub conversation_id: uuid::Uuid,
    pub game_id: String,
    pub user_input: String,
    pub matched_move: Option<String>,
    pub confidence: f32,
    pub outcome: Outcome,
    pub negotiation_metadata: Option<NegotiationMetadata>,
    pub recorded_at: DateTime<Utc>,
}
