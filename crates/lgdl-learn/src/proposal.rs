//! What the analyzer produces: a proposed change to a game's matching
//! surface, always born `Pending` and never self-promoting.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum Proposal {
    /// A phrase that repeatedly led to this move executing successfully,
    /// but isn't one of its declared triggers yet.
    PatternAddition {
        move_id: String,
        pattern: String,
        occurrence_count: i64,
        avg_confidence: f32,
    },
    /// A phrase repeatedly confused between two moves - surfaced for a
    /// reviewer to decide which (if either) should absorb it.
    ConfusionPair {
        matched_move: String,
        actual_move: String,
        confusion_count: i64,
        example_inputs: Vec<String>,
    },
    /// A term that should be added to a game's vocabulary/synonym table.
    VocabularyAddition { term: String, synonyms: Vec<String> },
    /// A bounded nudge to a move's confidence threshold, derived from
    /// repeated negotiation outcomes. Magnitude is clamped to ±0.05 at
    /// construction time; see [`ConfidenceAdjustment::new`].
    ConfidenceAdjustment { move_id: String, delta: f32 },
}

/// Largest confidence nudge a single interaction may propose.
pub const MAX_CONFIDENCE_DELTA: f32 = 0.05;

impl Proposal {
    pub fn confidence_adjustment(move_id: impl Into<String>, delta: f32) -> Self {
        Proposal::ConfidenceAdjustment {
            move_id: move_id.into(),
            delta: delta.clamp(-MAX_CONFIDENCE_DELTA, MAX_CONFIDENCE_DELTA),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ProposalStatus {
    Pending,
    /// Approved by a named human reviewer; the caller is responsible for
    /// actually applying the change to the IR - this crate never does.
    Approved { reviewer_id: String },
    Rejected { reviewer_id: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingProposal {
    pub id: Uuid,
    pub game_id: String,
    pub proposal: Proposal,
    pub status: ProposalStatus,
    pub created_at: DateTime<Utc>,
}
