//! The result contract the turn engine consumes: which move fired, at
//! what confidence, with what captured slot text, and how it was found.

use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Stage {
    Lexical,
    Embedding,
    Llm,
}

#[derive(Debug, Clone)]
pub struct Provenance {
    pub stage: Stage,
    /// The trigger pattern text that produced the winning score, when the
    /// stage is pattern-based (lexical/embedding). `None` for an LLM verdict
    /// that scored the move as a whole rather than one trigger.
    pub pattern_raw: Option<String>,
}

#[derive(Debug, Clone)]
pub struct MatchResult {
    pub move_id: String,
    pub score: f32,
    pub captures: HashMap<String, String>,
    pub provenance: Provenance,
}

#[derive(Debug, thiserror::Error)]
pub enum MatchError {
    #[error("llm scoring failed: {0}")]
    Llm(String),
}
