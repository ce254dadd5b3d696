//! The cascade matcher: lexical regex matching, then embedding
//! similarity, then an optional LLM tie-breaker, each stage a more
//! expensive fallback for utterances the previous one couldn't resolve
//! confidently.

mod cascade;
mod lexical;
mod llm;
mod types;

pub use cascade::{CascadeMatcher, DEFAULT_LLM_BUDGET_PER_TURN, EMBEDDING_CUTOFF, GLOBAL_BEST};
pub use lexical::LEXICAL_SHORT_CIRCUIT;
pub use llm::{LlmCandidate, LlmProvider, NullLlmProvider};
pub use types::{MatchError, MatchResult, Provenance, Stage};
