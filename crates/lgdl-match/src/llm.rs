//! Stage 3: an optional LLM-backed semantic tie-breaker, gated by a
//! per-turn cost budget so a flood of ambiguous input can't run up an
//! unbounded bill.

use crate::types::MatchError;
use async_trait::async_trait;

pub struct LlmCandidate {
    pub move_id: String,
    pub pattern_raw: String,
}

#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Score each candidate against the utterance, returned in the same
    /// order as `candidates`.
    async fn score(
        &self,
        utterance: &str,
        candidates: &[LlmCandidate],
    ) -> Result<Vec<f32>, MatchError>;

    /// Cost of one `score` call in the same unit as the per-turn budget
    /// (USD, by convention - see `RuntimeConfig::llm_budget_per_turn`).
    fn cost_per_call(&self) -> f32;
}

/// No LLM configured: always declines rather than fabricating a score.
/// Matching then falls back to whatever the lexical/embedding stages
/// found, or no match at all.
pub struct NullLlmProvider;

#[async_trait]
impl LlmProvider for NullLlmProvider {
    async fn score(
        &self,
        _utterance: &str,
        candidates: &[LlmCandidate],
    ) -> Result<Vec<f32>, MatchError> {
        Ok(vec![0.0; candidates.len()])
    }

    fn cost_per_call(&self) -> f32 {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn null_provider_declines_every_candidate() {
        let provider = NullLlmProvider;
        let candidates = vec![LlmCandidate {
            move_id: "m1".to_string(),
            pattern_raw: "hello {name}".to_string(),
        }];
        let scores = provider.score("hello there", &candidates).await.unwrap();
        assert_eq!(scores, vec![0.0]);
    }
}
