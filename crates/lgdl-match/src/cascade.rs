//! The three-stage cascade: lexical, then embedding, then LLM, each a
//! strictly more expensive fallback for utterances the cheaper stage
//! couldn't resolve with confidence. Mirrors the exact-match -> semantic
//! -> phonetic fallback order in `SemanticMatcher::find_match`,
//! generalized to a pluggable LLM tier and per-move thresholds instead of
//! one global one.

use crate::lexical::{best_lexical_hit, LEXICAL_SHORT_CIRCUIT};
use crate::llm::{LlmCandidate, LlmProvider, NullLlmProvider};
use crate::types::{MatchResult, Provenance, Stage};
use lgdl_embed::{CacheKey, EmbeddingProvider, VectorCache};
use lgdl_ir::Game;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

pub const EMBEDDING_CUTOFF: f32 = 0.80;
pub const GLOBAL_BEST: f32 = 0.90;
pub const DEFAULT_LLM_BUDGET_PER_TURN: f32 = 0.01;

struct Candidate {
    move_index: usize,
    move_id: String,
    stage: Stage,
    score: f32,
    captures: HashMap<String, String>,
    pattern_raw: Option<String>,
}

pub struct CascadeMatcher {
    embedder: Arc<dyn EmbeddingProvider>,
    cache: Arc<VectorCache>,
    llm: Arc<dyn LlmProvider>,
}

impl CascadeMatcher {
    pub fn new(embedder: Arc<dyn EmbeddingProvider>, cache: Arc<VectorCache>) -> Self {
        Self {
            embedder,
            cache,
            llm: Arc::new(NullLlmProvider),
        }
    }

    pub fn with_llm(mut self, llm: Arc<dyn LlmProvider>) -> Self {
        self.llm = llm;
        self
    }

    fn embed_cached(&self, text: &str, is_query: bool) -> Vec<f32> {
        let key = CacheKey::new(text, self.embedder.model_name(), self.embedder.model_version());
        if let Some(cached) = self.cache.get(&key) {
            return cached;
        }
        let vector = if is_query {
            self.embedder.embed_query(text)
        } else {
            self.embedder.embed_target(text)
        };
        let _ = self.cache.put(key, vector.clone());
        vector
    }

    /// Try to resolve `utterance` against one of `game`'s moves.
    ///
    /// `llm_budget_remaining` is decremented in place when the LLM stage
    /// actually runs; callers thread the same counter across a turn so a
    /// single turn never spends more than its allotted budget even if
    /// multiple games or candidates are considered.
    pub async fn match_utterance(
        &self,
        game: &Game,
        utterance: &str,
        llm_budget_remaining: &mut f32,
    ) -> Option<MatchResult> {
        let mut pool: Vec<Candidate> = Vec::new();

        // Stage 1: lexical.
        for (idx, mv) in game.moves.iter().enumerate() {
            if let Some(hit) = best_lexical_hit(mv, utterance) {
                pool.push(Candidate {
                    move_index: idx,
                    move_id: mv.id.clone(),
                    stage: Stage::Lexical,
                    score: hit.score,
                    captures: hit.captures,
                    pattern_raw: Some(hit.pattern_raw),
                });
            }
        }

        if let Some(result) = pick_if_qualifying(game, &pool, LEXICAL_SHORT_CIRCUIT) {
            debug!(move_id = %result.move_id, score = result.score, "lexical short-circuit");
            return Some(result);
        }

        // Stage 2: embedding.
        let utterance_vec = self.embed_cached(utterance, true);
        for (idx, mv) in game.moves.iter().enumerate() {
            let mut best: Option<(f32, &str)> = None;
            for pattern in &mv.triggers {
                let target_vec = self.embed_cached(&pattern.raw, false);
                let score = lgdl_embed::cosine_similarity(&utterance_vec, &target_vec);
                if best.map(|(b, _)| score > b).unwrap_or(true) {
                    best = Some((score, pattern.raw.as_str()));
                }
            }
            if let Some((score, pattern_raw)) = best {
                pool.push(Candidate {
                    move_index: idx,
                    move_id: mv.id.clone(),
                    stage: Stage::Embedding,
                    score,
                    captures: HashMap::new(),
                    pattern_raw: Some(pattern_raw.to_string()),
                });
            }
        }

        if let Some(result) = pick_if_qualifying(game, &pool, EMBEDDING_CUTOFF) {
            debug!(move_id = %result.move_id, score = result.score, "embedding short-circuit");
            return Some(result);
        }

        let raw_best_embedding = pool
            .iter()
            .filter(|c| c.stage == Stage::Embedding)
            .map(|c| c.score)
            .fold(f32::MIN, f32::max);
        if raw_best_embedding >= EMBEDDING_CUTOFF {
            debug!(score = raw_best_embedding, "embedding cutoff reached, skipping llm stage");
            return None;
        }

        // Stage 3: LLM, gated by the per-turn budget.
        let cost = self.llm.cost_per_call();
        if cost <= *llm_budget_remaining && !game.moves.is_empty() {
            let llm_candidates: Vec<LlmCandidate> = game
                .moves
                .iter()
                .flat_map(|mv| {
                    mv.triggers.iter().map(|p| LlmCandidate {
                        move_id: mv.id.clone(),
                        pattern_raw: p.raw.clone(),
                    })
                })
                .collect();

            if !llm_candidates.is_empty() {
                if let Ok(scores) = self.llm.score(utterance, &llm_candidates).await {
                    *llm_budget_remaining -= cost;
                    let mut flat_idx = 0;
                    for (idx, mv) in game.moves.iter().enumerate() {
                        for pattern in &mv.triggers {
                            if let Some(score) = scores.get(flat_idx).copied() {
                                pool.push(Candidate {
                                    move_index: idx,
                                    move_id: mv.id.clone(),
                                    stage: Stage::Llm,
                                    score,
                                    captures: HashMap::new(),
                                    pattern_raw: Some(pattern.raw.clone()),
                                });
                            }
                            flat_idx += 1;
                        }
                    }
                }
            }
        }

        pick_if_qualifying(game, &pool, GLOBAL_BEST)
    }
}

/// Among candidates at or above `floor_score`, pick the one that also
/// clears its move's declared threshold, breaking ties by score then
/// declaration order then earliest-reached stage.
fn pick_if_qualifying(game: &Game, pool: &[Candidate], floor_score: f32) -> Option<MatchResult> {
    let mut best: Option<&Candidate> = None;
    for candidate in pool {
        if candidate.score < floor_score {
            continue;
        }
        let Some(mv) = game.moves.get(candidate.move_index) else {
            continue;
        };
        if candidate.score < mv.threshold {
            continue;
        }
        best = Some(match best {
            None => candidate,
            Some(current) => pick_better(current, candidate),
        });
    }
    best.map(|c| MatchResult {
        move_id: c.move_id.clone(),
        score: c.score,
        captures: c.captures.clone(),
        provenance: Provenance {
            stage: c.stage,
            pattern_raw: c.pattern_raw.clone(),
        },
    })
}

fn pick_better<'a>(a: &'a Candidate, b: &'a Candidate) -> &'a Candidate {
    if b.score > a.score {
        return b;
    }
    if b.score < a.score {
        return a;
    }
    if b.move_index != a.move_index {
        return if b.move_index < a.move_index { b } else { a };
    }
    if b.stage < a.stage {
        b
    } else {
        a
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lgdl_ast::parse_game;
    use lgdl_embed::OfflineVectorizer;
    use lgdl_ir::compile_game;

    const GAME: &str = r#"
id: demo
name: Demo
version: "1"
moves:
  - id: greet
    threshold: medium
    triggers:
      - pattern:
          raw: "hello there"
        modifiers: []
  - id: farewell
    threshold: medium
    triggers:
      - pattern:
          raw: "goodbye for now"
        modifiers: []
"#;

    fn matcher() -> CascadeMatcher {
        CascadeMatcher::new(Arc::new(OfflineVectorizer::new()), Arc::new(VectorCache::in_memory()))
    }

    #[tokio::test]
    async fn lexical_stage_resolves_near_exact_text() {
        let ast = parse_game(GAME).unwrap();
        let game = compile_game(&ast).unwrap();
        let mut budget = DEFAULT_LLM_BUDGET_PER_TURN;
        let result = matcher()
            .match_utterance(&game, "hello there", &mut budget)
            .await
            .unwrap();
        assert_eq!(result.move_id, "greet");
        assert_eq!(result.provenance.stage, Stage::Lexical);
    }

    #[tokio::test]
    async fn unrelated_utterance_does_not_match() {
        let ast = parse_game(GAME).unwrap();
        let game = compile_game(&ast).unwrap();
        let mut budget = DEFAULT_LLM_BUDGET_PER_TURN;
        let result = matcher()
            .match_utterance(&game, "what time is my flight", &mut budget)
            .await;
        assert!(result.is_none());
    }

    const CRITICAL_GAME: &str = r#"
id: demo
name: Demo
version: "1"
moves:
  - id: book
    threshold: critical
    triggers:
      - pattern:
          raw: "book a flight to paris"
        modifiers: []
"#;

    #[tokio::test]
    async fn llm_stage_does_not_run_once_raw_embedding_score_clears_cutoff() {
        let ast = parse_game(CRITICAL_GAME).unwrap();
        let game = compile_game(&ast).unwrap();
        let mut budget = DEFAULT_LLM_BUDGET_PER_TURN;
        // The embedding stage alone will clear EMBEDDING_CUTOFF for an
        // utterance this close to the trigger text, but the move's own
        // `critical` threshold (0.95) won't be met by embedding score
        // alone - the cascade must still refuse to fall through to the
        // LLM stage once the raw embedding score clears the cutoff.
        let result = matcher()
            .match_utterance(&game, "book a flight to paris please", &mut budget)
            .await;
        assert!(result.is_none());
        // Budget is untouched because the LLM stage never ran.
        assert_eq!(budget, DEFAULT_LLM_BUDGET_PER_TURN);
    }
}
