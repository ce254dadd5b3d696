//! Stage 1: regex pattern matching, scored by Jaro-Winkler similarity
//! between the raw trigger text and the utterance, the same way
//! `FuzzySearchService` ranks GIN-filtered candidates (strsim
//! Jaro-Winkler re-ranking after a cheap structural filter).

use lgdl_ir::{Move, Pattern};
use std::collections::HashMap;

pub const LEXICAL_SHORT_CIRCUIT: f32 = 0.75;

pub struct LexicalHit {
    pub score: f32,
    pub captures: HashMap<String, String>,
    pub pattern_raw: String,
}

/// Best lexical hit for a single move, or `None` if no trigger pattern
/// matches the utterance at all.
pub fn best_lexical_hit(mv: &Move, utterance: &str) -> Option<LexicalHit> {
    mv.triggers
        .iter()
        .filter_map(|pattern| score_pattern(pattern, utterance))
        .max_by(|a, b| a.score.total_cmp(&b.score))
}

fn score_pattern(pattern: &Pattern, utterance: &str) -> Option<LexicalHit> {
    let captures_match = pattern.regex.captures(utterance)?;

    let mut captures = HashMap::new();
    for name in &pattern.capture_names {
        if let Some(m) = captures_match.name(name) {
            captures.insert(name.clone(), m.as_str().to_string());
        }
    }

    let similarity = strsim::jaro_winkler(&pattern.raw.to_lowercase(), &utterance.to_lowercase()) as f32;
    // A strict pattern that matched at all is a strong lexical signal even
    // when the surrounding words differ a lot (e.g. long captured spans).
    let score = if pattern.is_strict() {
        similarity.max(0.95)
    } else {
        similarity
    };

    Some(LexicalHit {
        score,
        captures,
        pattern_raw: pattern.raw.clone(),
    })
}
