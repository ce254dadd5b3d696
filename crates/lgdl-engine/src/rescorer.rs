//! The negotiation loop's `Rescorer` (§4.8): re-scores one locked-in move
//! against a clarification reply. `negotiate` calls this once per round
//! from inside a synchronous trait method, so it can't go through the
//! cascade matcher's async embedding/LLM stages - it reuses only the
//! lexical stage's own similarity measure (the same Jaro-Winkler compare
//! `best_lexical_hit` does), restricted to the move already under
//! negotiation rather than the whole game.

use lgdl_ir::Move;
use lgdl_negotiate::Rescorer;

pub struct LexicalRescorer;

impl Rescorer for LexicalRescorer {
    fn rescore(&self, mv: &Move, enriched_text: &str) -> f32 {
        mv.triggers
            .iter()
            .filter_map(|pattern| {
                if pattern.regex.is_match(enriched_text) {
                    let similarity =
                        strsim::jaro_winkler(&pattern.raw.to_lowercase(), &enriched_text.to_lowercase()) as f32;
                    Some(if pattern.is_strict() { similarity.max(0.95) } else { similarity })
                } else {
                    None
                }
            })
            .fold(0.0f32, f32::max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lgdl_ast::parse_game;
    use lgdl_ir::compile_game;

    const GAME: &str = r#"
id: demo
name: Demo
version: "1"
moves:
  - id: book
    threshold: medium
    triggers:
      - pattern:
          raw: "I need to see Dr. {doctor}"
        modifiers: [strict]
"#;

    #[test]
    fn matching_reply_scores_high() {
        let game = compile_game(&parse_game(GAME).unwrap()).unwrap();
        let mv = game.find_move("book").unwrap();
        let score = LexicalRescorer.rescore(mv, "I need to see Dr. Smith");
        assert!(score >= 0.95);
    }

    #[test]
    fn unrelated_reply_scores_zero() {
        let game = compile_game(&parse_game(GAME).unwrap()).unwrap();
        let mv = game.find_move("book").unwrap();
        let score = LexicalRescorer.rescore(mv, "what's the weather");
        assert_eq!(score, 0.0);
    }
}
