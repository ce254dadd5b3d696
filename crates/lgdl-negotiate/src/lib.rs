//! The clarification loop: when a move matched below its own confidence
//! threshold, ask the user a bounded number of follow-up questions and
//! re-score the *same* move against the enriched reply rather than
//! re-running the whole cascade - a clarification round narrows down one
//! candidate, it doesn't go looking for a different one.

use async_trait::async_trait;
use lgdl_ir::Move;
use lgdl_metrics::EngineError;
use tracing::debug;

/// Asks the end user a question and returns their reply. The turn engine
/// implements this over whatever transport carries the conversation
/// (HTTP long-poll, websocket, CLI prompt); this crate only knows it gets
/// a `String` back or an error if the channel failed.
#[async_trait]
pub trait AskUser: Send + Sync {
    async fn ask(&self, prompt: &str, options: &[String]) -> Result<String, EngineError>;
}

/// Re-scores one locked-in move against an enriched utterance. Backed in
/// the running engine by the cascade matcher's lexical/embedding stages
/// restricted to this move's own triggers.
pub trait Rescorer: Send + Sync {
    fn rescore(&self, mv: &Move, enriched_text: &str) -> f32;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    ThresholdMet,
    MaxRounds,
    Stagnation,
}

#[derive(Debug, Clone)]
pub enum NegotiationOutcome {
    Resolved { score: f32, rounds: usize },
    Abandoned { reason: StopReason, rounds: usize },
}

#[derive(Debug, Clone, Copy)]
pub struct NegotiationConfig {
    pub max_rounds: usize,
    /// Minimum round-over-round improvement that doesn't count as
    /// stagnating.
    pub stagnation_epsilon: f32,
}

impl Default for NegotiationConfig {
    fn default() -> Self {
        Self {
            max_rounds: 3,
            stagnation_epsilon: 0.05,
        }
    }
}

/// Runs clarification rounds for `mv`, starting from `initial_score`.
///
/// Each round's `after_score` (not a running best) is what the stop rules
/// check - a round can legitimately score worse than the one before it.
/// Stop rules are checked in order every round: threshold met, then the
/// round budget, then stagnation. Stagnation only counts non-negative
/// deltas smaller than `stagnation_epsilon`; a round that regresses
/// resets the stagnation counter rather than contributing to it, since a
/// regression means the user is still actively narrowing things down,
/// not stuck.
pub async fn negotiate(
    mv: &Move,
    initial_score: f32,
    ask_user: &dyn AskUser,
    rescorer: &dyn Rescorer,
    config: NegotiationConfig,
) -> Result<NegotiationOutcome, EngineError> {
    let clarify = mv.clarify_action.as_ref().ok_or_else(|| {
        EngineError::new("E200", "move has no clarify action to negotiate with")
            .with_location(format!("moves.{}", mv.id))
    })?;

    let mut before_score = initial_score;
    let mut stagnation_count = 0usize;
    let hard_cap = config.max_rounds + 1;

    for round in 1..=hard_cap {
        let reply = ask_user.ask(&clarify.prompt, &clarify.options).await?;
        let after_score = rescorer.rescore(mv, &reply);
        let delta = after_score - before_score;

        debug!(move_id = %mv.id, round, before_score, after_score, delta, "negotiation round");

        if after_score >= mv.threshold as f32 {
            return Ok(NegotiationOutcome::Resolved {
                score: after_score,
                rounds: round,
            });
        }
        if round >= config.max_rounds {
            return Ok(NegotiationOutcome::Abandoned {
                reason: StopReason::MaxRounds,
                rounds: round,
            });
        }
        if delta < 0.0 {
            stagnation_count = 0;
        } else if delta < config.stagnation_epsilon {
            stagnation_count += 1;
            if stagnation_count >= 2 {
                return Ok(NegotiationOutcome::Abandoned {
                    reason: StopReason::Stagnation,
                    rounds: round,
                });
            }
        } else {
            stagnation_count = 0;
        }

        before_score = after_score;
    }

    // The stop rules above are structurally guaranteed to trigger by
    // round `max_rounds`, so reaching the hard cap means one of them was
    // bypassed - a config/rescorer bug, not a legitimate conversational
    // state.
    Err(
        EngineError::new("E201", "negotiation exceeded its hard safety cap")
            .with_location(format!("moves.{}", mv.id)),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use lgdl_ir::Move;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    fn sample_move(threshold: f32) -> Move {
        Move {
            id: "appt".to_string(),
            triggers: vec![],
            threshold: threshold as f64,
            guards: vec![],
            slots: Default::default(),
            slot_order: vec![],
            slot_prompts: Default::default(),
            slot_conditions: Default::default(),
            blocks: vec![],
            clarify_action: Some(lgdl_ir::ClarifyAction {
                prompt: "Which one?".to_string(),
                options: vec!["a".to_string(), "b".to_string()],
            }),
        }
    }

    struct ScriptedUser(Mutex<Vec<&'static str>>);

    #[async_trait]
    impl AskUser for ScriptedUser {
        async fn ask(&self, _prompt: &str, _options: &[String]) -> Result<String, EngineError> {
            Ok(self.0.lock().unwrap().remove(0).to_string())
        }
    }

    struct ScriptedRescorer(Mutex<Vec<f32>>, AtomicUsize);

    impl Rescorer for ScriptedRescorer {
        fn rescore(&self, _mv: &Move, _text: &str) -> f32 {
            let idx = self.1.fetch_add(1, Ordering::SeqCst);
            self.0.lock().unwrap()[idx]
        }
    }

    #[tokio::test]
    async fn resolves_once_threshold_is_reached() {
        let mv = sample_move(0.8);
        let user = ScriptedUser(Mutex::new(vec!["more detail"]));
        let rescorer = ScriptedRescorer(Mutex::new(vec![0.85]), AtomicUsize::new(0));
        let outcome = negotiate(&mv, 0.5, &user, &rescorer, NegotiationConfig::default())
            .await
            .unwrap();
        assert!(matches!(outcome, NegotiationOutcome::Resolved { rounds: 1, .. }));
    }

    #[tokio::test]
    async fn gives_up_after_max_rounds() {
        let mv = sample_move(0.95);
        let user = ScriptedUser(Mutex::new(vec!["a", "b", "c"]));
        let rescorer = ScriptedRescorer(Mutex::new(vec![0.6, 0.65, 0.7]), AtomicUsize::new(0));
        let config = NegotiationConfig {
            max_rounds: 3,
            stagnation_epsilon: -1.0,
        };
        let outcome = negotiate(&mv, 0.5, &user, &rescorer, config).await.unwrap();
        assert!(matches!(
            outcome,
            NegotiationOutcome::Abandoned {
                reason: StopReason::MaxRounds,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn two_consecutive_small_gains_trip_stagnation() {
        let mv = sample_move(0.95);
        let user = ScriptedUser(Mutex::new(vec!["a", "b"]));
        // 0.5 -> 0.52 (delta 0.02 < epsilon) -> 0.53 (delta 0.01 < epsilon):
        // two consecutive sub-epsilon non-negative deltas.
        let rescorer = ScriptedRescorer(Mutex::new(vec![0.52, 0.53]), AtomicUsize::new(0));
        let config = NegotiationConfig {
            max_rounds: 5,
            stagnation_epsilon: 0.05,
        };
        let outcome = negotiate(&mv, 0.5, &user, &rescorer, config).await.unwrap();
        assert!(matches!(
            outcome,
            NegotiationOutcome::Abandoned {
                reason: StopReason::Stagnation,
                rounds: 2,
            }
        ));
    }

    #[tokio::test]
    async fn a_regressing_round_resets_the_stagnation_counter() {
        let mv = sample_move(0.95);
        let user = ScriptedUser(Mutex::new(vec!["a", "b", "c"]));
        // 0.5 -> 0.52 (small gain, count=1) -> 0.3 (regression, resets to 0)
        // -> 0.32 (small gain, count=1, not yet 2): never trips stagnation,
        // so this runs out the round budget instead.
        let rescorer = ScriptedRescorer(Mutex::new(vec![0.52, 0.3, 0.32]), AtomicUsize::new(0));
        let config = NegotiationConfig {
            max_rounds: 3,
            stagnation_epsilon: 0.05,
        };
        let outcome = negotiate(&mv, 0.5, &user, &rescorer, config).await.unwrap();
        assert!(matches!(
            outcome,
            NegotiationOutcome::Abandoned {
                reason: StopReason::MaxRounds,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn missing_clarify_action_is_e200() {
        let mut mv = sample_move(0.8);
        mv.clarify_action = None;
        let user = ScriptedUser(Mutex::new(vec![]));
        let rescorer = ScriptedRescorer(Mutex::new(vec![]), AtomicUsize::new(0));
        let err = negotiate(&mv, 0.5, &user, &rescorer, NegotiationConfig::default())
            .await
            .unwrap_err();
        assert_eq!(err.code, "E200");
    }
}
