//! The turn engine (C9): one call to `handle_turn` runs an utterance
//! through sanitize -> load state -> route-or-match -> slot phase ->
//! negotiation phase -> action execution -> response parsing -> persist
//! -> learning hook, and returns the single result record a caller (the
//! HTTP handler, the CLI) renders back to the end user.
//!
//! If the state store is unreachable at load time the turn still gets a
//! best-effort answer instead of a hard failure: matching still runs, but
//! slot-filling, negotiation continuity and persistence are skipped,
//! since none of them mean anything without a conversation record to
//! anchor them to.

use crate::admission::AdmissionControl;
use crate::config::RuntimeConfig;
use crate::enrich::enrich_for_matching;
use crate::firewall::sanitize;
use crate::locks::ConversationLocks;
use crate::registry::{GameEntry, GameRegistry};
use crate::rescorer::LexicalRescorer;
use lgdl_capability::CapabilityOutcome;
use lgdl_ir::{Action, Condition, Move};
use lgdl_learn::{Interaction, LearningStore, NegotiationMetadata, Outcome as LearnOutcome};
use lgdl_match::CascadeMatcher;
use lgdl_metrics::{EngineError, MetricsRegistry};
use lgdl_negotiate::{negotiate, AskUser, NegotiationConfig, NegotiationOutcome, StopReason};
use lgdl_slots::{fill_awaited_slot, fill_from_trigger_captures, missing_slots};
use lgdl_state::{Conversation, NewTurn, PendingState, StateStore, TurnOutcome};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};
use uuid::Uuid;

#[derive(Debug, Clone, serde::Serialize)]
pub struct NegotiationSummary {
    pub rounds: usize,
    pub outcome: String,
}

/// What one call to `handle_turn` produced, ready for an HTTP handler or
/// the CLI to render back to the end user.
#[derive(Debug, Clone, serde::Serialize)]
pub struct TurnResult {
    pub move_id: Option<String>,
    pub confidence: Option<f32>,
    pub response: Option<String>,
    /// Human-readable description of the last capability call this turn
    /// made (`"scheduling.check_availability"`), if any.
    pub action: Option<String>,
    pub awaiting_slot: Option<String>,
    pub slots_filled: Option<Vec<String>>,
    pub negotiation: Option<NegotiationSummary>,
    pub firewall_triggered: bool,
    pub latency_ms: u64,
    /// The game entry's source hash - which compiled version of the game
    /// answered this turn.
    pub manifest_id: String,
}

pub struct TurnEngine {
    registry: Arc<GameRegistry>,
    state: Arc<dyn StateStore>,
    matcher: Arc<CascadeMatcher>,
    locks: ConversationLocks,
    admission: AdmissionControl,
    metrics: Arc<MetricsRegistry>,
    learning: Option<Arc<LearningStore>>,
    ask_user: Option<Arc<dyn AskUser>>,
    config: RuntimeConfig,
}

impl TurnEngine {
    pub fn new(
        registry: Arc<GameRegistry>,
        state: Arc<dyn StateStore>,
        matcher: Arc<CascadeMatcher>,
        metrics: Arc<MetricsRegistry>,
        config: RuntimeConfig,
    ) -> Self {
        Self {
            admission: AdmissionControl::new(config.admission_cap_per_game),
            locks: ConversationLocks::new(),
            registry,
            state,
            matcher,
            metrics,
            learning: None,
            ask_user: None,
            config,
        }
    }

    pub fn with_learning(mut self, learning: Arc<LearningStore>) -> Self {
        self.learning = Some(learning);
        self
    }

    pub fn with_ask_user(mut self, ask_user: Arc<dyn AskUser>) -> Self {
        self.ask_user = Some(ask_user);
        self
    }

    /// `game_id` comes from the caller's route (`/games/{game_id}/move`);
    /// the rest is the turn itself.
    pub async fn handle_turn(
        &self,
        game_id: &str,
        conversation_id: Uuid,
        user_id: &str,
        raw_input: &str,
        turn_context: Option<Value>,
    ) -> Result<TurnResult, EngineError> {
        let started = Instant::now();
        let _admission = self.admission.acquire(game_id)?;

        let entry = self
            .registry
            .get(game_id)
            .ok_or_else(|| EngineError::new("E203", format!("unknown game '{game_id}'")))?;

        let (sanitized, firewall_triggered) = sanitize(raw_input);
        if firewall_triggered {
            self.metrics.incr_counter("firewall.triggered");
            warn!(game_id, %conversation_id, user_id, "firewall sanitized turn input before matching");
        }

        let _lock = self.locks.lock(conversation_id).await;

        let loaded = self.state.get_or_create_conversation(conversation_id, game_id).await;
        let result = match loaded {
            Ok(conversation) => {
                self.handle_stateful_turn(
                    &entry,
                    conversation,
                    raw_input,
                    &sanitized,
                    firewall_triggered,
                    turn_context,
                    started,
                )
                .await
            }
            Err(e) => {
                warn!(code = "E205", error = %e, %conversation_id, "state store unavailable, answering in degraded mode");
                self.handle_degraded_turn(&entry, &sanitized, firewall_triggered, started).await
            }
        };

        self.metrics.incr_counter("turns.total");
        self.metrics
            .observe("turn.latency_ms", started.elapsed().as_millis() as f64);
        result
    }

    /// No conversation record to anchor slots/negotiation/history to:
    /// match and respond, nothing else.
    async fn handle_degraded_turn(
        &self,
        entry: &GameEntry,
        sanitized: &str,
        firewall_triggered: bool,
        started: Instant,
    ) -> Result<TurnResult, EngineError> {
        let mut llm_budget = self.config.llm_budget_per_turn;
        let matched = self.matcher.match_utterance(&entry.game, sanitized, &mut llm_budget).await;

        let (move_id, response) = match matched {
            Some(m) => {
                let mv = entry.game.find_move(&m.move_id).cloned();
                let response = mv
                    .as_ref()
                    .and_then(|mv| mv.block_for(&Condition::Confident))
                    .and_then(|actions| first_respond_template(actions))
                    .and_then(|tmpl| lgdl_template::render(tmpl, &json!({})).ok())
                    .unwrap_or_else(|| "Got it.".to_string());
                (Some(m.move_id), response)
            }
            None => (None, "I'm not sure I understood that.".to_string()),
        };

        Ok(TurnResult {
            move_id,
            confidence: None,
            response: Some(response),
            action: None,
            awaiting_slot: None,
            slots_filled: None,
            negotiation: None,
            firewall_triggered,
            latency_ms: elapsed_ms(started),
            manifest_id: entry.file_hash.clone(),
        })
    }

    async fn handle_stateful_turn(
        &self,
        entry: &GameEntry,
        conversation: Conversation,
        raw_input: &str,
        sanitized: &str,
        firewall_triggered: bool,
        turn_context: Option<Value>,
        started: Instant,
    ) -> Result<TurnResult, EngineError> {
        if let (Some(move_id), Some(slot_name)) =
            (conversation.awaiting_slot_for_move.clone(), conversation.awaiting_slot_name.clone())
        {
            return self
                .handle_slot_reply(
                    entry,
                    &conversation,
                    &move_id,
                    &slot_name,
                    raw_input,
                    sanitized,
                    firewall_triggered,
                    started,
                )
                .await;
        }

        let enriched = enrich_for_matching(
            conversation.awaiting_response,
            conversation.last_question.as_deref(),
            sanitized,
            self.config.enrichment_token_threshold,
        );

        let mut llm_budget = self.config.llm_budget_per_turn;
        let matched = self.matcher.match_utterance(&entry.game, &enriched, &mut llm_budget).await;

        let Some(matched) = matched else {
            self.persist_turn(
                conversation.id,
                raw_input,
                sanitized,
                None,
                None,
                None,
                "I'm not sure I understood that.",
                json!({}),
                TurnOutcome::Unknown,
            )
            .await?;
            return Ok(TurnResult {
                move_id: None,
                confidence: None,
                response: Some("I'm not sure I understood that.".to_string()),
                action: None,
                awaiting_slot: None,
                slots_filled: None,
                negotiation: None,
                firewall_triggered,
                latency_ms: elapsed_ms(started),
                manifest_id: entry.file_hash.clone(),
            });
        };

        let mv = entry
            .game
            .find_move(&matched.move_id)
            .cloned()
            .ok_or_else(|| EngineError::new("E203", format!("matched unknown move '{}'", matched.move_id)))?;

        // A fresh match supersedes whatever the conversation was doing
        // before; stale slots from an abandoned move must not leak in.
        self.state.clear_slots(conversation.id).await.map_err(state_err)?;

        let (captured, capture_errors) = fill_from_trigger_captures(&mv, &matched.captures);
        for err in &capture_errors {
            debug!(code = %err.code, move_id = %mv.id, "trigger capture failed slot coercion, leaving slot unfilled");
        }
        for (slot, value) in &captured {
            self.state.upsert_slot(conversation.id, slot, value.clone()).await.map_err(state_err)?;
        }

        self.continue_move(
            entry,
            &conversation,
            &mv,
            Some(matched.score),
            captured,
            raw_input,
            sanitized,
            firewall_triggered,
            turn_context,
            started,
        )
        .await
    }

    async fn handle_slot_reply(
        &self,
        entry: &GameEntry,
        conversation: &Conversation,
        move_id: &str,
        slot_name: &str,
        raw_input: &str,
        sanitized: &str,
        firewall_triggered: bool,
        started: Instant,
    ) -> Result<TurnResult, EngineError> {
        let mv = entry.game.find_move(move_id).cloned().ok_or_else(|| {
            EngineError::new("E203", format!("conversation is awaiting a slot for unknown move '{move_id}'"))
        })?;

        match fill_awaited_slot(&mv, slot_name, sanitized) {
            Ok(value) => {
                self.state
                    .upsert_slot(conversation.id, slot_name, value)
                    .await
                    .map_err(state_err)?;
                self.continue_move(
                    entry,
                    conversation,
                    &mv,
                    None,
                    HashMap::new(),
                    raw_input,
                    sanitized,
                    firewall_triggered,
                    None,
                    started,
                )
                .await
            }
            Err(e) => {
                let prompt = mv
                    .slot_prompts
                    .get(slot_name)
                    .cloned()
                    .unwrap_or_else(|| format!("Could you provide {slot_name} again?"));
                debug!(code = %e.code, slot = slot_name, "slot value rejected, re-prompting for the same slot");
                self.persist_turn(
                    conversation.id,
                    raw_input,
                    sanitized,
                    Some(move_id.to_string()),
                    None,
                    Some(&prompt),
                    json!({}),
                    TurnOutcome::Failure,
                )
                .await?;
                Ok(TurnResult {
                    move_id: Some(move_id.to_string()),
                    confidence: None,
                    response: Some(prompt),
                    action: None,
                    awaiting_slot: Some(slot_name.to_string()),
                    slots_filled: None,
                    negotiation: None,
                    firewall_triggered,
                    latency_ms: elapsed_ms(started),
                    manifest_id: entry.file_hash.clone(),
                })
            }
        }
    }

    /// Shared tail for both a fresh match and a slot reply that completed
    /// a move's last required slot: check for any slot still missing,
    /// then negotiate (if needed) and execute.
    #[allow(clippy::too_many_arguments)]
    async fn continue_move(
        &self,
        entry: &GameEntry,
        conversation: &Conversation,
        mv: &Arc<Move>,
        score: Option<f32>,
        newly_captured: HashMap<String, Value>,
        raw_input: &str,
        sanitized: &str,
        firewall_triggered: bool,
        turn_context: Option<Value>,
        started: Instant,
    ) -> Result<TurnResult, EngineError> {
        let filled = self.current_slots(conversation.id).await?;
        let missing = missing_slots(mv, &filled);

        if let Some(next) = missing.into_iter().next() {
            self.state
                .set_pending_state(
                    conversation.id,
                    PendingState {
                        current_move_state: Some(mv.id.clone()),
                        awaiting_response: true,
                        last_question: None,
                        awaiting_slot_for_move: Some(mv.id.clone()),
                        awaiting_slot_name: Some(next.clone()),
                    },
                )
                .await
                .map_err(state_err)?;

            let prompt = mv
                .slot_prompts
                .get(&next)
                .cloned()
                .unwrap_or_else(|| format!("Could you tell me {next}?"));

            self.persist_turn(
                conversation.id,
                raw_input,
                sanitized,
                Some(mv.id.clone()),
                score,
                Some(&prompt),
                Value::Object(filled_to_map(&filled)),
                TurnOutcome::Unknown,
            )
            .await?;

            return Ok(TurnResult {
                move_id: Some(mv.id.clone()),
                confidence: score,
                response: Some(prompt),
                action: None,
                awaiting_slot: Some(next),
                slots_filled: Some(newly_captured.keys().cloned().collect()),
                negotiation: None,
                firewall_triggered,
                latency_ms: elapsed_ms(started),
                manifest_id: entry.file_hash.clone(),
            });
        }

        let mut negotiation_summary = None;
        let mut final_score = score;
        let mut outcome_hint = None;

        if let Some(s) = score {
            if s < mv.threshold as f32 {
                if mv.clarify_action.is_some() {
                    let Some(ask_user) = self.ask_user.as_ref() else {
                        return Err(EngineError::new(
                            "E202",
                            "negotiation is required but no user-prompt callback is configured",
                        )
                        .with_location(format!("moves.{}", mv.id)));
                    };
                    let config = NegotiationConfig {
                        max_rounds: self.config.negotiation_max_rounds,
                        stagnation_epsilon: self.config.negotiation_stagnation_epsilon,
                    };
                    let rescorer = LexicalRescorer;
                    match negotiate(mv, s, ask_user.as_ref(), &rescorer, config).await? {
                        NegotiationOutcome::Resolved { score, rounds } => {
                            final_score = Some(score);
                            negotiation_summary = Some(NegotiationSummary { rounds, outcome: "resolved".to_string() });
                        }
                        NegotiationOutcome::Abandoned { reason, rounds } => {
                            negotiation_summary =
                                Some(NegotiationSummary { rounds, outcome: stop_reason_label(reason).to_string() });
                            outcome_hint = Some(TurnOutcome::Unknown);
                        }
                    }
                }
            }
        }

        let abandoned = matches!(
            negotiation_summary.as_ref(),
            Some(s) if s.outcome != "resolved"
        );

        let mut context = json!({
            "slots": filled_to_map(&self.current_slots(conversation.id).await?),
        });
        if let (Value::Object(base), Some(Value::Object(extra))) = (&mut context, turn_context.as_ref()) {
            for (k, v) in extra {
                base.insert(k.clone(), v.clone());
            }
        }

        let (response, action_desc, last_status) = if abandoned {
            (
                "I'm still not sure what you mean - let's try something else.".to_string(),
                None,
                None,
            )
        } else {
            let confident = final_score.map(|s| s >= mv.threshold as f32).unwrap_or(true);
            self.execute_move(entry, mv, confident, &mut context).await?
        };

        let outcome = outcome_hint.unwrap_or_else(|| match last_status {
            Some(Condition::Failed) => TurnOutcome::Failure,
            _ => TurnOutcome::Success,
        });

        self.state.clear_slots(conversation.id).await.map_err(state_err)?;

        let (awaiting_response, last_question) = response_followup_state(&response);
        self.state
            .set_pending_state(
                conversation.id,
                PendingState {
                    current_move_state: None,
                    awaiting_response,
                    last_question,
                    awaiting_slot_for_move: None,
                    awaiting_slot_name: None,
                },
            )
            .await
            .map_err(state_err)?;

        self.persist_turn(
            conversation.id,
            raw_input,
            sanitized,
            Some(mv.id.clone()),
            final_score,
            Some(&response),
            context["slots"].clone(),
            outcome,
        )
        .await?;

        if self.config.learning_enabled {
            self.record_learning(conversation.id, &entry.game.id, raw_input, &mv.id, final_score.unwrap_or(1.0), outcome, &negotiation_summary, score);
        }

        Ok(TurnResult {
            move_id: Some(mv.id.clone()),
            confidence: final_score,
            response: Some(response),
            action: action_desc,
            awaiting_slot: None,
            slots_filled: None,
            negotiation: negotiation_summary,
            firewall_triggered,
            latency_ms: elapsed_ms(started),
            manifest_id: entry.file_hash.clone(),
        })
    }

    /// Picks the entry block (`Confident`/`Uncertain`/guarded) and, while a
    /// capability's outcome sets `last_status`, chases `Successful`/
    /// `Failed` follow-on blocks in declaration order, bounded by the
    /// move's own block count so a malformed chain can't loop forever.
    async fn execute_move(
        &self,
        entry: &GameEntry,
        mv: &Move,
        confident: bool,
        context: &mut Value,
    ) -> Result<(String, Option<String>, Option<Condition>), EngineError> {
        let mut response = String::new();
        let mut action_desc = None;
        let mut last_status: Option<Condition> = None;
        let mut executed = vec![false; mv.blocks.len()];

        let entry_idx = mv.blocks.iter().position(|(cond, _)| match cond {
            Condition::Confident => confident,
            Condition::Uncertain => !confident,
            Condition::Guarded(expr) => lgdl_ir::eval_guard(expr, context),
            Condition::Successful | Condition::Failed => false,
        });

        let Some(mut idx) = entry_idx else {
            return Ok(("Got it.".to_string(), None, None));
        };

        for _ in 0..mv.blocks.len() {
            if executed[idx] {
                break;
            }
            executed[idx] = true;
            let (_, actions) = &mv.blocks[idx];
            let (block_response, block_action, block_status) =
                self.run_actions(entry, actions, context).await?;
            if let Some(r) = block_response {
                response = r;
            }
            if block_action.is_some() {
                action_desc = block_action;
            }
            if block_status.is_some() {
                last_status = block_status;
            }

            let Some(status) = &last_status else { break };
            let next = mv.blocks.iter().position(|(cond, _)| cond == status);
            match next {
                Some(next_idx) if !executed[next_idx] => idx = next_idx,
                _ => break,
            }
        }

        if response.is_empty() {
            response = "Got it.".to_string();
        }
        Ok((response, action_desc, last_status))
    }

    async fn run_actions(
        &self,
        entry: &GameEntry,
        actions: &[Action],
        context: &mut Value,
    ) -> Result<(Option<String>, Option<String>, Option<Condition>), EngineError> {
        let mut response = None;
        let mut action_desc = None;
        let mut last_status = None;

        for action in actions {
            match action {
                Action::Respond { template } => {
                    response = Some(lgdl_template::render(template, context).map_err(|e| {
                        EngineError::new("E001", e.to_string()).with_location("turn::respond")
                    })?);
                }
                Action::OfferChoices { list } => {
                    response = Some(format!("Options: {}", list.join(", ")));
                }
                Action::Clarify { prompt, options } => {
                    let rendered = lgdl_template::render(prompt, context).map_err(|e| {
                        EngineError::new("E001", e.to_string()).with_location("turn::clarify")
                    })?;
                    response = Some(if options.is_empty() {
                        rendered
                    } else {
                        format!("{rendered} ({})", options.join(", "))
                    });
                }
                Action::Capability { service, function, .. } => {
                    let args = resolve_args(action, context)?;
                    action_desc = Some(format!("{service}.{function}"));
                    match entry.invoker.invoke(action, args).await {
                        Ok(CapabilityOutcome::Completed(value)) => {
                            if let Value::Object(ctx) = context {
                                ctx.insert("result".to_string(), value);
                            }
                            last_status = Some(Condition::Successful);
                        }
                        Ok(CapabilityOutcome::Dispatched) => {
                            last_status = Some(Condition::Successful);
                        }
                        Err(e) => {
                            warn!(code = %e.code, capability = %format!("{service}.{function}"), "capability call failed");
                            last_status = Some(Condition::Failed);
                        }
                    }
                }
                Action::Escalate { target } => {
                    response = Some(format!("Escalating to {target}."));
                    action_desc = Some(format!("escalate:{target}"));
                }
            }
        }

        Ok((response, action_desc, last_status))
    }

    async fn current_slots(&self, conversation_id: Uuid) -> Result<HashMap<String, Value>, EngineError> {
        let slots = self.state.get_slots(conversation_id).await.map_err(state_err)?;
        Ok(slots.into_iter().map(|(k, v)| (k, v.value)).collect())
    }

    #[allow(clippy::too_many_arguments)]
    async fn persist_turn(
        &self,
        conversation_id: Uuid,
        raw_input: &str,
        sanitized: &str,
        matched_move: Option<String>,
        confidence: Option<f32>,
        response: Option<&str>,
        extracted_params: Value,
        outcome: TurnOutcome,
    ) -> Result<(), EngineError> {
        self.state
            .save_turn(
                conversation_id,
                NewTurn {
                    user_input: raw_input.to_string(),
                    sanitized_input: sanitized.to_string(),
                    matched_move,
                    confidence,
                    response: response.map(|s| s.to_string()),
                    extracted_params,
                    outcome,
                },
            )
            .await
            .map_err(state_err)?;
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    fn record_learning(
        &self,
        conversation_id: Uuid,
        game_id: &str,
        raw_input: &str,
        move_id: &str,
        final_score: f32,
        outcome: TurnOutcome,
        negotiation: &Option<NegotiationSummary>,
        initial_score: Option<f32>,
    ) {
        let Some(learning) = self.learning.as_ref() else { return };
        let learn_outcome = match (outcome, negotiation) {
            (_, Some(s)) if s.outcome != "resolved" => LearnOutcome::Abandoned,
            (TurnOutcome::Success, _) => LearnOutcome::Executed,
            _ => LearnOutcome::Abandoned,
        };
        let negotiation_metadata = negotiation.as_ref().map(|s| NegotiationMetadata {
            rounds: s.rounds,
            initial_score: initial_score.unwrap_or(final_score),
            final_score,
        });
        learning.record_interaction(Interaction {
            conversation_id,
            game_id: game_id.to_string(),
            user_input: lgdl_learn::sanitize_input(raw_input, &[]).0,
            matched_move: Some(move_id.to_string()),
            confidence: final_score,
            outcome: learn_outcome,
            negotiation_metadata,
            recorded_at: chrono::Utc::now(),
        });
    }
}

fn resolve_args(action: &Action, context: &Value) -> Result<HashMap<String, Value>, EngineError> {
    let Action::Capability { arg_bindings, .. } = action else {
        return Ok(HashMap::new());
    };
    let mut resolved = HashMap::with_capacity(arg_bindings.len());
    for (name, template) in arg_bindings {
        let rendered = lgdl_template::render(template, context)
            .map_err(|e| EngineError::new("E001", e.to_string()).with_location(format!("arg_bindings.{name}")))?;
        resolved.insert(name.clone(), coerce_arg(&rendered));
    }
    Ok(resolved)
}

fn coerce_arg(rendered: &str) -> Value {
    if let Ok(n) = rendered.parse::<f64>() {
        return json!(n);
    }
    match rendered {
        "true" => Value::Bool(true),
        "false" => Value::Bool(false),
        _ => Value::String(rendered.to_string()),
    }
}

fn filled_to_map(filled: &HashMap<String, Value>) -> serde_json::Map<String, Value> {
    filled.iter().map(|(k, v)| (k.clone(), v.clone())).collect()
}

fn first_respond_template(actions: &[Action]) -> Option<&str> {
    actions.iter().find_map(|a| match a {
        Action::Respond { template } => Some(template.as_str()),
        _ => None,
    })
}

/// A response ending in `?` puts the conversation into `awaiting_response`
/// so the next short reply gets enriched with it (§6.4).
fn response_followup_state(response: &str) -> (bool, Option<String>) {
    let trimmed = response.trim_end();
    if trimmed.ends_with('?') {
        (true, Some(response.to_string()))
    } else {
        (false, None)
    }
}

fn stop_reason_label(reason: StopReason) -> &'static str {
    match reason {
        StopReason::ThresholdMet => "resolved",
        StopReason::MaxRounds => "max_rounds",
        StopReason::Stagnation => "stagnation",
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    started.elapsed().as_millis() as u64
}

fn state_err(e: lgdl_state::StateError) -> EngineError {
    EngineError::new("E206", format!("state store failure mid-turn: {e}")).with_location("lgdl-state")
}

#[cfg(test)]
mod tests {
    use super::*;
    use lgdl_ast::parse_game;
    use lgdl_capability::{CapabilityContract, MockDispatcher};
    use lgdl_embed::{OfflineVectorizer, VectorCache};
    use lgdl_ir::compile_game;
    use lgdl_state::InMemoryStateStore;
    use std::collections::HashMap as Map;

    const GAME: &str = r#"
id: clinic
name: Clinic
version: "1"
moves:
  - id: book_appointment
    threshold: medium
    triggers:
      - pattern:
          raw: "I need to see Dr. {doctor}"
        modifiers: [strict]
    slots:
      - name: doctor
        type: string
        required: true
    blocks:
      - condition:
          kind: confident
        actions:
          - action: respond
            template: "Booked with {slots.doctor}."
"#;

    fn engine() -> (TurnEngine, Arc<GameRegistry>) {
        let game = compile_game(&parse_game(GAME).unwrap()).unwrap();
        let registry = Arc::new(GameRegistry::new());
        let dispatcher: Arc<dyn lgdl_capability::CapabilityDispatcher> =
            Arc::new(MockDispatcher::new(CapabilityContract { services: Map::new() }));
        registry.register(game, CapabilityContract { services: Map::new() }, dispatcher);

        let matcher = Arc::new(CascadeMatcher::new(Arc::new(OfflineVectorizer::new()), Arc::new(VectorCache::in_memory())));
        let state: Arc<dyn StateStore> = Arc::new(InMemoryStateStore::new());
        let metrics = Arc::new(MetricsRegistry::new());
        let engine = TurnEngine::new(registry.clone(), state, matcher, metrics, RuntimeConfig::default());
        (engine, registry)
    }

    #[tokio::test]
    async fn a_fully_specified_utterance_books_in_one_turn() {
        let (engine, _registry) = engine();
        let conversation_id = Uuid::new_v4();
        let result = engine
            .handle_turn("clinic", conversation_id, "u1", "I need to see Dr. Smith", None)
            .await
            .unwrap();
        assert_eq!(result.move_id.as_deref(), Some("book_appointment"));
        assert_eq!(result.response.as_deref(), Some("Booked with Smith."));
        assert!(result.awaiting_slot.is_none());
    }

    #[tokio::test]
    async fn an_unknown_game_is_rejected_with_e203() {
        let (engine, _registry) = engine();
        let err = engine
            .handle_turn("nope", Uuid::new_v4(), "u1", "hello", None)
            .await
            .unwrap_err();
        assert_eq!(err.code, "E203");
    }

    #[tokio::test]
    async fn unmatched_input_gets_a_fallback_response() {
        let (engine, _registry) = engine();
        let result = engine
            .handle_turn("clinic", Uuid::new_v4(), "u1", "what time is my flight", None)
            .await
            .unwrap();
        assert!(result.move_id.is_none());
        assert_eq!(result.response.as_deref(), Some("I'm not sure I understood that."));
    }
}
