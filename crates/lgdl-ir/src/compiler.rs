//! AST to IR compilation. Validation errors are fatal and coded
//! E100-E199; a game with any of them is never registered.

use crate::action::{compile_action, ServiceCatalog};
use crate::guard::compile_guard;
use crate::ir::{Action, ClarifyAction, Condition, Game, Move, SlotDef};
use crate::pattern::compile_pattern;
use lgdl_ast::{
    ActionAst, BlockAst, ConditionAst, ConfidenceSpec, GameAst, MoveAst, SlotDefinitionAst,
};
use lgdl_metrics::EngineError;
use sha2::{Digest, Sha256};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// Compile a validated AST into the immutable IR `Game`. Returns every
/// validation failure found, not just the first, so authors see the whole
/// picture in one pass.
pub fn compile_game(ast: &GameAst) -> Result<Game, Vec<EngineError>> {
    let mut errors = Vec::new();

    let source_hash = hash_ast(ast);

    let services: ServiceCatalog = ast
        .capabilities
        .iter()
        .map(|c| (c.service.clone(), c.functions.clone()))
        .collect();

    let vocabulary: HashMap<String, Vec<String>> = ast
        .vocabulary
        .iter()
        .map(|v| (v.term.clone(), v.synonyms.clone()))
        .collect();

    let mut seen_ids = HashSet::new();
    let mut compiled_moves = Vec::new();
    let mut capability_allowlist = HashSet::new();

    for move_ast in &ast.moves {
        if !seen_ids.insert(move_ast.id.clone()) {
            errors.push(
                EngineError::new("E101", format!("duplicate move id '{}'", move_ast.id))
                    .with_location(format!("moves.{}", move_ast.id)),
            );
            continue;
        }

        match compile_move(move_ast, &services) {
            Ok((mv, allowlist_entries)) => {
                capability_allowlist.extend(allowlist_entries);
                compiled_moves.push(Arc::new(mv));
            }
            Err(mut move_errors) => errors.append(&mut move_errors),
        }
    }

    if !errors.is_empty() {
        return Err(errors);
    }

    Ok(Game {
        id: ast.id.clone(),
        name: ast.name.clone(),
        version: ast.version.clone(),
        description: ast.description.clone(),
        vocabulary,
        capability_allowlist,
        moves: compiled_moves,
        source_hash,
    })
}

fn compile_move(
    move_ast: &MoveAst,
    services: &ServiceCatalog,
) -> Result<(Move, Vec<String>), Vec<EngineError>> {
    let mut errors = Vec::new();
    let mut allowlist = Vec::new();

    let threshold = resolve_threshold(&move_ast.threshold);

    let mut slots = HashMap::new();
    let mut slot_order = Vec::new();
    for slot in &move_ast.slots {
        match compile_slot_def(&slot.def, &move_ast.id, &slot.name) {
            Ok(def) => {
                slots.insert(slot.name.clone(), def);
                slot_order.push(slot.name.clone());
            }
            Err(e) => errors.push(e),
        }
    }

    let mut triggers = Vec::new();
    for trigger in &move_ast.triggers {
        match compile_pattern(&trigger.pattern.raw, &trigger.modifiers) {
            Ok(pattern) => {
                for name in &pattern.capture_names {
                    if !slots.is_empty() && !slots.contains_key(name) {
                        errors.push(
                            EngineError::new(
                                "E100",
                                format!(
                                    "move '{}': pattern references unknown slot '{name}'",
                                    move_ast.id
                                ),
                            )
                            .with_location(format!("moves.{}.triggers", move_ast.id)),
                        );
                    }
                }
                triggers.push(pattern);
            }
            Err(e) => errors.push(
                EngineError::new(
                    "E100",
                    format!("move '{}': invalid trigger pattern: {e}", move_ast.id),
                )
                .with_location(format!("moves.{}.triggers", move_ast.id)),
            ),
        }
    }

    let mut guards = Vec::new();
    for guard_src in &move_ast.guards {
        match compile_guard(guard_src) {
            Ok(g) => guards.push(g),
            Err(e) => errors.push(
                EngineError::new("E106", format!("move '{}': {e}", move_ast.id))
                    .with_location(format!("moves.{}.guards", move_ast.id)),
            ),
        }
    }

    let mut slot_conditions = HashMap::new();
    for (key, actions) in &move_ast.slot_conditions {
        match compile_actions(actions, services, &move_ast.id, &mut allowlist) {
            Ok(compiled) => {
                slot_conditions.insert(key.clone(), compiled);
            }
            Err(mut e) => errors.append(&mut e),
        }
    }

    let mut blocks = Vec::new();
    for block in &move_ast.blocks {
        match compile_block(block, services, &move_ast.id, &mut allowlist) {
            Ok(b) => blocks.push(b),
            Err(mut e) => errors.append(&mut e),
        }
    }

    let clarify_action = move_ast.clarify.as_ref().map(|c| ClarifyAction {
        prompt: c.prompt.clone(),
        options: c.options.clone(),
    });

    if !errors.is_empty() {
        return Err(errors);
    }

    Ok((
        Move {
            id: move_ast.id.clone(),
            triggers,
            threshold,
            guards,
            slots,
            slot_order,
            slot_prompts: move_ast.slot_prompts.clone(),
            slot_conditions,
            blocks,
            clarify_action,
        },
        allowlist,
    ))
}

fn compile_block(
    block: &BlockAst,
    services: &ServiceCatalog,
    move_id: &str,
    allowlist: &mut Vec<String>,
) -> Result<(Condition, Vec<Action>), Vec<EngineError>> {
    let condition = match &block.condition {
        ConditionAst::Confident => Condition::Confident,
        ConditionAst::Uncertain => Condition::Uncertain,
        ConditionAst::Successful => Condition::Successful,
        ConditionAst::Failed => Condition::Failed,
        ConditionAst::Guarded { expr } => match compile_guard(expr) {
            Ok(g) => Condition::Guarded(g),
            Err(e) => {
                return Err(vec![EngineError::new(
                    "E106",
                    format!("move '{move_id}': {e}"),
                )
                .with_location(format!("moves.{move_id}.blocks[].guarded"))])
            }
        },
    };
    let actions = compile_actions(&block.actions, services, move_id, allowlist)?;
    Ok((condition, actions))
}

fn compile_actions(
    actions: &[ActionAst],
    services: &ServiceCatalog,
    move_id: &str,
    allowlist: &mut Vec<String>,
) -> Result<Vec<Action>, Vec<EngineError>> {
    let mut errors = Vec::new();
    let mut compiled = Vec::new();
    for action in actions {
        match compile_action(action, services, move_id) {
            Ok((ir_action, qualified)) => {
                if let Some(q) = qualified {
                    allowlist.push(q);
                }
                compiled.push(ir_action);
            }
            Err(e) => errors.push(e),
        }
    }
    if !errors.is_empty() {
        return Err(errors);
    }
    Ok(compiled)
}

fn compile_slot_def(
    def: &SlotDefinitionAst,
    move_id: &str,
    slot_name: &str,
) -> Result<SlotDef, EngineError> {
    match def {
        SlotDefinitionAst::String { required, default, .. } => Ok(SlotDef::String {
            required: *required,
            default: default.clone(),
        }),
        SlotDefinitionAst::Number { required, default, .. } => Ok(SlotDef::Number {
            required: *required,
            default: *default,
        }),
        SlotDefinitionAst::Range {
            min,
            max,
            required,
            default,
            ..
        } => {
            if min > max {
                return Err(EngineError::new(
                    "E103",
                    format!(
                        "move '{move_id}': slot '{slot_name}' has range min {min} > max {max}"
                    ),
                )
                .with_location(format!("moves.{move_id}.slots.{slot_name}")));
            }
            Ok(SlotDef::Range {
                min: *min,
                max: *max,
                required: *required,
                default: *default,
            })
        }
        SlotDefinitionAst::Enum {
            values,
            required,
            default,
            ..
        } => {
            if values.is_empty() {
                return Err(EngineError::new(
                    "E102",
                    format!("move '{move_id}': enum slot '{slot_name}' has no values"),
                )
                .with_location(format!("moves.{move_id}.slots.{slot_name}")));
            }
            Ok(SlotDef::Enum {
                values: values.clone(),
                required: *required,
                default: default.clone(),
            })
        }
        SlotDefinitionAst::Timeframe { required, default, .. } => Ok(SlotDef::Timeframe {
            required: *required,
            default: default.clone(),
        }),
        SlotDefinitionAst::Date { required, default, .. } => Ok(SlotDef::Date {
            required: *required,
            default: default.clone(),
        }),
    }
}

fn resolve_threshold(spec: &ConfidenceSpec) -> f64 {
    match spec {
        ConfidenceSpec::Band(band) => band.threshold(),
        ConfidenceSpec::Literal(v) => *v,
    }
}

fn hash_ast(ast: &GameAst) -> String {
    let bytes = serde_json::to_vec(ast).unwrap_or_default();
    let mut hasher = Sha256::new();
    hasher.update(&bytes);
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use lgdl_ast::parse_game;

    const MEDICAL_GAME: &str = r#"
id: medical_intake
name: Medical Intake
version: "1"
capabilities:
  - service: scheduling
    functions: [check_availability, book]
moves:
  - id: appointment_request
    threshold: high
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
            template: "Checking {doctor}'s availability"
          - action: capability
            service: scheduling
            function: check_availability
            await: true
            arg_bindings:
              doctor: "{doctor}"
"#;

    #[test]
    fn compiles_valid_game() {
        let ast = parse_game(MEDICAL_GAME).unwrap();
        let game = compile_game(&ast).unwrap();
        assert_eq!(game.moves.len(), 1);
        assert!(game
            .capability_allowlist
            .contains("scheduling.check_availability"));
        assert_eq!(game.moves[0].threshold, 0.8);
    }

    #[test]
    fn rejects_duplicate_move_ids() {
        let mut ast = parse_game(MEDICAL_GAME).unwrap();
        let dup = ast.moves[0].clone();
        ast.moves.push(dup);
        let errors = compile_game(&ast).unwrap_err();
        assert!(errors.iter().any(|e| e.code == "E101"));
    }

    #[test]
    fn rejects_capability_not_in_allowlist() {
        let mut ast = parse_game(MEDICAL_GAME).unwrap();
        ast.moves[0].blocks[0].actions.push(ActionAst::Capability {
            service: "scheduling".to_string(),
            function: "book".to_string(),
            r#await: true,
            timeout_seconds: None,
            arg_bindings: Default::default(),
        });
        // book IS declared, should compile fine.
        assert!(compile_game(&ast).is_ok());

        ast.moves[0].blocks[0].actions.push(ActionAst::Capability {
            service: "scheduling".to_string(),
            function: "cancel".to_string(),
            r#await: true,
            timeout_seconds: None,
            arg_bindings: Default::default(),
        });
        let errors = compile_game(&ast).unwrap_err();
        assert!(errors.iter().any(|e| e.code == "E105"));
    }

    #[test]
    fn rejects_range_with_min_greater_than_max() {
        let mut ast = parse_game(MEDICAL_GAME).unwrap();
        ast.moves[0].slots.push(lgdl_ast::SlotBlockAst {
            name: "severity".to_string(),
            def: SlotDefinitionAst::Range {
                min: 10.0,
                max: 1.0,
                required: true,
                default: None,
                extraction: None,
            },
        });
        let errors = compile_game(&ast).unwrap_err();
        assert!(errors.iter().any(|e| e.code == "E103"));
    }

    #[test]
    fn rejects_empty_enum_values() {
        let mut ast = parse_game(MEDICAL_GAME).unwrap();
        ast.moves[0].slots.push(lgdl_ast::SlotBlockAst {
            name: "severity".to_string(),
            def: SlotDefinitionAst::Enum {
                values: vec![],
                required: true,
                default: None,
                extraction: None,
            },
        });
        let errors = compile_game(&ast).unwrap_err();
        assert!(errors.iter().any(|e| e.code == "E102"));
    }
}
