//! Slot-filling: which slots still need a value, and how raw text gets
//! turned into one. Extraction precedence is deliberately narrow: a
//! trigger's own regex captures may fill several slots from one
//! utterance (the pattern author wrote those groups on purpose), but
//! once the engine is asking for one specific slot, only that slot's
//! extraction runs against the reply - an answer to "which doctor?"
//! never opportunistically fills `severity` too, even if it looks like
//! it might.

use crate::coerce::coerce;
use lgdl_ir::{Move, SlotDef};
use lgdl_metrics::EngineError;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use std::collections::HashMap;

static FIRST_SIGNED_DECIMAL: Lazy<Regex> = Lazy::new(|| Regex::new(r"-?\d+(\.\d+)?").unwrap());

/// Slot names still needing a value, in declaration order - the order
/// the negotiation loop asks about them in.
pub fn missing_slots(mv: &Move, filled: &HashMap<String, Value>) -> Vec<String> {
    mv.slot_order
        .iter()
        .filter(|name| {
            let has_value = filled.contains_key(*name);
            let def = mv.slots.get(*name);
            let satisfied = has_value || def.map(|d| d.has_default()).unwrap_or(false);
            !satisfied
        })
        .cloned()
        .collect()
}

pub fn all_slots_filled(mv: &Move, filled: &HashMap<String, Value>) -> bool {
    missing_slots(mv, filled).is_empty()
}

/// The next slot to ask about, or `None` once every required slot has a
/// value (directly or via default).
pub fn next_awaited_slot(mv: &Move, filled: &HashMap<String, Value>) -> Option<String> {
    missing_slots(mv, filled).into_iter().next()
}

/// Apply a trigger's named regex captures to every slot they name,
/// collecting per-slot coercion failures rather than failing the whole
/// batch - one bad capture just leaves that slot unfilled so it gets
/// asked about normally.
pub fn fill_from_trigger_captures(
    mv: &Move,
    captures: &HashMap<String, String>,
) -> (HashMap<String, Value>, Vec<EngineError>) {
    let mut filled = HashMap::new();
    let mut errors = Vec::new();

    for (slot_name, raw) in captures {
        let Some(def) = mv.slots.get(slot_name) else {
            continue;
        };
        match coerce(slot_name, def, raw) {
            Ok(value) => {
                filled.insert(slot_name.clone(), value);
            }
            Err(e) => errors.push(e),
        }
    }

    (filled, errors)
}

/// Extraction for the single slot currently being asked about. The
/// `extraction` hint on the slot's AST definition (regex/semantic/hybrid)
/// only matters to a caller doing NLU on free text; once the manager is
/// handed a candidate string for `awaited_slot`, every strategy collapses
/// to the same typed coercion (semantic/hybrid extraction of *which*
/// substring to try is the cascade matcher's job, not the slot
/// manager's).
pub fn fill_awaited_slot(
    mv: &Move,
    awaited_slot: &str,
    raw: &str,
) -> Result<Value, EngineError> {
    let def = mv.slots.get(awaited_slot).ok_or_else(|| {
        EngineError::new(
            "E300",
            format!("move '{}' has no slot named '{awaited_slot}'", mv.id),
        )
    })?;

    // `number`/`range` pull the first signed decimal out of the reply
    // before coercion - a reply like "8 out of 10" carries the value
    // inside a full sentence, not as a bare number. Every other slot
    // type coerces the whole trimmed reply as-is.
    let extracted;
    let candidate = match def {
        SlotDef::Number { .. } | SlotDef::Range { .. } => {
            extracted = FIRST_SIGNED_DECIMAL
                .find(raw)
                .map(|m| m.as_str().to_string())
                .unwrap_or_else(|| raw.to_string());
            extracted.as_str()
        }
        _ => raw,
    };

    coerce(awaited_slot, def, candidate)
}

#[cfg(test)]
mod tests {
    use super::*;
    use lgdl_ir::SlotDef;
    use std::collections::HashMap as Map;

    fn sample_move() -> Move {
        let mut slots = Map::new();
        slots.insert(
            "doctor".to_string(),
            SlotDef::String {
                required: true,
                default: None,
            },
        );
        slots.insert(
            "severity".to_string(),
            SlotDef::Range {
                min: 1.0,
                max: 10.0,
                required: true,
                default: None,
            },
        );
        Move {
            id: "appt".to_string(),
            triggers: vec![],
            threshold: 0.5,
            guards: vec![],
            slots,
            slot_order: vec!["doctor".to_string(), "severity".to_string()],
            slot_prompts: Default::default(),
            slot_conditions: Default::default(),
            blocks: vec![],
            clarify_action: None,
        }
    }

    #[test]
    fn missing_slots_follow_declaration_order() {
        let mv = sample_move();
        assert_eq!(missing_slots(&mv, &Map::new()), vec!["doctor", "severity"]);
    }

    #[test]
    fn next_awaited_slot_skips_already_filled() {
        let mv = sample_move();
        let mut filled = Map::new();
        filled.insert("doctor".to_string(), Value::String("Smith".into()));
        assert_eq!(next_awaited_slot(&mv, &filled), Some("severity".to_string()));
    }

    #[test]
    fn trigger_captures_fill_multiple_slots_at_once() {
        let mv = sample_move();
        let mut captures = Map::new();
        captures.insert("doctor".to_string(), "Smith".to_string());
        captures.insert("severity".to_string(), "7".to_string());
        let (filled, errors) = fill_from_trigger_captures(&mv, &captures);
        assert!(errors.is_empty());
        assert!(all_slots_filled(&mv, &filled));
    }

    #[test]
    fn awaited_slot_extraction_does_not_touch_other_slots() {
        let mv = sample_move();
        let value = fill_awaited_slot(&mv, "doctor", "Jones").unwrap();
        assert_eq!(value, Value::String("Jones".to_string()));
        // A caller who (incorrectly) also had "7" lying around must apply it
        // to `severity` explicitly - this call never does it for them.
    }

    #[test]
    fn awaited_range_slot_extracts_the_first_decimal_from_a_full_reply() {
        let mv = sample_move();
        let value = fill_awaited_slot(&mv, "severity", "8 out of 10").unwrap();
        assert_eq!(value, Value::from(8.0));
    }

    #[test]
    fn awaited_number_slot_extracts_a_negative_decimal() {
        let mut mv = sample_move();
        mv.slots.insert(
            "adjustment".to_string(),
            SlotDef::Number {
                required: true,
                default: None,
            },
        );
        let value = fill_awaited_slot(&mv, "adjustment", "it's -2.5 from baseline").unwrap();
        assert_eq!(value, Value::from(-2.5));
    }
}
