//! The compiled, immutable IR. Once a `Game` is built by `compile_game`,
//! nothing mutates it; hot reload replaces the whole entry rather than
//! patching fields in place.

use crate::guard::GuardExpr;
use regex::Regex;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct Game {
    pub id: String,
    pub name: String,
    pub version: String,
    pub description: String,
    pub vocabulary: HashMap<String, Vec<String>>,
    pub capability_allowlist: HashSet<String>,
    pub moves: Vec<Arc<Move>>,
    /// sha256 of the source AST, used by the registry for hot-reload
    /// change detection.
    pub source_hash: String,
}

impl Game {
    pub fn find_move(&self, move_id: &str) -> Option<&Arc<Move>> {
        self.moves.iter().find(|m| m.id == move_id)
    }
}

#[derive(Debug, Clone)]
pub struct Move {
    pub id: String,
    pub triggers: Vec<Pattern>,
    pub threshold: f64,
    pub guards: Vec<GuardExpr>,
    pub slots: HashMap<String, SlotDef>,
    /// Declaration order, so "missing slots" is reported in the order a
    /// game author wrote them rather than hash-map order.
    pub slot_order: Vec<String>,
    pub slot_prompts: HashMap<String, String>,
    pub slot_conditions: HashMap<String, Vec<Action>>,
    pub blocks: Vec<(Condition, Vec<Action>)>,
    pub clarify_action: Option<ClarifyAction>,
}

impl Move {
    pub fn has_slots(&self) -> bool {
        !self.slots.is_empty()
    }

    pub fn block_for(&self, condition: &Condition) -> Option<&[Action]> {
        self.blocks
            .iter()
            .find(|(c, _)| c == condition)
            .map(|(_, actions)| actions.as_slice())
    }
}

#[derive(Debug, Clone)]
pub struct ClarifyAction {
    pub prompt: String,
    pub options: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    Confident,
    Uncertain,
    Successful,
    Failed,
    Guarded(GuardExpr),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Modifier {
    Strict,
    Fuzzy,
    Learned,
    ContextSensitive,
}

#[derive(Debug, Clone)]
pub struct Pattern {
    pub raw: String,
    pub regex: Regex,
    pub modifiers: HashSet<Modifier>,
    /// Slot names captured by this pattern's named groups, in declaration
    /// order (used to build `captures` in the cascade matcher).
    pub capture_names: Vec<String>,
}

impl Pattern {
    pub fn is_strict(&self) -> bool {
        self.modifiers.contains(&Modifier::Strict)
    }
}

#[derive(Debug, Clone)]
pub enum SlotDef {
    String {
        required: bool,
        default: Option<String>,
    },
    Number {
        required: bool,
        default: Option<f64>,
    },
    Range {
        min: f64,
        max: f64,
        required: bool,
        default: Option<f64>,
    },
    Enum {
        values: Vec<String>,
        required: bool,
        default: Option<String>,
    },
    Timeframe {
        required: bool,
        default: Option<String>,
    },
    Date {
        required: bool,
        default: Option<String>,
    },
}

impl SlotDef {
    pub fn required(&self) -> bool {
        match self {
            SlotDef::String { required, .. }
            | SlotDef::Number { required, .. }
            | SlotDef::Range { required, .. }
            | SlotDef::Enum { required, .. }
            | SlotDef::Timeframe { required, .. }
            | SlotDef::Date { required, .. } => *required,
        }
    }

    /// A slot counts as filled if a SlotValue exists OR a default is
    /// declared.
    pub fn has_default(&self) -> bool {
        match self {
            SlotDef::String { default, .. } => default.is_some(),
            SlotDef::Number { default, .. } => default.is_some(),
            SlotDef::Range { default, .. } => default.is_some(),
            SlotDef::Enum { default, .. } => default.is_some(),
            SlotDef::Timeframe { default, .. } => default.is_some(),
            SlotDef::Date { default, .. } => default.is_some(),
        }
    }
}

#[derive(Debug, Clone)]
pub enum Action {
    Respond {
        template: String,
    },
    OfferChoices {
        list: Vec<String>,
    },
    Clarify {
        prompt: String,
        options: Vec<String>,
    },
    Capability {
        service: String,
        function: String,
        r#await: bool,
        timeout_seconds: u64,
        arg_bindings: HashMap<String, String>,
    },
    Escalate {
        target: String,
    },
}
