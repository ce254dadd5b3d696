//! AST v1 - the typed tree handed to the IR compiler.
//!
//! Separation of concerns mirrors the compiled IR in `lgdl-ir` one level up:
//! every node here is still "raw" (string patterns, uncompiled guards,
//! unresolved confidence bands). The compiler is the only place that turns
//! this into executable state.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A complete game definition, as produced by the parser.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameAst {
    pub id: String,
    pub name: String,
    pub version: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub vocabulary: Vec<VocabularyEntry>,
    #[serde(default)]
    pub capabilities: Vec<CapabilityDecl>,
    pub moves: Vec<MoveAst>,
}

/// A canonical term and its synonyms, e.g. `appointment -> [booking, visit]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VocabularyEntry {
    pub term: String,
    #[serde(default)]
    pub synonyms: Vec<String>,
}

/// A declared external service and the functions it exposes.
///
/// Declaring a service here is what lets the IR compiler validate that a
/// `Capability` action's `service.function` reference resolves to something
/// real (E1xx).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CapabilityDecl {
    pub service: String,
    pub functions: Vec<String>,
}

/// One unit of conversational behavior.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MoveAst {
    pub id: String,
    pub triggers: Vec<TriggerAst>,
    #[serde(default = "default_threshold")]
    pub threshold: ConfidenceSpec,
    #[serde(default)]
    pub guards: Vec<String>,
    #[serde(default)]
    pub slots: Vec<SlotBlockAst>,
    #[serde(default)]
    pub slot_prompts: HashMap<String, String>,
    #[serde(default)]
    pub slot_conditions: HashMap<String, Vec<ActionAst>>,
    #[serde(default)]
    pub blocks: Vec<BlockAst>,
    /// The `ask` inside an `uncertain` block, lifted out because it is
    /// required to drive negotiation.
    #[serde(default)]
    pub clarify: Option<ClarifyAst>,
}

fn default_threshold() -> ConfidenceSpec {
    ConfidenceSpec::Band(ConfidenceBand::Medium)
}

/// A candidate user-utterance template.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriggerAst {
    pub pattern: PatternAst,
    #[serde(default)]
    pub modifiers: Vec<Modifier>,
}

/// `strict` patterns must lexically match to score at all. `fuzzy` allows
/// embedding/LLM scoring. `learned` marks patterns proposed by the
/// learning engine and promoted. `context_sensitive`
/// patterns only fire when the relevant context key is present.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Modifier {
    Strict,
    Fuzzy,
    Learned,
    ContextSensitive,
}

/// `raw` carries `{name}` placeholders that become named regex captures.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatternAst {
    pub raw: String,
}

/// Confidence band or a literal threshold, resolved at compile time
/// (low=0.2 / medium=0.5 / high=0.8 / critical=0.95).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfidenceSpec {
    Band(ConfidenceBand),
    Literal(f64),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfidenceBand {
    Low,
    Medium,
    High,
    Critical,
}

impl ConfidenceBand {
    pub fn threshold(self) -> f64 {
        match self {
            ConfidenceBand::Low => 0.2,
            ConfidenceBand::Medium => 0.5,
            ConfidenceBand::High => 0.8,
            ConfidenceBand::Critical => 0.95,
        }
    }
}

/// A named piece of information the move needs filled in before its actions
/// can run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlotBlockAst {
    pub name: String,
    #[serde(flatten)]
    pub def: SlotDefinitionAst,
}

/// Extraction strategy hint: how the slot manager should try to fill this
/// slot from raw text when it isn't the awaited slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionStrategy {
    Regex,
    Semantic,
    Hybrid,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SlotDefinitionAst {
    String {
        #[serde(default)]
        required: bool,
        #[serde(default)]
        default: Option<String>,
        #[serde(default)]
        extraction: Option<ExtractionStrategy>,
    },
    Number {
        #[serde(default)]
        required: bool,
        #[serde(default)]
        default: Option<f64>,
        #[serde(default)]
        extraction: Option<ExtractionStrategy>,
    },
    Range {
        min: f64,
        max: f64,
        #[serde(default)]
        required: bool,
        #[serde(default)]
        default: Option<f64>,
        #[serde(default)]
        extraction: Option<ExtractionStrategy>,
    },
    Enum {
        values: Vec<String>,
        #[serde(default)]
        required: bool,
        #[serde(default)]
        default: Option<String>,
        #[serde(default)]
        extraction: Option<ExtractionStrategy>,
    },
    Timeframe {
        #[serde(default)]
        required: bool,
        #[serde(default)]
        default: Option<String>,
        #[serde(default)]
        extraction: Option<ExtractionStrategy>,
    },
    Date {
        #[serde(default)]
        required: bool,
        #[serde(default)]
        default: Option<String>,
        #[serde(default)]
        extraction: Option<ExtractionStrategy>,
    },
}

impl SlotDefinitionAst {
    pub fn required(&self) -> bool {
        match self {
            SlotDefinitionAst::String { required, .. }
            | SlotDefinitionAst::Number { required, .. }
            | SlotDefinitionAst::Range { required, .. }
            | SlotDefinitionAst::Enum { required, .. }
            | SlotDefinitionAst::Timeframe { required, .. }
            | SlotDefinitionAst::Date { required, .. } => *required,
        }
    }

    pub fn has_default(&self) -> bool {
        match self {
            SlotDefinitionAst::String { default, .. } => default.is_some(),
            SlotDefinitionAst::Number { default, .. } => default.is_some(),
            SlotDefinitionAst::Range { default, .. } => default.is_some(),
            SlotDefinitionAst::Enum { default, .. } => default.is_some(),
            SlotDefinitionAst::Timeframe { default, .. } => default.is_some(),
            SlotDefinitionAst::Date { default, .. } => default.is_some(),
        }
    }
}

/// One of the move's conditional action blocks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockAst {
    pub condition: ConditionAst,
    pub actions: Vec<ActionAst>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ConditionAst {
    Confident,
    Uncertain,
    Successful,
    Failed,
    Guarded { expr: String },
}

/// The `ask` inside an `uncertain` block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClarifyAst {
    pub prompt: String,
    #[serde(default)]
    pub options: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ActionAst {
    Respond {
        template: String,
    },
    OfferChoices {
        list: Vec<String>,
    },
    Clarify {
        prompt: String,
        #[serde(default)]
        options: Vec<String>,
    },
    Capability {
        service: String,
        function: String,
        #[serde(default)]
        r#await: bool,
        #[serde(default)]
        timeout_seconds: Option<u64>,
        #[serde(default)]
        arg_bindings: HashMap<String, String>,
    },
    Escalate {
        target: String,
    },
}
