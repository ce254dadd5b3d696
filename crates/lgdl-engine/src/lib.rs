//! The turn engine: wires the template, IR, embedding, matching, slot,
//! negotiation, capability, state, and learning crates into the one call
//! a caller actually wants - "run this utterance through the game and
//! tell me what happened" - plus the admission control, per-conversation
//! locking, input firewall, and game registry that make running several
//! games and conversations at once safe.

mod admission;
mod config;
mod enrich;
mod firewall;
mod locks;
mod registry;
mod rescorer;
mod turn;

pub use admission::{AdmissionControl, AdmissionGuard};
pub use config::{RuntimeConfig, StateBackend};
pub use enrich::enrich_for_matching;
pub use firewall::sanitize;
pub use locks::ConversationLocks;
pub use registry::{GameEntry, GameRegistry};
pub use rescorer::LexicalRescorer;
pub use turn::{NegotiationSummary, TurnEngine, TurnResult};
