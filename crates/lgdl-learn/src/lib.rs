//! The learning engine collaborator: consumes completed-turn interactions
//! and produces pattern/vocabulary/confidence-adjustment proposals. Every
//! proposal starts and stays `pending` until a named human reviewer
//! approves or rejects it - nothing in this crate ever mutates a live
//! game's IR.

mod analysis;
mod error;
mod interaction;
mod promotion;
mod proposal;
mod sanitize;
mod store;

pub use analysis::{AnalysisReport, FeedbackAnalyzer};
pub use error::LearnError;
pub use interaction::{Interaction, NegotiationMetadata, Outcome};
pub use promotion::{PromotionReport, PromotionService};
pub use proposal::{PendingProposal, Proposal, ProposalStatus, MAX_CONFIDENCE_DELTA};
pub use sanitize::sanitize_input;
pub use store::LearningStore;
