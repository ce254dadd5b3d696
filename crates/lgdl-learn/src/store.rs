//! Holds interactions awaiting analysis and proposals awaiting review.
//! In-memory only - a persistent deployment backs this with whatever
//! table the operator wants; the shape mirrors an
//! `intent_feedback`/`intent_feedback_analysis` table pair without
//! actually requiring Postgres for a crate this size.

use crate::error::LearnError;
use crate::interaction::Interaction;
use crate::proposal::{PendingProposal, Proposal, ProposalStatus};
use chrono::Utc;
use std::sync::Mutex;
use uuid::Uuid;

#[derive(Default)]
pub struct LearningStore {
    interactions: Mutex<Vec<Interaction>>,
    proposals: Mutex<Vec<PendingProposal>>,
}

impl LearningStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_interaction(&self, interaction: Interaction) {
        self.interactions.lock().unwrap().push(interaction);
    }

    pub fn interactions(&self) -> Vec<Interaction> {
        self.interactions.lock().unwrap().clone()
    }

    pub fn submit_proposal(&self, game_id: impl Into<String>, proposal: Proposal) -> Uuid {
        let id = Uuid::new_v4();
        self.proposals.lock().unwrap().push(PendingProposal {
            id,
            game_id: game_id.into(),
            proposal,
            status: ProposalStatus::Pending,
            created_at: Utc::now(),
        });
        id
    }

    pub fn pending_proposals(&self) -> Vec<PendingProposal> {
        self.proposals
            .lock()
            .unwrap()
            .iter()
            .filter(|p| p.status == ProposalStatus::Pending)
            .cloned()
            .collect()
    }

    /// Marks a proposal approved by a named reviewer. Never mutates live
    /// IR itself - the caller is responsible for actually applying the
    /// change and is expected to do so only after this call succeeds.
    pub fn approve(&self, proposal_id: Uuid, reviewer_id: impl Into<String>) -> Result<PendingProposal, LearnError> {
        self.transition(proposal_id, ProposalStatus::Approved {
            reviewer_id: reviewer_id.into(),
        })
    }

    pub fn reject(&self, proposal_id: Uuid, reviewer_id: impl Into<String>) -> Result<PendingProposal, LearnError> {
        self.transition(proposal_id, ProposalStatus::Rejected {
            reviewer_id: reviewer_id.into(),
        })
    }

    fn transition(&self, proposal_id: Uuid, status: ProposalStatus) -> Result<PendingProposal, LearnError> {
        let mut proposals = self.proposals.lock().unwrap();
        let entry = proposals
            .iter_mut()
            .find(|p| p.id == proposal_id)
            .ok_or(LearnError::UnknownProposal(proposal_id))?;
        if entry.status != ProposalStatus::Pending {
            return Err(LearnError::NotPending(proposal_id));
        }
        entry.status = status;
        Ok(entry.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proposal::Proposal;

    #[test]
    fn approval_requires_a_reviewer_id_and_is_idempotent_once_decided() {
        let store = LearningStore::new();
        let id = store.submit_proposal(
            "medical",
            Proposal::confidence_adjustment("book_appointment", 0.03),
        );
        assert_eq!(store.pending_proposals().len(), 1);

        let approved = store.approve(id, "dr_smith").unwrap();
        assert_eq!(
            approved.status,
            ProposalStatus::Approved {
                reviewer_id: "dr_smith".to_string()
            }
        );
        assert!(store.pending_proposals().is_empty());

        let err = store.approve(id, "dr_smith").unwrap_err();
        assert_eq!(err.code(), "E400");
    }

    #[test]
    fn unknown_proposal_is_rejected_with_e401() {
        let store = LearningStore::new();
        let err = store.approve(Uuid::new_v4(), "someone").unwrap_err();
        assert_eq!(err.code(), "E401");
    }
}
