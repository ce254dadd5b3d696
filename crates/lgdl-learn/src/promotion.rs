//! Turns an analysis report into pending proposals in the store. Despite
//! the name, nothing here is auto-applied to live matching - "promotion"
//! only ever promotes a raw analysis result into a reviewable proposal,
//! never a proposal into a live pattern.

use crate::analysis::AnalysisReport;
use crate::store::LearningStore;
use tracing::info;

#[derive(Debug, Default)]
pub struct PromotionReport {
    pub submitted: usize,
}

pub struct PromotionService<'a> {
    store: &'a LearningStore,
}

impl<'a> PromotionService<'a> {
    pub fn new(store: &'a LearningStore) -> Self {
        Self { store }
    }

    pub fn promote(&self, game_id: &str, report: &AnalysisReport) -> PromotionReport {
        let mut submitted = 0;
        for proposal in report
            .pattern_discoveries
            .iter()
            .chain(report.confusion_pairs.iter())
        {
            self.store.submit_proposal(game_id, proposal.clone());
            submitted += 1;
        }
        info!(game_id, submitted, "queued proposals for review");
        PromotionReport { submitted }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::FeedbackAnalyzer;
    use crate::interaction::{Interaction, Outcome};
    use chrono::Utc;
    use uuid::Uuid;

    #[test]
    fn queues_every_discovery_as_a_pending_proposal() {
        let store = LearningStore::new();
        let analyzer = FeedbackAnalyzer {
            min_occurrences: 2,
            min_avg_confidence: 0.5,
        };
        let interactions: Vec<_> = (0..2)
            .map(|_| Interaction {
                conversation_id: Uuid::new_v4(),
                game_id: "medical".to_string(),
                user_input: "see a doctor".to_string(),
                matched_move: Some("book_appointment".to_string()),
                confidence: 0.8,
                outcome: Outcome::Executed,
                negotiation_metadata: None,
                recorded_at: Utc::now(),
            })
            .collect();
        let report = analyzer.analyze(&interactions);

        let promotion = PromotionService::new(&store);
        let result = promotion.promote("medical", &report);

        assert_eq!(result.submitted, 1);
        assert_eq!(store.pending_proposals().len(), 1);
    }
}
