//! A striped lock map keyed by `conversation_id` (§5): turns for the same
//! conversation serialize against each other, turns for different
//! conversations almost never contend, and the map itself never grows -
//! a fixed number of stripes, not one lock per conversation ever seen.

use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

const STRIPES: usize = 256;

pub struct ConversationLocks {
    stripes: Vec<Arc<Mutex<()>>>,
}

impl ConversationLocks {
    pub fn new() -> Self {
        Self {
            stripes: (0..STRIPES).map(|_| Arc::new(Mutex::new(()))).collect(),
        }
    }

    fn stripe_for(&self, id: Uuid) -> Arc<Mutex<()>> {
        let bytes = id.as_bytes();
        let idx = bytes.iter().fold(0usize, |acc, b| acc.wrapping_mul(31).wrapping_add(*b as usize)) % STRIPES;
        self.stripes[idx].clone()
    }

    /// Acquires the stripe for `id`. Held across `.await` points is fine -
    /// this is exactly the kind of state-store/negotiation suspension §5
    /// allows.
    pub async fn lock(&self, id: Uuid) -> OwnedMutexGuard<()> {
        self.stripe_for(id).lock_owned().await
    }
}

impl Default for ConversationLocks {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn same_conversation_serializes() {
        let locks = Arc::new(ConversationLocks::new());
        let id = Uuid::new_v4();
        let g1 = locks.lock(id).await;
        let locks2 = locks.clone();
        let handle = tokio::spawn(async move {
            let _g2 = locks2.lock(id).await;
        });
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        assert!(!handle.is_finished());
        drop(g1);
        handle.await.unwrap();
    }
}
