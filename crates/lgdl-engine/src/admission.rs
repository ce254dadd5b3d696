//! Per-game admission control (§5 backpressure): caps in-flight turns per
//! game and rejects the excess with a coded error instead of queueing
//! unboundedly.

use lgdl_metrics::EngineError;
use std::collections::HashMap;
use std::sync::Mutex;

pub struct AdmissionControl {
    cap: usize,
    in_flight: Mutex<HashMap<String, usize>>,
}

/// Releases this game's admission slot when dropped, so a turn that
/// errors out or panics never leaks a permanently-held slot.
pub struct AdmissionGuard<'a> {
    control: &'a AdmissionControl,
    game_id: String,
}

impl Drop for AdmissionGuard<'_> {
    fn drop(&mut self) {
        let mut in_flight = self.control.in_flight.lock().expect("admission lock poisoned");
        if let Some(count) = in_flight.get_mut(&self.game_id) {
            *count = count.saturating_sub(1);
        }
    }
}

impl AdmissionControl {
    pub fn new(cap: usize) -> Self {
        Self {
            cap,
            in_flight: Mutex::new(HashMap::new()),
        }
    }

    pub fn acquire(&self, game_id: &str) -> Result<AdmissionGuard<'_>, EngineError> {
        let mut in_flight = self.in_flight.lock().expect("admission lock poisoned");
        let count = in_flight.entry(game_id.to_string()).or_insert(0);
        if *count >= self.cap {
            return Err(EngineError::new(
                "E204",
                format!("admission control rejected turn for game '{game_id}': {} in flight", *count),
            ));
        }
        *count += 1;
        Ok(AdmissionGuard {
            control: self,
            game_id: game_id.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_once_the_cap_is_reached() {
        let admission = AdmissionControl::new(1);
        let _g1 = admission.acquire("demo").unwrap();
        let err = admission.acquire("demo").unwrap_err();
        assert_eq!(err.code, "E204");
    }

    #[test]
    fn releasing_a_guard_frees_the_slot() {
        let admission = AdmissionControl::new(1);
        {
            let _g1 = admission.acquire("demo").unwrap();
        }
        assert!(admission.acquire("demo").is_ok());
    }
}
