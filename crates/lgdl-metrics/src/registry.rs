//! In-process metrics registry.
//!
//! No module-level singleton: a `MetricsRegistry` is constructed once at
//! startup and handed down to every component that needs it, the same
//! way a `PgPool` gets threaded through `WorkflowEngine::new`.

use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::sync::Mutex;

#[derive(Default)]
pub struct MetricsRegistry {
    counters: Mutex<HashMap<String, std::sync::Arc<AtomicU64>>>,
    gauges: Mutex<HashMap<String, std::sync::Arc<AtomicI64>>>,
    histograms: Mutex<HashMap<String, Vec<f64>>>,
}

impl MetricsRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn incr_counter(&self, name: &str) {
        self.incr_counter_by(name, 1);
    }

    pub fn incr_counter_by(&self, name: &str, by: u64) {
        let mut counters = self.counters.lock().expect("metrics lock poisoned");
        let counter = counters
            .entry(name.to_string())
            .or_insert_with(|| std::sync::Arc::new(AtomicU64::new(0)));
        counter.fetch_add(by, Ordering::Relaxed);
    }

    pub fn counter_value(&self, name: &str) -> u64 {
        self.counters
            .lock()
            .expect("metrics lock poisoned")
            .get(name)
            .map(|c| c.load(Ordering::Relaxed))
            .unwrap_or(0)
    }

    pub fn set_gauge(&self, name: &str, value: i64) {
        let mut gauges = self.gauges.lock().expect("metrics lock poisoned");
        let gauge = gauges
            .entry(name.to_string())
            .or_insert_with(|| std::sync::Arc::new(AtomicI64::new(0)));
        gauge.store(value, Ordering::Relaxed);
    }

    pub fn incr_gauge(&self, name: &str, by: i64) {
        let mut gauges = self.gauges.lock().expect("metrics lock poisoned");
        let gauge = gauges
            .entry(name.to_string())
            .or_insert_with(|| std::sync::Arc::new(AtomicI64::new(0)));
        gauge.fetch_add(by, Ordering::Relaxed);
    }

    pub fn gauge_value(&self, name: &str) -> i64 {
        self.gauges
            .lock()
            .expect("metrics lock poisoned")
            .get(name)
            .map(|g| g.load(Ordering::Relaxed))
            .unwrap_or(0)
    }

    pub fn observe(&self, name: &str, value_ms: f64) {
        let mut histograms = self.histograms.lock().expect("metrics lock poisoned");
        histograms.entry(name.to_string()).or_default().push(value_ms);
    }

    /// p95 of the recorded samples, for asserting match-latency budgets in
    /// tests.
    pub fn p95(&self, name: &str) -> Option<f64> {
        let histograms = self.histograms.lock().expect("metrics lock poisoned");
        let samples = histograms.get(name)?;
        if samples.is_empty() {
            return None;
        }
        let mut sorted = samples.clone();
        sorted.sort_by(|a, b| a.partial_cmp(b).unwrap());
        let idx = ((sorted.len() as f64) * 0.95).ceil() as usize;
        let idx = idx.saturating_sub(1).min(sorted.len() - 1);
        Some(sorted[idx])
    }
}
