//! The Worker Status Registry (spec §2.4, §3, §9): one of the two
//! process-wide mutable singletons the indexer keeps, alongside the RPC
//! Pool's endpoint table. Purely in-memory, reset at process start, written
//! by every worker and read by the external status endpoint.

use chainindex_types::{WorkerState, WorkerStatus};
use chrono::Utc;
use parking_lot::RwLock;
use std::collections::BTreeMap;

#[derive(Debug, Default)]
pub struct StatusRegistry {
    inner: RwLock<BTreeMap<String, WorkerStatus>>,
}

impl StatusRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a worker with `Idle` state if it isn't already present.
    /// Called once per worker at startup so the registry has an entry even
    /// before the worker's first iteration completes.
    pub fn register(&self, name: &str) {
        let mut guard = self.inner.write();
        guard.entry(name.to_string()).or_insert_with(|| WorkerStatus::new(name));
    }

    pub fn mark_running(&self, name: &str) {
        let mut guard = self.inner.write();
        let status = guard.entry(name.to_string()).or_insert_with(|| WorkerStatus::new(name));
        status.state = WorkerState::Running;
        status.last_run_at = Some(Utc::now());
    }

    pub fn mark_idle(&self, name: &str) {
        let mut guard = self.inner.write();
        let status = guard.entry(name.to_string()).or_insert_with(|| WorkerStatus::new(name));
        status.state = WorkerState::Idle;
    }

    pub fn mark_error(&self, name: &str, error: impl Into<String>) {
        let mut guard = self.inner.write();
        let status = guard.entry(name.to_string()).or_insert_with(|| WorkerStatus::new(name));
        status.state = WorkerState::Error;
        status.last_error_at = Some(Utc::now());
        status.last_error = Some(error.into());
    }

    pub fn mark_stopped(&self, name: &str) {
        let mut guard = self.inner.write();
        let status = guard.entry(name.to_string()).or_insert_with(|| WorkerStatus::new(name));
        status.state = WorkerState::Stopped;
    }

    pub fn add_items_processed(&self, name: &str, count: u64) {
        let mut guard = self.inner.write();
        let status = guard.entry(name.to_string()).or_insert_with(|| WorkerStatus::new(name));
        status.items_processed += count;
    }

    pub fn snapshot(&self) -> Vec<WorkerStatus> {
        self.inner.read().values().cloned().collect()
    }

    pub fn get(&self, name: &str) -> Option<WorkerStatus> {
        self.inner.read().get(name).cloned()
    }

    pub fn any_running(&self) -> bool {
        self.inner.read().values().any(|s| s.state == WorkerState::Running)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_is_idempotent_and_defaults_to_idle() {
        let registry = StatusRegistry::new();
        registry.register("tip_follower");
        registry.register("tip_follower");
        let snap = registry.snapshot();
        assert_eq!(snap.len(), 1);
        assert_eq!(snap[0].state, WorkerState::Idle);
    }

    #[test]
    fn error_then_running_clears_state_but_keeps_last_error() {
        let registry = StatusRegistry::new();
        registry.mark_error("gap_filler", "db timeout");
        registry.mark_running("gap_filler");

        let status = registry.get("gap_filler").unwrap();
        assert_eq!(status.state, WorkerState::Running);
        assert_eq!(status.last_error.as_deref(), Some("db timeout"));
    }

    #[test]
    fn items_processed_accumulates() {
        let registry = StatusRegistry::new();
        registry.add_items_processed("block_backfiller", 10);
        registry.add_items_processed("block_backfiller", 5);
        assert_eq!(registry.get("block_backfiller").unwrap().items_processed, 15);
    }

    #[test]
    fn any_running_reflects_current_states() {
        let registry = StatusRegistry::new();
        registry.register("a");
        assert!(!registry.any_running());
        registry.mark_running("a");
        assert!(registry.any_running());
        registry.mark_stopped("a");
        assert!(!registry.any_running());
    }
}
