use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use super::types::{OverallHealth, ProbeOutcome, ProbeResult, ProbeTrigger};
use crate::models::TargetId;

/// Latest probe result per target.
///
/// One writer at a time, any number of readers. Write sections only touch
/// the map, never the network, so readers are held up for a map update at
/// most. A missing entry means the target was never probed.
#[derive(Debug, Default)]
pub struct ResultStore {
    results: RwLock<HashMap<TargetId, ProbeResult>>,
}

impl ResultStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that a probe for `target_id` was dispatched at `at`, creating
    /// the entry if this is the first attempt.
    pub fn mark_dispatched(&self, target_id: TargetId, at: DateTime<Utc>, trigger: ProbeTrigger) {
        let mut results = self.write();
        let entry = results.entry(target_id).or_default();
        entry.last_called_at = Some(at);
        entry.trigger = Some(trigger);
    }

    /// Merge a finished probe into the entry for `target_id`. Every outcome
    /// field is overwritten; the dispatch stamp is kept.
    pub fn upsert(&self, target_id: TargetId, outcome: ProbeOutcome) {
        self.write().entry(target_id).or_default().apply(outcome);
    }

    pub fn get(&self, target_id: &TargetId) -> Option<ProbeResult> {
        self.read().get(target_id).cloned()
    }

    pub fn remove(&self, target_id: &TargetId) -> Option<ProbeResult> {
        self.write().remove(target_id)
    }

    pub fn clear_all(&self) {
        self.write().clear();
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Failing if any completed probe failed, healthy if all completed
    /// probes succeeded, unknown when none has completed.
    pub fn overall_health(&self) -> OverallHealth {
        let results = self.read();
        let mut completed = results.values().filter_map(|r| r.success).peekable();

        if completed.peek().is_none() {
            return OverallHealth::Unknown;
        }
        if completed.all(|success| success) {
            OverallHealth::Healthy
        } else {
            OverallHealth::Failing
        }
    }

    // A panic while holding the lock cannot leave a half-written entry
    // (every update is a single assignment), so poisoning is ignored.
    fn read(&self) -> RwLockReadGuard<'_, HashMap<TargetId, ProbeResult>> {
        self.results.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<TargetId, ProbeResult>> {
        self.results.write().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use uuid::Uuid;

    #[test]
    fn test_dispatch_creates_pending_entry() {
        let store = ResultStore::new();
        let id = Uuid::new_v4();
        assert!(store.get(&id).is_none());

        let at = Utc::now();
        store.mark_dispatched(id, at, ProbeTrigger::Scheduled);

        let result = store.get(&id).unwrap();
        assert!(result.is_pending());
        assert_eq!(result.last_called_at, Some(at));
        assert_eq!(result.trigger, Some(ProbeTrigger::Scheduled));
    }

    #[test]
    fn test_upsert_overwrites_outcome_and_keeps_stamp() {
        let store = ResultStore::new();
        let id = Uuid::new_v4();
        let at = Utc::now();
        store.mark_dispatched(id, at, ProbeTrigger::Scheduled);

        store.upsert(id, ProbeOutcome::from_status(Duration::from_millis(10), 500));
        store.upsert(id, ProbeOutcome::from_status(Duration::from_millis(20), 200));

        let result = store.get(&id).unwrap();
        assert_eq!(result.success, Some(true));
        assert_eq!(result.status_code, Some(200));
        assert_eq!(result.error_message, None);
        assert_eq!(result.last_called_at, Some(at));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_upsert_without_dispatch_has_no_stamp() {
        let store = ResultStore::new();
        let id = Uuid::new_v4();

        store.upsert(id, ProbeOutcome::invalid_url());

        let result = store.get(&id).unwrap();
        assert_eq!(result.success, Some(false));
        assert_eq!(result.last_called_at, None);
    }

    #[test]
    fn test_remove_and_clear() {
        let store = ResultStore::new();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        store.upsert(a, ProbeOutcome::invalid_url());
        store.upsert(b, ProbeOutcome::invalid_url());

        assert!(store.remove(&a).is_some());
        assert!(store.remove(&a).is_none());
        assert_eq!(store.len(), 1);

        store.clear_all();
        assert!(store.is_empty());
    }

    #[test]
    fn test_overall_health() {
        let store = ResultStore::new();
        assert_eq!(store.overall_health(), OverallHealth::Unknown);

        let a = Uuid::new_v4();
        store.mark_dispatched(a, Utc::now(), ProbeTrigger::Scheduled);
        assert_eq!(store.overall_health(), OverallHealth::Unknown);

        store.upsert(a, ProbeOutcome::from_status(Duration::ZERO, 200));
        assert_eq!(store.overall_health(), OverallHealth::Healthy);

        let b = Uuid::new_v4();
        store.upsert(b, ProbeOutcome::from_status(Duration::ZERO, 404));
        assert_eq!(store.overall_health(), OverallHealth::Failing);
    }

    #[test]
    fn test_concurrent_writers_for_different_targets() {
        let store = std::sync::Arc::new(ResultStore::new());
        let ids: Vec<TargetId> = (0..8).map(|_| Uuid::new_v4()).collect();

        let handles: Vec<_> = ids
            .iter()
            .copied()
            .map(|id| {
                let store = store.clone();
                std::thread::spawn(move || {
                    for status in 200..250 {
                        store.upsert(id, ProbeOutcome::from_status(Duration::ZERO, status));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(store.len(), ids.len());
        for id in &ids {
            assert_eq!(store.get(id).unwrap().status_code, Some(249));
        }
    }
}
