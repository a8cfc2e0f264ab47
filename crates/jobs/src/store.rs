use parking_lot::RwLock;
use sched_core::{audit, CohortKey, ConflictRecord, Constraints, ScheduleEntry};
use std::collections::HashMap;

/// Committed schedules keyed by cohort.
#[derive(Default)]
pub struct ScheduleStore {
    inner: RwLock<HashMap<CohortKey, Vec<ScheduleEntry>>>,
}

impl ScheduleStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drops the cohort's previous schedule and stores `entries` in its
    /// place. Returns how many entries were dropped.
    pub fn replace(&self, cohort: &CohortKey, entries: Vec<ScheduleEntry>) -> usize {
        let mut w = self.inner.write();
        let old = w.remove(cohort).map(|v| v.len()).unwrap_or(0);
        if !entries.is_empty() {
            w.insert(cohort.clone(), entries);
        }
        old
    }

    pub fn get(&self, cohort: &CohortKey) -> Option<Vec<ScheduleEntry>> {
        self.inner.read().get(cohort).cloned()
    }

    pub fn cohorts(&self) -> Vec<CohortKey> {
        let mut keys: Vec<_> = self.inner.read().keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Every committed entry that does not belong to `cohort`.
    pub fn external_for(&self, cohort: &CohortKey) -> Vec<ScheduleEntry> {
        self.inner
            .read()
            .iter()
            .filter(|(k, _)| *k != cohort)
            .flat_map(|(_, v)| v.iter().cloned())
            .collect()
    }

    /// Re-runs conflict detection on a committed schedule.
    pub fn audit(&self, cohort: &CohortKey, constraints: &Constraints) -> Vec<ConflictRecord> {
        let own = self.get(cohort).unwrap_or_default();
        let others = self.external_for(cohort);
        audit(cohort, &own, &others, constraints)
    }
}
