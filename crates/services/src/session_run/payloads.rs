use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use revise_core::model::{StepKey, StepPayload, StepRecord, StepStatus};

/// Where a reloaded session should land.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResumePoint {
    At(StepKey),
    Finished,
}

impl ResumePoint {
    /// The step to show: the resume step, or the last step once finished.
    #[must_use]
    pub fn step(self) -> StepKey {
        match self {
            Self::At(key) => key,
            Self::Finished => StepKey::last(),
        }
    }
}

/// Step records of one session keyed by step, in step order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StepPayloadStore {
    records: BTreeMap<StepKey, StepRecord>,
}

impl StepPayloadStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from the server's record list. Later duplicates replace earlier ones.
    #[must_use]
    pub fn from_records(records: impl IntoIterator<Item = StepRecord>) -> Self {
        Self {
            records: records.into_iter().map(|r| (r.key, r)).collect(),
        }
    }

    #[must_use]
    pub fn record(&self, key: StepKey) -> Option<&StepRecord> {
        self.records.get(&key)
    }

    pub fn records(&self) -> impl Iterator<Item = &StepRecord> {
        self.records.values()
    }

    /// Payload of a step, empty if the record has not materialized.
    #[must_use]
    pub fn payload(&self, key: StepKey) -> StepPayload {
        self.records
            .get(&key)
            .map(|r| r.payload.clone())
            .unwrap_or_default()
    }

    #[must_use]
    pub fn status(&self, key: StepKey) -> StepStatus {
        self.records
            .get(&key)
            .map_or(StepStatus::NotStarted, |r| r.status)
    }

    pub fn merge(&mut self, key: StepKey, patch: &StepPayload) {
        self.records
            .entry(key)
            .or_insert_with(|| StepRecord::not_started(key))
            .payload
            .merge(patch);
    }

    /// Mirror of the server transition: complete `key`, start the next step.
    pub fn mark_completed(&mut self, key: StepKey, at: DateTime<Utc>) {
        let record = self
            .records
            .entry(key)
            .or_insert_with(|| StepRecord::not_started(key));
        if !record.is_completed() {
            record.status = StepStatus::Completed;
            record.completed_at = Some(at);
            record.started_at.get_or_insert(at);
        }

        if let Some(next) = key.next() {
            let next = self
                .records
                .entry(next)
                .or_insert_with(|| StepRecord::not_started(next));
            if next.status == StepStatus::NotStarted {
                next.status = StepStatus::InProgress;
                next.started_at = Some(at);
            }
        }
    }

    /// First step in progress; else the first step not yet completed;
    /// else `Finished`. An empty store resumes at the first step.
    #[must_use]
    pub fn resume_point(&self) -> ResumePoint {
        if let Some(record) = self
            .records
            .values()
            .find(|r| r.status == StepStatus::InProgress)
        {
            return ResumePoint::At(record.key);
        }
        StepKey::ALL
            .into_iter()
            .find(|key| self.status(*key) != StepStatus::Completed)
            .map_or(ResumePoint::Finished, ResumePoint::At)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use revise_core::time::fixed_now;

    fn fresh() -> StepPayloadStore {
        let mut records: Vec<StepRecord> = StepKey::ALL.map(StepRecord::not_started).to_vec();
        records[0].status = StepStatus::InProgress;
        StepPayloadStore::from_records(records)
    }

    #[test]
    fn missing_payload_defaults_to_empty() {
        let store = StepPayloadStore::new();
        assert!(store.payload(StepKey::Practice).is_empty());
        assert_eq!(store.resume_point(), ResumePoint::At(StepKey::Preview));
    }

    #[test]
    fn resume_follows_completed_prefix() {
        for completed in 0..=StepKey::ALL.len() {
            let mut store = fresh();
            for key in &StepKey::ALL[..completed] {
                store.mark_completed(*key, fixed_now());
            }
            let expected = StepKey::ALL
                .get(completed)
                .copied()
                .map_or(ResumePoint::Finished, ResumePoint::At);
            assert_eq!(store.resume_point(), expected, "after {completed} steps");
        }
    }

    #[test]
    fn in_progress_wins_over_earlier_gaps() {
        let mut records: Vec<StepRecord> = StepKey::ALL.map(StepRecord::not_started).to_vec();
        records[2].status = StepStatus::InProgress;
        let store = StepPayloadStore::from_records(records);
        assert_eq!(store.resume_point(), ResumePoint::At(StepKey::Reinforce));
    }

    #[test]
    fn finished_lands_on_last_step() {
        assert_eq!(ResumePoint::Finished.step(), StepKey::Complete);
    }

    #[test]
    fn merge_creates_missing_record() {
        let mut store = StepPayloadStore::new();
        store.merge(StepKey::Summary, &StepPayload::new().with("selected_style", "rap"));
        assert_eq!(store.payload(StepKey::Summary).len(), 1);
        assert_eq!(store.status(StepKey::Summary), StepStatus::NotStarted);
    }
}
