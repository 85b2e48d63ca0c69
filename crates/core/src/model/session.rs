use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::ids::{LearnerId, PlannedSessionId, RevisionSessionId, SubjectId, TopicId};
use crate::model::step::{STEP_COUNT, StepKey, StepRecord};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum SessionStateError {
    #[error("unknown session status: {0}")]
    UnknownStatus(String),

    #[error("expected {expected} step records, got {actual}")]
    StepCount { expected: usize, actual: usize },

    #[error("duplicate step record: {0}")]
    DuplicateStep(StepKey),

    #[error("more than one step is in progress")]
    MultipleInProgress,
}

/// Lifecycle of a revision session as a whole.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    #[default]
    InProgress,
    Completed,
    Abandoned,
}

impl SessionStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Abandoned => "abandoned",
        }
    }
}

impl FromStr for SessionStatus {
    type Err = SessionStateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "in_progress" => Ok(Self::InProgress),
            "completed" => Ok(Self::Completed),
            "abandoned" => Ok(Self::Abandoned),
            _ => Err(SessionStateError::UnknownStatus(s.to_string())),
        }
    }
}

/// A subject/topic/duration slot scheduled by the timetable.
///
/// Read-only input: revision sessions are started from it, never the reverse.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlannedSession {
    pub id: PlannedSessionId,
    pub learner_id: LearnerId,
    pub learner_name: String,
    pub subject_id: SubjectId,
    pub subject_name: String,
    pub subject_icon: Option<String>,
    pub subject_color: Option<String>,
    pub topic_id: TopicId,
    pub topic_name: String,
    pub duration_minutes: u32,
    pub scheduled_for: NaiveDate,
}

/// Header information shown on every step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionOverview {
    pub revision_session_id: RevisionSessionId,
    pub planned_session_id: PlannedSessionId,
    pub learner_id: LearnerId,
    pub learner_name: String,
    pub subject_id: SubjectId,
    pub subject_name: String,
    pub subject_icon: Option<String>,
    pub subject_color: Option<String>,
    pub topic_id: TopicId,
    pub topic_name: String,
    pub duration_minutes: u32,
    pub step_count: usize,
}

impl SessionOverview {
    #[must_use]
    pub fn for_planned(planned: &PlannedSession, revision_session_id: RevisionSessionId) -> Self {
        Self {
            revision_session_id,
            planned_session_id: planned.id.clone(),
            learner_id: planned.learner_id.clone(),
            learner_name: planned.learner_name.clone(),
            subject_id: planned.subject_id.clone(),
            subject_name: planned.subject_name.clone(),
            subject_icon: planned.subject_icon.clone(),
            subject_color: planned.subject_color.clone(),
            topic_id: planned.topic_id.clone(),
            topic_name: planned.topic_name.clone(),
            duration_minutes: planned.duration_minutes,
            step_count: STEP_COUNT,
        }
    }
}

/// Full server-side view of a revision session: overview plus step records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionState {
    pub overview: SessionOverview,
    pub status: SessionStatus,
    pub steps: Vec<StepRecord>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl SessionState {
    /// Check the step list invariants: one record per key, at most one in progress.
    ///
    /// Records may arrive in any order; callers sort by key.
    ///
    /// # Errors
    ///
    /// Returns `SessionStateError` when a record is duplicated, missing, or
    /// more than one step claims to be in progress.
    pub fn validate_steps(&self) -> Result<(), SessionStateError> {
        let mut seen = [false; STEP_COUNT];
        let mut in_progress = 0;
        for record in &self.steps {
            let slot = usize::from(record.key.rank() - 1);
            if seen[slot] {
                return Err(SessionStateError::DuplicateStep(record.key));
            }
            seen[slot] = true;
            if record.status == crate::model::StepStatus::InProgress {
                in_progress += 1;
            }
        }
        if self.steps.len() != STEP_COUNT {
            return Err(SessionStateError::StepCount {
                expected: STEP_COUNT,
                actual: self.steps.len(),
            });
        }
        if in_progress > 1 {
            return Err(SessionStateError::MultipleInProgress);
        }
        Ok(())
    }

    #[must_use]
    pub fn step(&self, key: StepKey) -> Option<&StepRecord> {
        self.steps.iter().find(|record| record.key == key)
    }
}
