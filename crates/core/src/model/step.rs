use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::payload::StepPayload;

//
// ─── ERRORS ───────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum StepError {
    #[error("unknown step key: {0}")]
    UnknownKey(String),

    #[error("unknown step status: {0}")]
    UnknownStatus(String),

    #[error("step {key} must have index {expected}, got {actual}")]
    IndexMismatch {
        key: StepKey,
        expected: u8,
        actual: u8,
    },
}

//
// ─── STEP KEY ─────────────────────────────────────────────────────────────────
//

/// Number of steps in every revision session.
pub const STEP_COUNT: usize = 6;

/// The six fixed activities of a revision session, in the order they are visited.
///
/// The discriminant is the 1-based rank, and the derived ordering follows it,
/// so `StepKey::Recall < StepKey::Practice` holds without consulting a list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepKey {
    Preview = 1,
    Recall = 2,
    Reinforce = 3,
    Practice = 4,
    Summary = 5,
    Complete = 6,
}

impl StepKey {
    pub const ALL: [StepKey; STEP_COUNT] = [
        StepKey::Preview,
        StepKey::Recall,
        StepKey::Reinforce,
        StepKey::Practice,
        StepKey::Summary,
        StepKey::Complete,
    ];

    /// 1-based position of this step in the session.
    #[must_use]
    pub fn rank(self) -> u8 {
        self as u8
    }

    #[must_use]
    pub fn from_rank(rank: u8) -> Option<Self> {
        match rank {
            1 => Some(Self::Preview),
            2 => Some(Self::Recall),
            3 => Some(Self::Reinforce),
            4 => Some(Self::Practice),
            5 => Some(Self::Summary),
            6 => Some(Self::Complete),
            _ => None,
        }
    }

    #[must_use]
    pub fn first() -> Self {
        Self::Preview
    }

    #[must_use]
    pub fn last() -> Self {
        Self::Complete
    }

    #[must_use]
    pub fn next(self) -> Option<Self> {
        Self::from_rank(self.rank() + 1)
    }

    #[must_use]
    pub fn previous(self) -> Option<Self> {
        self.rank().checked_sub(1).and_then(Self::from_rank)
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Preview => "preview",
            Self::Recall => "recall",
            Self::Reinforce => "reinforce",
            Self::Practice => "practice",
            Self::Summary => "summary",
            Self::Complete => "complete",
        }
    }

    /// Human-facing title of the step.
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Preview => "Preview",
            Self::Recall => "Recall",
            Self::Reinforce => "Core Teaching",
            Self::Practice => "Practice",
            Self::Summary => "Summary",
            Self::Complete => "Complete",
        }
    }
}

impl fmt::Display for StepKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StepKey {
    type Err = StepError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|key| key.as_str() == s)
            .ok_or_else(|| StepError::UnknownKey(s.to_string()))
    }
}

//
// ─── STEP STATUS ──────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    #[default]
    #[serde(alias = "pending")]
    NotStarted,
    InProgress,
    Completed,
}

impl StepStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::NotStarted => "not_started",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
        }
    }
}

impl FromStr for StepStatus {
    type Err = StepError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "not_started" | "pending" => Ok(Self::NotStarted),
            "in_progress" => Ok(Self::InProgress),
            "completed" => Ok(Self::Completed),
            _ => Err(StepError::UnknownStatus(s.to_string())),
        }
    }
}

//
// ─── STEP RECORD ──────────────────────────────────────────────────────────────
//

/// Durable progress record for one step of a revision session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepRecord {
    pub key: StepKey,
    pub index: u8,
    pub status: StepStatus,
    #[serde(default)]
    pub payload: StepPayload,
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
}

impl StepRecord {
    /// A fresh record with an empty payload.
    #[must_use]
    pub fn not_started(key: StepKey) -> Self {
        Self {
            key,
            index: key.rank(),
            status: StepStatus::NotStarted,
            payload: StepPayload::new(),
            started_at: None,
            completed_at: None,
        }
    }

    /// Rehydrate a record from storage, checking that the index matches the key.
    ///
    /// # Errors
    ///
    /// Returns `StepError::IndexMismatch` if `index` is not the key's rank.
    pub fn from_persisted(
        key: StepKey,
        index: u8,
        status: StepStatus,
        payload: StepPayload,
        started_at: Option<DateTime<Utc>>,
        completed_at: Option<DateTime<Utc>>,
    ) -> Result<Self, StepError> {
        if index != key.rank() {
            return Err(StepError::IndexMismatch {
                key,
                expected: key.rank(),
                actual: index,
            });
        }
        Ok(Self {
            key,
            index,
            status,
            payload,
            started_at,
            completed_at,
        })
    }

    #[must_use]
    pub fn is_completed(&self) -> bool {
        self.status == StepStatus::Completed
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ranks_are_one_based_and_ordered() {
        for (i, key) in StepKey::ALL.iter().enumerate() {
            assert_eq!(usize::from(key.rank()), i + 1);
            assert_eq!(StepKey::from_rank(key.rank()), Some(*key));
        }
        assert!(StepKey::Preview < StepKey::Recall);
        assert!(StepKey::Summary < StepKey::Complete);
        assert_eq!(StepKey::from_rank(0), None);
        assert_eq!(StepKey::from_rank(7), None);
    }

    #[test]
    fn next_and_previous_stop_at_the_ends() {
        assert_eq!(StepKey::Preview.previous(), None);
        assert_eq!(StepKey::Preview.next(), Some(StepKey::Recall));
        assert_eq!(StepKey::Complete.next(), None);
        assert_eq!(StepKey::Complete.previous(), Some(StepKey::Summary));
    }

    #[test]
    fn keys_parse_from_wire_names() {
        assert_eq!("reinforce".parse::<StepKey>().unwrap(), StepKey::Reinforce);
        assert!(matches!(
            "reflection".parse::<StepKey>(),
            Err(StepError::UnknownKey(_))
        ));
        let json = serde_json::to_string(&StepKey::Practice).unwrap();
        assert_eq!(json, "\"practice\"");
    }

    #[test]
    fn pending_is_accepted_as_not_started() {
        assert_eq!("pending".parse::<StepStatus>().unwrap(), StepStatus::NotStarted);
        let status: StepStatus = serde_json::from_str("\"pending\"").unwrap();
        assert_eq!(status, StepStatus::NotStarted);
    }

    #[test]
    fn persisted_record_rejects_wrong_index() {
        let err = StepRecord::from_persisted(
            StepKey::Recall,
            3,
            StepStatus::NotStarted,
            StepPayload::new(),
            None,
            None,
        )
        .unwrap_err();
        assert!(matches!(
            err,
            StepError::IndexMismatch {
                expected: 2,
                actual: 3,
                ..
            }
        ));
    }
}
