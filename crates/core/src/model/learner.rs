use serde::{Deserialize, Serialize};

use crate::model::ids::LearnerId;

/// The learner on whose behalf an operation runs.
///
/// Passed explicitly to anything that scopes data by learner, so callers and
/// tests decide the identity instead of it being read from ambient context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LearnerIdentity {
    pub learner_id: LearnerId,
    pub display_name: Option<String>,
}

impl LearnerIdentity {
    #[must_use]
    pub fn new(learner_id: LearnerId) -> Self {
        Self {
            learner_id,
            display_name: None,
        }
    }

    #[must_use]
    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }
}
