use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use revise_core::model::StepKey;

use super::patch_and_advance;
use crate::error::StepError;
use crate::session_run::SessionRunEngine;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReinforcePayload {
    pub slides_viewed: u32,
    pub examples_viewed: u32,
    pub completed_at: Option<DateTime<Utc>>,
}

/// Which teaching slides and worked examples have been opened.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReinforceProgress {
    slides: BTreeSet<usize>,
    examples: BTreeSet<usize>,
}

impl ReinforceProgress {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn view_slide(&mut self, index: usize) {
        self.slides.insert(index);
    }

    pub fn view_example(&mut self, index: usize) {
        self.examples.insert(index);
    }

    #[must_use]
    pub fn payload(&self, completed_at: Option<DateTime<Utc>>) -> ReinforcePayload {
        ReinforcePayload {
            slides_viewed: u32::try_from(self.slides.len()).unwrap_or(u32::MAX),
            examples_viewed: u32::try_from(self.examples.len()).unwrap_or(u32::MAX),
            completed_at,
        }
    }

    /// # Errors
    ///
    /// Returns engine errors if the payload or the completion cannot be saved.
    pub async fn finish(&self, engine: &mut SessionRunEngine) -> Result<StepKey, StepError> {
        let payload = self.payload(Some(engine.now()));
        patch_and_advance(engine, StepKey::Reinforce, &payload).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repeated_views_count_once() {
        let mut progress = ReinforceProgress::new();
        progress.view_slide(0);
        progress.view_slide(0);
        progress.view_slide(2);
        progress.view_example(1);
        let payload = progress.payload(None);
        assert_eq!(payload.slides_viewed, 2);
        assert_eq!(payload.examples_viewed, 1);
    }
}
