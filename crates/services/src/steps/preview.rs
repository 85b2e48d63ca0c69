use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use revise_core::model::StepKey;

use super::{ConfidenceLevel, patch_and_advance, read_payload};
use crate::error::StepError;
use crate::session_run::SessionRunEngine;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PreviewPayload {
    pub pre_confidence: Option<ConfidenceLevel>,
    pub social_media_off: bool,
    pub started_at: Option<DateTime<Utc>>,
}

/// Step 1: check in before revising.
pub struct PreviewStep;

impl PreviewStep {
    /// # Errors
    ///
    /// Returns `StepError::Payload` if the stored payload is malformed.
    pub fn current(engine: &SessionRunEngine) -> Result<PreviewPayload, StepError> {
        read_payload(engine, StepKey::Preview)
    }

    /// Record the check-in and move on to recall.
    ///
    /// # Errors
    ///
    /// Returns `StepError::MissingConfidence` without a confidence level, and
    /// engine errors if the payload or the completion cannot be saved.
    pub async fn start(
        engine: &mut SessionRunEngine,
        confidence: Option<ConfidenceLevel>,
        social_media_off: bool,
    ) -> Result<StepKey, StepError> {
        let confidence = confidence.ok_or(StepError::MissingConfidence)?;
        let payload = PreviewPayload {
            pre_confidence: Some(confidence),
            social_media_off,
            started_at: Some(engine.now()),
        };
        patch_and_advance(engine, StepKey::Preview, &payload).await
    }
}
