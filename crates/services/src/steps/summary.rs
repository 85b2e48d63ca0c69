use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use revise_core::model::{
    LearnerIdentity, Mnemonic, MnemonicRequestId, MnemonicStyle, StepKey,
    is_subject_mnemonic_suitable,
};

use super::{patch_and_advance, patch_typed, read_payload};
use crate::error::{EngineError, StepError};
use crate::mnemonics::{MnemonicRequest, MnemonicTracker};
use crate::session_run::SessionRunEngine;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SummaryPayload {
    pub selected_style: Option<MnemonicStyle>,
    pub mnemonic: Option<Mnemonic>,
    pub mnemonic_request_id: Option<MnemonicRequestId>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// Step 5: key points plus an optional generated mnemonic.
pub struct SummaryStep {
    tracker: Arc<MnemonicTracker>,
    learner: LearnerIdentity,
    level: Option<String>,
    exam_board: Option<String>,
    style: Option<MnemonicStyle>,
    mnemonic: Option<Mnemonic>,
    request_id: Option<MnemonicRequestId>,
}

impl SummaryStep {
    #[must_use]
    pub fn new(tracker: Arc<MnemonicTracker>, learner: LearnerIdentity) -> Self {
        Self {
            tracker,
            learner,
            level: None,
            exam_board: None,
            style: None,
            mnemonic: None,
            request_id: None,
        }
    }

    #[must_use]
    pub fn with_level(mut self, level: Option<String>) -> Self {
        self.level = level;
        self
    }

    #[must_use]
    pub fn with_exam_board(mut self, exam_board: Option<String>) -> Self {
        self.exam_board = exam_board;
        self
    }

    /// Pick up a style and mnemonic saved before a reload.
    ///
    /// # Errors
    ///
    /// Returns `StepError::Payload` if the stored payload is malformed.
    pub fn restore(&mut self, engine: &SessionRunEngine) -> Result<(), StepError> {
        let saved: SummaryPayload = read_payload(engine, StepKey::Summary)?;
        self.style = saved.selected_style;
        self.mnemonic = saved.mnemonic;
        self.request_id = saved.mnemonic_request_id;
        Ok(())
    }

    #[must_use]
    pub fn mnemonic(&self) -> Option<&Mnemonic> {
        self.mnemonic.as_ref()
    }

    #[must_use]
    pub fn selected_style(&self) -> Option<MnemonicStyle> {
        self.style
    }

    #[must_use]
    pub fn request_id(&self) -> Option<&MnemonicRequestId> {
        self.request_id.as_ref()
    }

    /// Whether the loaded session's subject offers mnemonics at all.
    #[must_use]
    pub fn mnemonic_allowed(engine: &SessionRunEngine) -> bool {
        engine
            .overview()
            .is_some_and(|o| is_subject_mnemonic_suitable(&o.subject_name))
    }

    /// Generate a mnemonic in `style` and save it on the summary step.
    ///
    /// The local mnemonic is `Generating` until the tracked request resolves,
    /// then replaced by the result. A failed generation is not an error: the
    /// mnemonic comes back `Failed` with the style kept for `retry`.
    ///
    /// # Errors
    ///
    /// Returns `StepError::Mnemonic` for subjects without mnemonics (nothing
    /// is requested), `EngineError::NotLoaded` before a session is loaded,
    /// and engine errors if the payload cannot be saved.
    pub async fn select_style(
        &mut self,
        engine: &mut SessionRunEngine,
        style: MnemonicStyle,
    ) -> Result<&Mnemonic, StepError> {
        let overview = engine.overview().ok_or(EngineError::NotLoaded)?;
        let request = MnemonicRequest {
            topic_id: overview.topic_id.clone(),
            topic_name: overview.topic_name.clone(),
            subject_name: overview.subject_name.clone(),
            style,
            level: self.level.clone(),
            exam_board: self.exam_board.clone(),
            revision_session_id: Some(overview.revision_session_id.clone()),
        };

        let previous = self.mnemonic.replace(Mnemonic::generating(style));
        let tracked = match self.tracker.generate(&self.learner, &request).await {
            Ok(tracked) => tracked,
            Err(err) => {
                self.mnemonic = previous;
                return Err(err.into());
            }
        };

        self.style = Some(style);
        self.request_id = tracked.request_id;
        let mnemonic = self.mnemonic.insert(tracked.mnemonic).clone();

        let payload = SummaryPayload {
            selected_style: Some(style),
            mnemonic: Some(mnemonic),
            mnemonic_request_id: self.request_id.clone(),
            completed_at: None,
        };
        patch_typed(engine, StepKey::Summary, &payload).await?;

        self.mnemonic.as_ref().ok_or(StepError::NoStyleSelected)
    }

    /// Request again in the last chosen style under a new tracking row.
    ///
    /// # Errors
    ///
    /// Returns `StepError::NoStyleSelected` if no style was ever chosen, and
    /// the errors of `select_style` otherwise.
    pub async fn retry(&mut self, engine: &mut SessionRunEngine) -> Result<&Mnemonic, StepError> {
        let style = self
            .style
            .or_else(|| self.mnemonic.as_ref().map(Mnemonic::style))
            .ok_or(StepError::NoStyleSelected)?;
        self.select_style(engine, style).await
    }

    /// # Errors
    ///
    /// Returns engine errors if the payload or the completion cannot be saved.
    pub async fn finish(&self, engine: &mut SessionRunEngine) -> Result<StepKey, StepError> {
        let payload = SummaryPayload {
            selected_style: self.style,
            mnemonic: self.mnemonic.clone(),
            mnemonic_request_id: self.request_id.clone(),
            completed_at: Some(engine.now()),
        };
        patch_and_advance(engine, StepKey::Summary, &payload).await
    }
}
