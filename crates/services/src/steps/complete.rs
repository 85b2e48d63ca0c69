use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use url::Url;

use revise_core::model::{LearnerIdentity, ReflectionDraft, StepKey, StepRecord};
use storage::repository::ReflectionRepository;

use super::{ConfidenceLevel, ensure_current, patch_typed, read_payload};
use crate::audio::{AudioCaptureBridge, AudioClip, AudioReference};
use crate::error::{EngineError, StepError};
use crate::session_run::SessionRunEngine;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompletePayload {
    pub post_confidence: Option<ConfidenceLevel>,
    pub journal_note: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audio_note_url: Option<Url>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audio_duration_seconds: Option<u32>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// What the learner hands in on the last step.
#[derive(Debug, Clone, Default)]
pub struct CompleteSubmission {
    pub post_confidence: Option<ConfidenceLevel>,
    pub journal_note: Option<String>,
    pub audio: Option<AudioClip>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompleteOutcome {
    pub audio: Option<AudioReference>,
    pub reflection_written: bool,
}

/// Step 6: post-session confidence, journal note and optional voice note.
pub struct CompleteStep {
    audio: Arc<AudioCaptureBridge>,
    reflections: Arc<dyn ReflectionRepository>,
    learner: LearnerIdentity,
    uploaded: Option<AudioReference>,
    reflection_id: Option<i64>,
}

impl CompleteStep {
    #[must_use]
    pub fn new(
        audio: Arc<AudioCaptureBridge>,
        reflections: Arc<dyn ReflectionRepository>,
        learner: LearnerIdentity,
    ) -> Self {
        Self {
            audio,
            reflections,
            learner,
            uploaded: None,
            reflection_id: None,
        }
    }

    /// # Errors
    ///
    /// Returns `StepError::Payload` if the stored payload is malformed.
    pub fn current(engine: &SessionRunEngine) -> Result<CompletePayload, StepError> {
        read_payload(engine, StepKey::Complete)
    }

    /// Upload the voice note, write the reflection and finish the session.
    ///
    /// A reflection is written when there is a journal note or a voice note;
    /// failing to write it is logged and does not stop the finish. Work that
    /// succeeded on an earlier attempt is not repeated on retry.
    ///
    /// # Errors
    ///
    /// Returns `StepError::NotCurrentStep` if the learner has stepped back
    /// from the last step. Returns `StepError::Audio` if the voice note cannot be uploaded, in
    /// which case nothing else happens and the learner may resubmit without
    /// audio. Returns engine errors if the payload, the step completion or
    /// the session completion cannot be saved.
    pub async fn finish(
        &mut self,
        engine: &mut SessionRunEngine,
        submission: CompleteSubmission,
    ) -> Result<CompleteOutcome, StepError> {
        let session_id = engine
            .overview()
            .map(|o| o.revision_session_id.clone())
            .ok_or(EngineError::NotLoaded)?;
        ensure_current(engine, StepKey::Complete)?;

        match submission.audio {
            Some(clip) if self.uploaded.is_none() => {
                let reference = self.audio.upload(&self.learner, &session_id, clip).await?;
                self.uploaded = Some(reference);
            }
            Some(_) => {}
            None => self.uploaded = None,
        }

        let journal_note = submission
            .journal_note
            .map(|note| note.trim().to_string())
            .filter(|note| !note.is_empty());

        if self.reflection_id.is_none() {
            let draft = ReflectionDraft {
                learner_id: self.learner.learner_id.clone(),
                revision_session_id: session_id.clone(),
                text_note: journal_note.clone(),
                audio_url: self.uploaded.as_ref().map(|a| a.url.clone()),
                audio_duration_seconds: self.uploaded.as_ref().and_then(|a| a.duration_seconds),
            };
            if let Ok(reflection) = draft.validate() {
                match self
                    .reflections
                    .insert_reflection(&reflection, engine.now())
                    .await
                {
                    Ok(id) => self.reflection_id = Some(id),
                    Err(err) => {
                        tracing::warn!(revision_session_id = %session_id, error = %err, "failed to save reflection");
                    }
                }
            }
        }

        let payload = CompletePayload {
            post_confidence: submission.post_confidence,
            journal_note,
            audio_note_url: self.uploaded.as_ref().map(|a| a.url.clone()),
            audio_duration_seconds: self.uploaded.as_ref().and_then(|a| a.duration_seconds),
            completed_at: Some(engine.now()),
        };
        patch_typed(engine, StepKey::Complete, &payload).await?;

        if !engine
            .record(StepKey::Complete)
            .is_some_and(StepRecord::is_completed)
        {
            engine.advance_step().await?;
        }
        engine.finish_session().await?;

        Ok(CompleteOutcome {
            audio: self.uploaded.clone(),
            reflection_written: self.reflection_id.is_some(),
        })
    }
}
