use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

use crate::model::ids::{LearnerId, RevisionSessionId};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ReflectionError {
    #[error("a reflection needs a text note or an audio note")]
    Empty,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TranscriptionStatus {
    Pending,
}

impl TranscriptionStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
        }
    }
}

/// Context tag stored with every end-of-session reflection.
pub const SESSION_REFLECTION_CONTEXT: &str = "session_reflection";

/// Unvalidated reflection captured on the final step.
#[derive(Clone, Debug)]
pub struct ReflectionDraft {
    pub learner_id: LearnerId,
    pub revision_session_id: RevisionSessionId,
    pub text_note: Option<String>,
    pub audio_url: Option<Url>,
    pub audio_duration_seconds: Option<u32>,
}

impl ReflectionDraft {
    /// Normalize the note and check that there is something to store.
    ///
    /// # Errors
    ///
    /// Returns `ReflectionError::Empty` if there is neither a note nor audio.
    pub fn validate(self) -> Result<Reflection, ReflectionError> {
        let text_note = self
            .text_note
            .map(|note| note.trim().to_string())
            .filter(|note| !note.is_empty());

        if text_note.is_none() && self.audio_url.is_none() {
            return Err(ReflectionError::Empty);
        }

        let audio_duration_seconds = self
            .audio_url
            .as_ref()
            .map(|_| self.audio_duration_seconds.unwrap_or(0));

        Ok(Reflection {
            learner_id: self.learner_id,
            revision_session_id: self.revision_session_id,
            text_note,
            audio_url: self.audio_url,
            audio_duration_seconds,
        })
    }
}

/// A learner's end-of-session reflection (text, audio, or both).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reflection {
    learner_id: LearnerId,
    revision_session_id: RevisionSessionId,
    text_note: Option<String>,
    audio_url: Option<Url>,
    audio_duration_seconds: Option<u32>,
}

impl Reflection {
    #[must_use]
    pub fn learner_id(&self) -> &LearnerId {
        &self.learner_id
    }

    #[must_use]
    pub fn revision_session_id(&self) -> &RevisionSessionId {
        &self.revision_session_id
    }

    #[must_use]
    pub fn text_note(&self) -> Option<&str> {
        self.text_note.as_deref()
    }

    #[must_use]
    pub fn audio_url(&self) -> Option<&Url> {
        self.audio_url.as_ref()
    }

    #[must_use]
    pub fn audio_duration_seconds(&self) -> Option<u32> {
        self.audio_duration_seconds
    }

    #[must_use]
    pub fn context_type(&self) -> &'static str {
        SESSION_REFLECTION_CONTEXT
    }

    /// Audio notes are queued for transcription; text-only notes are not.
    #[must_use]
    pub fn transcription_status(&self) -> Option<TranscriptionStatus> {
        self.audio_url.as_ref().map(|_| TranscriptionStatus::Pending)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draft(note: Option<&str>, audio: Option<&str>) -> ReflectionDraft {
        ReflectionDraft {
            learner_id: LearnerId::new("learner-1").unwrap(),
            revision_session_id: RevisionSessionId::new("rs-1").unwrap(),
            text_note: note.map(str::to_string),
            audio_url: audio.map(|u| Url::parse(u).unwrap()),
            audio_duration_seconds: Some(12),
        }
    }

    #[test]
    fn text_only_reflection_has_no_audio_fields() {
        let reflection = draft(Some("  chlorophyll absorbs light "), None)
            .validate()
            .unwrap();
        assert_eq!(reflection.text_note(), Some("chlorophyll absorbs light"));
        assert!(reflection.audio_url().is_none());
        assert!(reflection.audio_duration_seconds().is_none());
        assert!(reflection.transcription_status().is_none());
    }

    #[test]
    fn audio_reflection_is_queued_for_transcription() {
        let reflection = draft(None, Some("https://cdn.example/voice.webm"))
            .validate()
            .unwrap();
        assert_eq!(reflection.audio_duration_seconds(), Some(12));
        assert_eq!(
            reflection.transcription_status(),
            Some(TranscriptionStatus::Pending)
        );
    }

    #[test]
    fn blank_note_without_audio_is_rejected() {
        assert_eq!(
            draft(Some("   "), None).validate(),
            Err(ReflectionError::Empty)
        );
    }
}
