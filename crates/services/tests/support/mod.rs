#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use revise_core::model::{
    LearnerId, LearnerIdentity, PlannedSession, PlannedSessionId, RevisionSessionId,
    SessionState, StepKey, StepPayload, SubjectId, TopicId,
};
use services::mnemonics::{
    GeneratedMnemonic, GenerationPayload, GenerationResponse, GenerationStatus, MnemonicGenerator,
};
use storage::repository::{InMemoryRepository, RevisionSessionRepository, StorageError};

pub fn learner() -> LearnerIdentity {
    LearnerIdentity::new(LearnerId::new("learner-1").unwrap()).with_display_name("Sam")
}

pub fn planned(id: &str, subject: &str, topic: &str) -> PlannedSession {
    PlannedSession {
        id: PlannedSessionId::new(id).unwrap(),
        learner_id: learner().learner_id,
        learner_name: "Sam".into(),
        subject_id: SubjectId::new(subject.to_lowercase().replace(' ', "-")).unwrap(),
        subject_name: subject.into(),
        subject_icon: None,
        subject_color: Some("#4caf50".into()),
        topic_id: TopicId::new(topic.to_lowercase().replace(' ', "-")).unwrap(),
        topic_name: topic.into(),
        duration_minutes: 25,
        scheduled_for: NaiveDate::from_ymd_opt(2026, 3, 2).unwrap(),
    }
}

pub fn ready(id: &str, lyrics: &str) -> GenerationResponse {
    GenerationResponse {
        success: true,
        status: Some(GenerationStatus::Ready),
        mnemonic: Some(GeneratedMnemonic {
            id: Some(id.into()),
            lyrics: Some(lyrics.into()),
            audio_url: Some(format!("https://cdn.example.test/{id}.mp3")),
            style: None,
            duration_seconds: Some(42.0),
        }),
        ..GenerationResponse::default()
    }
}

/// Answers from a script, then with a stock ready response.
#[derive(Default)]
pub struct FakeGenerator {
    script: Mutex<VecDeque<GenerationResponse>>,
    calls: AtomicUsize,
    payloads: Mutex<Vec<GenerationPayload>>,
}

impl FakeGenerator {
    pub fn scripted(responses: impl IntoIterator<Item = GenerationResponse>) -> Self {
        Self {
            script: Mutex::new(responses.into_iter().collect()),
            ..Self::default()
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn payloads(&self) -> Vec<GenerationPayload> {
        self.payloads.lock().unwrap().clone()
    }
}

#[async_trait]
impl MnemonicGenerator for FakeGenerator {
    async fn generate(&self, payload: &GenerationPayload) -> GenerationResponse {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        self.payloads.lock().unwrap().push(payload.clone());
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| ready(&format!("m-{call}"), "Light in, sugar out"))
    }
}

/// Session repository whose operations can be made to fail on demand.
#[derive(Default)]
pub struct FlakyRevisions {
    pub inner: InMemoryRepository,
    pub fail_load: AtomicBool,
    pub fail_patch: AtomicBool,
    pub fail_advance: AtomicBool,
    pub fail_finish: AtomicBool,
}

impl FlakyRevisions {
    pub fn over(inner: InMemoryRepository) -> Self {
        Self {
            inner,
            ..Self::default()
        }
    }

    pub fn set(flag: &AtomicBool, on: bool) {
        flag.store(on, Ordering::SeqCst);
    }

    fn check(flag: &AtomicBool) -> Result<(), StorageError> {
        if flag.load(Ordering::SeqCst) {
            return Err(StorageError::Connection("network unreachable".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl RevisionSessionRepository for FlakyRevisions {
    async fn start_or_get(
        &self,
        planned_id: &PlannedSessionId,
        now: DateTime<Utc>,
    ) -> Result<RevisionSessionId, StorageError> {
        Self::check(&self.fail_load)?;
        self.inner.start_or_get(planned_id, now).await
    }

    async fn get_session_state(
        &self,
        id: &RevisionSessionId,
    ) -> Result<SessionState, StorageError> {
        Self::check(&self.fail_load)?;
        self.inner.get_session_state(id).await
    }

    async fn patch_step(
        &self,
        id: &RevisionSessionId,
        key: StepKey,
        patch: &StepPayload,
    ) -> Result<(), StorageError> {
        Self::check(&self.fail_patch)?;
        self.inner.patch_step(id, key, patch).await
    }

    async fn mark_step_complete(
        &self,
        id: &RevisionSessionId,
        key: StepKey,
        completed_at: DateTime<Utc>,
    ) -> Result<(), StorageError> {
        Self::check(&self.fail_advance)?;
        self.inner.mark_step_complete(id, key, completed_at).await
    }

    async fn complete_session(
        &self,
        id: &RevisionSessionId,
        completed_at: DateTime<Utc>,
    ) -> Result<(), StorageError> {
        Self::check(&self.fail_finish)?;
        self.inner.complete_session(id, completed_at).await
    }
}
