use std::sync::Arc;

use revise_core::model::LearnerIdentity;
use storage::objects::{AudioObjectStore, FsAudioStore};
use storage::repository::{PlannedSessionRepository, Storage};

use crate::Clock;
use crate::audio::AudioCaptureBridge;
use crate::config::{DEFAULT_LEVEL, ReviseConfig};
use crate::error::AppServicesError;
use crate::mnemonics::{
    HttpMnemonicGenerator, MnemonicActivityService, MnemonicGenerator, MnemonicTracker,
};
use crate::session_run::SessionRunEngine;
use crate::steps::{CompleteStep, SummaryStep};

/// Assembles the services a revision session run needs.
#[derive(Clone)]
pub struct AppServices {
    clock: Clock,
    storage: Storage,
    tracker: Arc<MnemonicTracker>,
    audio: Arc<AudioCaptureBridge>,
    activity: Arc<MnemonicActivityService>,
    level: String,
    exam_board: Option<String>,
}

impl AppServices {
    /// Build services backed by `SQLite` storage and a filesystem audio store.
    ///
    /// # Errors
    ///
    /// Returns `AppServicesError` if storage initialization or the audio
    /// store setup fails.
    pub async fn new_sqlite(config: &ReviseConfig, clock: Clock) -> Result<Self, AppServicesError> {
        let storage = Storage::sqlite(&config.db_url).await?;
        let audio_store = FsAudioStore::new(config.audio.root.clone(), config.audio.public_base.clone())?;
        if config.mnemonic.is_none() {
            tracing::warn!("REVISE_MNEMONIC_URL not set; mnemonic generation will fail");
        }
        let callback_url = config.mnemonic.as_ref().and_then(|m| m.callback_url.clone());
        let generator = HttpMnemonicGenerator::new(config.mnemonic.clone());

        let tracker = MnemonicTracker::new(
            Arc::clone(&storage.mnemonic_requests),
            Arc::new(generator),
            clock,
        )
        .with_server_tracking(config.server_tracking)
        .with_callback_url(callback_url);

        Ok(Self::from_parts(storage, tracker, Arc::new(audio_store), clock)
            .with_exam_metadata(config.level.clone(), config.exam_board.clone()))
    }

    /// Build services over in-memory storage with the given collaborators.
    #[must_use]
    pub fn in_memory(
        clock: Clock,
        generator: Arc<dyn MnemonicGenerator>,
        audio_store: Arc<dyn AudioObjectStore>,
    ) -> Self {
        let storage = Storage::in_memory();
        let tracker = MnemonicTracker::new(Arc::clone(&storage.mnemonic_requests), generator, clock);
        Self::from_parts(storage, tracker, audio_store, clock)
    }

    #[must_use]
    pub fn from_parts(
        storage: Storage,
        tracker: MnemonicTracker,
        audio_store: Arc<dyn AudioObjectStore>,
        clock: Clock,
    ) -> Self {
        let activity = MnemonicActivityService::new(Arc::clone(&storage.mnemonic_activity), clock);
        Self {
            clock,
            tracker: Arc::new(tracker),
            audio: Arc::new(AudioCaptureBridge::new(audio_store, clock)),
            activity: Arc::new(activity),
            storage,
            level: DEFAULT_LEVEL.to_string(),
            exam_board: None,
        }
    }

    #[must_use]
    pub fn with_exam_metadata(mut self, level: String, exam_board: Option<String>) -> Self {
        self.level = level;
        self.exam_board = exam_board;
        self
    }

    /// A fresh engine for one session run.
    #[must_use]
    pub fn engine(&self) -> SessionRunEngine {
        SessionRunEngine::new(Arc::clone(&self.storage.revision_sessions), self.clock)
    }

    #[must_use]
    pub fn summary_step(&self, learner: LearnerIdentity) -> SummaryStep {
        SummaryStep::new(Arc::clone(&self.tracker), learner)
            .with_level(Some(self.level.clone()))
            .with_exam_board(self.exam_board.clone())
    }

    #[must_use]
    pub fn complete_step(&self, learner: LearnerIdentity) -> CompleteStep {
        CompleteStep::new(
            Arc::clone(&self.audio),
            Arc::clone(&self.storage.reflections),
            learner,
        )
    }

    #[must_use]
    pub fn planned_sessions(&self) -> Arc<dyn PlannedSessionRepository> {
        Arc::clone(&self.storage.planned_sessions)
    }

    #[must_use]
    pub fn storage(&self) -> &Storage {
        &self.storage
    }

    #[must_use]
    pub fn tracker(&self) -> Arc<MnemonicTracker> {
        Arc::clone(&self.tracker)
    }

    #[must_use]
    pub fn audio(&self) -> Arc<AudioCaptureBridge> {
        Arc::clone(&self.audio)
    }

    #[must_use]
    pub fn mnemonic_activity(&self) -> Arc<MnemonicActivityService> {
        Arc::clone(&self.activity)
    }

    #[must_use]
    pub fn clock(&self) -> Clock {
        self.clock
    }
}
