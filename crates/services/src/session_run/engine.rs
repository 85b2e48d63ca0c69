use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use revise_core::Clock;
use revise_core::model::{
    PlannedSessionId, RevisionSessionId, SessionOverview, StepKey, StepPayload, StepRecord,
};
use storage::repository::RevisionSessionRepository;

use super::payloads::{ResumePoint, StepPayloadStore};
use crate::error::EngineError;

/// Message shown when a session cannot be loaded.
pub const LOAD_ERROR_MESSAGE: &str = "Failed to load session. Please try again.";
/// Message shown when the completion marker cannot be written.
pub const FINISH_ERROR_MESSAGE: &str = "Failed to finish session. Please try again.";

/// Coarse lifecycle around the six steps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunPhase {
    Loading,
    Active,
    Exited,
}

/// Drives one learner through one revision session.
///
/// Operations take `&mut self`, so at most one persistence call is in flight
/// per engine. Local state is updated before a patch is persisted; the step
/// pointer only moves forward after the server has recorded the completion.
pub struct SessionRunEngine {
    sessions: Arc<dyn RevisionSessionRepository>,
    clock: Clock,
    phase: RunPhase,
    overview: Option<SessionOverview>,
    store: StepPayloadStore,
    current: StepKey,
    loading: bool,
    saving: bool,
    error: Option<String>,
    unsaved: BTreeSet<StepKey>,
}

impl SessionRunEngine {
    #[must_use]
    pub fn new(sessions: Arc<dyn RevisionSessionRepository>, clock: Clock) -> Self {
        Self {
            sessions,
            clock,
            phase: RunPhase::Loading,
            overview: None,
            store: StepPayloadStore::new(),
            current: StepKey::first(),
            loading: false,
            saving: false,
            error: None,
            unsaved: BTreeSet::new(),
        }
    }

    //
    // ─── OPERATIONS ────────────────────────────────────────────────────────────
    //

    /// Start or fetch the revision session for a planned session and resume it.
    ///
    /// Server state replaces any local optimistic payloads. On failure the
    /// previously loaded state is kept and `error()` carries a user message.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::Storage` if the session cannot be started or read.
    pub async fn load_session(&mut self, planned_id: &PlannedSessionId) -> Result<(), EngineError> {
        self.loading = true;
        self.error = None;
        let result = self.fetch(planned_id).await;
        self.loading = false;

        match result {
            Ok((overview, records)) => {
                self.store = StepPayloadStore::from_records(records);
                self.unsaved.clear();
                self.current = self.store.resume_point().step();
                tracing::info!(
                    revision_session_id = %overview.revision_session_id,
                    step = %self.current,
                    "session loaded"
                );
                self.overview = Some(overview);
                self.phase = RunPhase::Active;
                Ok(())
            }
            Err(err) => {
                tracing::warn!(planned_session_id = %planned_id, error = %err, "failed to load session");
                self.error = Some(LOAD_ERROR_MESSAGE.to_string());
                Err(err.into())
            }
        }
    }

    async fn fetch(
        &self,
        planned_id: &PlannedSessionId,
    ) -> Result<(SessionOverview, Vec<StepRecord>), storage::repository::StorageError> {
        let id = self.sessions.start_or_get(planned_id, self.clock.now()).await?;
        let state = self.sessions.get_session_state(&id).await?;
        Ok((state.overview, state.steps))
    }

    /// Merge `patch` into a step's payload, then persist it.
    ///
    /// The merge is visible locally before the write completes and is kept if
    /// the write fails; the step is then reported by `unsaved_steps()`.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::Persist` if the write fails, or
    /// `EngineError::NotLoaded` / `EngineError::Exited` outside an active run.
    pub async fn patch_step(&mut self, key: StepKey, patch: StepPayload) -> Result<(), EngineError> {
        let session_id = self.active_session_id()?;
        self.store.merge(key, &patch);

        self.saving = true;
        let result = self.sessions.patch_step(&session_id, key, &patch).await;
        self.saving = false;

        match result {
            Ok(()) => {
                self.unsaved.remove(&key);
                tracing::debug!(step = %key, fields = patch.len(), "step patched");
                Ok(())
            }
            Err(source) => {
                self.unsaved.insert(key);
                tracing::warn!(step = %key, error = %source, "failed to save step");
                Err(EngineError::Persist { key, source })
            }
        }
    }

    /// Complete the current step and move to the next one.
    ///
    /// On the last step the pointer stays put. Returns the step now shown.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::Persist` if the completion cannot be recorded; the
    /// current step does not change in that case.
    pub async fn advance_step(&mut self) -> Result<StepKey, EngineError> {
        let session_id = self.active_session_id()?;
        let key = self.current;
        let at = self.clock.now();

        self.saving = true;
        let result = self.sessions.mark_step_complete(&session_id, key, at).await;
        self.saving = false;

        if let Err(source) = result {
            tracing::warn!(step = %key, error = %source, "failed to complete step");
            return Err(EngineError::Persist { key, source });
        }

        self.store.mark_completed(key, at);
        if let Some(next) = key.next() {
            self.current = next;
        }
        tracing::info!(completed = %key, step = %self.current, "advanced");
        Ok(self.current)
    }

    /// Step back one step without touching any record.
    pub fn go_back(&mut self) {
        if let Some(previous) = self.current.previous() {
            self.current = previous;
        }
    }

    /// Record the session as completed and exit.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::Storage` if the completion marker cannot be
    /// written. The run stays active so the caller can retry or `exit()`.
    pub async fn finish_session(&mut self) -> Result<(), EngineError> {
        let session_id = self.active_session_id()?;

        self.saving = true;
        let result = self.sessions.complete_session(&session_id, self.clock.now()).await;
        self.saving = false;

        match result {
            Ok(()) => {
                tracing::info!(revision_session_id = %session_id, "session finished");
                self.phase = RunPhase::Exited;
                Ok(())
            }
            Err(err) => {
                tracing::error!(revision_session_id = %session_id, error = %err, "failed to finish session");
                self.error = Some(FINISH_ERROR_MESSAGE.to_string());
                Err(err.into())
            }
        }
    }

    /// Leave without persisting anything.
    pub fn exit(&mut self) {
        self.phase = RunPhase::Exited;
    }

    fn active_session_id(&self) -> Result<RevisionSessionId, EngineError> {
        if self.phase == RunPhase::Exited {
            return Err(EngineError::Exited);
        }
        self.overview
            .as_ref()
            .map(|o| o.revision_session_id.clone())
            .ok_or(EngineError::NotLoaded)
    }

    //
    // ─── READ ACCESS ───────────────────────────────────────────────────────────
    //

    #[must_use]
    pub fn overview(&self) -> Option<&SessionOverview> {
        self.overview.as_ref()
    }

    #[must_use]
    pub fn current_step(&self) -> StepKey {
        self.current
    }

    /// 1-based index of the current step.
    #[must_use]
    pub fn current_index(&self) -> u8 {
        self.current.rank()
    }

    #[must_use]
    pub fn current_payload(&self) -> StepPayload {
        self.store.payload(self.current)
    }

    #[must_use]
    pub fn payload(&self, key: StepKey) -> StepPayload {
        self.store.payload(key)
    }

    #[must_use]
    pub fn record(&self, key: StepKey) -> Option<&StepRecord> {
        self.store.record(key)
    }

    #[must_use]
    pub fn is_loading(&self) -> bool {
        self.loading
    }

    #[must_use]
    pub fn is_saving(&self) -> bool {
        self.saving
    }

    #[must_use]
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Steps whose latest local patch has not been acknowledged.
    #[must_use]
    pub fn unsaved_steps(&self) -> Vec<StepKey> {
        self.unsaved.iter().copied().collect()
    }

    #[must_use]
    pub fn phase(&self) -> RunPhase {
        self.phase
    }

    /// Every step has been completed.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.overview.is_some() && self.store.resume_point() == ResumePoint::Finished
    }

    /// Current time according to the engine's clock.
    #[must_use]
    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }
}
