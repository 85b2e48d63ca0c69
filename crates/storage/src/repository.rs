use async_trait::async_trait;
use chrono::{DateTime, Utc};
use revise_core::model::{
    LearnerId, MnemonicId, MnemonicRequestId, MnemonicStyle, PlannedSession, PlannedSessionId,
    Reflection, RevisionSessionId, SessionOverview, SessionState, SessionStatus, StepKey,
    StepPayload, StepRecord, StepStatus, TopicId,
};
use std::collections::{HashMap, HashSet};
use std::str::FromStr;
use std::sync::{Arc, Mutex};
use thiserror::Error;

/// Errors surfaced by storage adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("not found")]
    NotFound,

    #[error("conflict")]
    Conflict,

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

//
// ─── MNEMONIC REQUEST RECORDS ─────────────────────────────────────────────────
//

/// Server-side lifecycle of a tracked mnemonic request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MnemonicRequestStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl MnemonicRequestStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

impl FromStr for MnemonicRequestStatus {
    type Err = StorageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "processing" => Ok(Self::Processing),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            _ => Err(StorageError::Serialization(format!(
                "invalid mnemonic request status: {s}"
            ))),
        }
    }
}

/// Insert shape for a tracked mnemonic request.
#[derive(Debug, Clone)]
pub struct NewMnemonicRequest {
    pub learner_id: LearnerId,
    pub original_prompt: String,
    pub subject: String,
    pub level: String,
    pub exam_board: Option<String>,
    pub topic_id: TopicId,
    pub topic_name: String,
    pub style: MnemonicStyle,
    pub created_at: DateTime<Utc>,
}

/// Outcome written back to a tracking row once the generator answers.
#[derive(Debug, Clone, PartialEq)]
pub struct MnemonicRequestUpdate {
    pub status: MnemonicRequestStatus,
    pub mnemonic_id: Option<MnemonicId>,
    pub was_cached: Option<bool>,
    pub error_message: Option<String>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// Persisted shape of a tracked mnemonic request.
#[derive(Debug, Clone, PartialEq)]
pub struct MnemonicRequestRecord {
    pub id: MnemonicRequestId,
    pub learner_id: LearnerId,
    pub topic_id: TopicId,
    pub topic_name: String,
    pub subject: String,
    pub style: MnemonicStyle,
    pub status: MnemonicRequestStatus,
    pub mnemonic_id: Option<MnemonicId>,
    pub was_cached: Option<bool>,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl MnemonicRequestRecord {
    #[must_use]
    pub fn from_new(id: MnemonicRequestId, new: &NewMnemonicRequest) -> Self {
        Self {
            id,
            learner_id: new.learner_id.clone(),
            topic_id: new.topic_id.clone(),
            topic_name: new.topic_name.clone(),
            subject: new.subject.clone(),
            style: new.style,
            status: MnemonicRequestStatus::Pending,
            mnemonic_id: None,
            was_cached: None,
            error_message: None,
            created_at: new.created_at,
            completed_at: None,
        }
    }

    pub fn apply(&mut self, update: &MnemonicRequestUpdate) {
        self.status = update.status;
        self.mnemonic_id = update.mnemonic_id.clone();
        self.was_cached = update.was_cached;
        self.error_message = update.error_message.clone();
        self.completed_at = update.completed_at;
    }
}

/// Identifier of a single mnemonic playback.
pub type PlayId = i64;

//
// ─── STEP LIST TRANSITIONS ────────────────────────────────────────────────────
//

/// Six fresh step records with the first one in progress.
#[must_use]
pub fn initial_steps(started_at: DateTime<Utc>) -> Vec<StepRecord> {
    StepKey::ALL
        .into_iter()
        .map(|key| {
            let mut record = StepRecord::not_started(key);
            if key == StepKey::first() {
                record.status = StepStatus::InProgress;
                record.started_at = Some(started_at);
            }
            record
        })
        .collect()
}

/// Mark `key` completed and promote the following step if it has not started.
///
/// Completing an already completed step keeps its original timestamp.
///
/// # Errors
///
/// Returns `StorageError::NotFound` if the step is missing from the list.
pub fn complete_step_in(
    steps: &mut [StepRecord],
    key: StepKey,
    completed_at: DateTime<Utc>,
) -> Result<(), StorageError> {
    let record = steps
        .iter_mut()
        .find(|r| r.key == key)
        .ok_or(StorageError::NotFound)?;
    if !record.is_completed() {
        record.status = StepStatus::Completed;
        record.completed_at = Some(completed_at);
        record.started_at.get_or_insert(completed_at);
    }

    if let Some(next_key) = key.next()
        && let Some(next) = steps.iter_mut().find(|r| r.key == next_key)
        && next.status == StepStatus::NotStarted
    {
        next.status = StepStatus::InProgress;
        next.started_at = Some(completed_at);
    }
    Ok(())
}

//
// ─── CONTRACTS ────────────────────────────────────────────────────────────────
//

/// Read access to the timetable's planned sessions.
#[async_trait]
pub trait PlannedSessionRepository: Send + Sync {
    /// Insert or replace a planned session.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the planned session cannot be stored.
    async fn upsert_planned_session(&self, planned: &PlannedSession) -> Result<(), StorageError>;

    /// Fetch a planned session by ID.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn get_planned_session(
        &self,
        id: &PlannedSessionId,
    ) -> Result<Option<PlannedSession>, StorageError>;
}

/// Durable revision sessions and their step records.
#[async_trait]
pub trait RevisionSessionRepository: Send + Sync {
    /// Start the revision session for a planned session, or return the one
    /// already started. Never creates a second session for the same plan.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the planned session does not exist.
    async fn start_or_get(
        &self,
        planned_id: &PlannedSessionId,
        now: DateTime<Utc>,
    ) -> Result<RevisionSessionId, StorageError>;

    /// Fetch the overview and every step record of a session.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the session does not exist.
    async fn get_session_state(&self, id: &RevisionSessionId)
    -> Result<SessionState, StorageError>;

    /// Shallow-merge `patch` into a step's stored payload.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the session or step does not exist.
    async fn patch_step(
        &self,
        id: &RevisionSessionId,
        key: StepKey,
        patch: &StepPayload,
    ) -> Result<(), StorageError>;

    /// Mark a step completed and start the next one.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the session or step does not exist.
    async fn mark_step_complete(
        &self,
        id: &RevisionSessionId,
        key: StepKey,
        completed_at: DateTime<Utc>,
    ) -> Result<(), StorageError>;

    /// Record the terminal completion marker for a whole session.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the session does not exist.
    async fn complete_session(
        &self,
        id: &RevisionSessionId,
        completed_at: DateTime<Utc>,
    ) -> Result<(), StorageError>;
}

/// Tracking rows for mnemonic generation requests.
#[async_trait]
pub trait MnemonicRequestRepository: Send + Sync {
    /// Create a tracking row in `pending` state.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the row cannot be stored.
    async fn create_request(
        &self,
        request: &NewMnemonicRequest,
    ) -> Result<MnemonicRequestId, StorageError>;

    /// Record the generator's answer on an existing row.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the row does not exist.
    async fn update_request(
        &self,
        id: &MnemonicRequestId,
        update: &MnemonicRequestUpdate,
    ) -> Result<(), StorageError>;

    /// Fetch a tracking row.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn get_request(
        &self,
        id: &MnemonicRequestId,
    ) -> Result<Option<MnemonicRequestRecord>, StorageError>;
}

/// End-of-session reflections.
#[async_trait]
pub trait ReflectionRepository: Send + Sync {
    /// Store a reflection and return its row id.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the reflection cannot be stored.
    async fn insert_reflection(
        &self,
        reflection: &Reflection,
        created_at: DateTime<Utc>,
    ) -> Result<i64, StorageError>;

    /// List reflections recorded for a session, oldest first.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn list_reflections(
        &self,
        session: &RevisionSessionId,
    ) -> Result<Vec<Reflection>, StorageError>;
}

/// Favourites and playback tracking for generated mnemonics.
#[async_trait]
pub trait MnemonicActivityRepository: Send + Sync {
    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn is_favourite(
        &self,
        learner: &LearnerId,
        mnemonic: &MnemonicId,
    ) -> Result<bool, StorageError>;

    /// Add or remove a favourite and return the resulting state.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn set_favourite(
        &self,
        learner: &LearnerId,
        mnemonic: &MnemonicId,
        make_favourite: bool,
        at: DateTime<Utc>,
    ) -> Result<bool, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn start_play(
        &self,
        learner: &LearnerId,
        mnemonic: &MnemonicId,
        session: Option<&RevisionSessionId>,
        source: &str,
        at: DateTime<Utc>,
    ) -> Result<PlayId, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the play does not exist.
    async fn end_play(
        &self,
        play: PlayId,
        duration_seconds: u32,
        completed: bool,
        at: DateTime<Utc>,
    ) -> Result<(), StorageError>;
}

//
// ─── IN-MEMORY BACKEND ────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, PartialEq)]
struct PlayRecord {
    learner_id: LearnerId,
    mnemonic_id: MnemonicId,
    ended: Option<(u32, bool, DateTime<Utc>)>,
}

/// Simple in-memory repository implementation for testing and prototyping.
#[derive(Clone, Default)]
pub struct InMemoryRepository {
    planned: Arc<Mutex<HashMap<PlannedSessionId, PlannedSession>>>,
    sessions: Arc<Mutex<HashMap<RevisionSessionId, SessionState>>>,
    sessions_by_plan: Arc<Mutex<HashMap<PlannedSessionId, RevisionSessionId>>>,
    mnemonic_requests: Arc<Mutex<HashMap<MnemonicRequestId, MnemonicRequestRecord>>>,
    reflections: Arc<Mutex<Vec<Reflection>>>,
    favourites: Arc<Mutex<HashSet<(LearnerId, MnemonicId)>>>,
    plays: Arc<Mutex<Vec<PlayRecord>>>,
}

fn lock<T>(mutex: &Mutex<T>) -> Result<std::sync::MutexGuard<'_, T>, StorageError> {
    mutex
        .lock()
        .map_err(|e| StorageError::Connection(e.to_string()))
}

impl InMemoryRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of revision sessions ever created.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Connection` if the store lock is poisoned.
    pub fn revision_session_count(&self) -> Result<usize, StorageError> {
        Ok(lock(&self.sessions)?.len())
    }

    /// Number of tracked mnemonic requests ever created.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Connection` if the store lock is poisoned.
    pub fn mnemonic_request_count(&self) -> Result<usize, StorageError> {
        Ok(lock(&self.mnemonic_requests)?.len())
    }

    /// Plays of `mnemonic` by `learner` that ran to the end.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Connection` if the store lock is poisoned.
    pub fn completed_plays(
        &self,
        learner: &LearnerId,
        mnemonic: &MnemonicId,
    ) -> Result<usize, StorageError> {
        Ok(lock(&self.plays)?
            .iter()
            .filter(|p| &p.learner_id == learner && &p.mnemonic_id == mnemonic)
            .filter(|p| matches!(p.ended, Some((_, true, _))))
            .count())
    }
}

#[async_trait]
impl PlannedSessionRepository for InMemoryRepository {
    async fn upsert_planned_session(&self, planned: &PlannedSession) -> Result<(), StorageError> {
        lock(&self.planned)?.insert(planned.id.clone(), planned.clone());
        Ok(())
    }

    async fn get_planned_session(
        &self,
        id: &PlannedSessionId,
    ) -> Result<Option<PlannedSession>, StorageError> {
        Ok(lock(&self.planned)?.get(id).cloned())
    }
}

#[async_trait]
impl RevisionSessionRepository for InMemoryRepository {
    async fn start_or_get(
        &self,
        planned_id: &PlannedSessionId,
        now: DateTime<Utc>,
    ) -> Result<RevisionSessionId, StorageError> {
        let mut by_plan = lock(&self.sessions_by_plan)?;
        if let Some(existing) = by_plan.get(planned_id) {
            return Ok(existing.clone());
        }

        let planned = lock(&self.planned)?
            .get(planned_id)
            .cloned()
            .ok_or(StorageError::NotFound)?;
        let id = RevisionSessionId::generate();
        let state = SessionState {
            overview: SessionOverview::for_planned(&planned, id.clone()),
            status: SessionStatus::InProgress,
            steps: initial_steps(now),
            completed_at: None,
        };
        lock(&self.sessions)?.insert(id.clone(), state);
        by_plan.insert(planned_id.clone(), id.clone());
        Ok(id)
    }

    async fn get_session_state(
        &self,
        id: &RevisionSessionId,
    ) -> Result<SessionState, StorageError> {
        lock(&self.sessions)?
            .get(id)
            .cloned()
            .ok_or(StorageError::NotFound)
    }

    async fn patch_step(
        &self,
        id: &RevisionSessionId,
        key: StepKey,
        patch: &StepPayload,
    ) -> Result<(), StorageError> {
        let mut sessions = lock(&self.sessions)?;
        let state = sessions.get_mut(id).ok_or(StorageError::NotFound)?;
        let record = state
            .steps
            .iter_mut()
            .find(|r| r.key == key)
            .ok_or(StorageError::NotFound)?;
        record.payload.merge(patch);
        Ok(())
    }

    async fn mark_step_complete(
        &self,
        id: &RevisionSessionId,
        key: StepKey,
        completed_at: DateTime<Utc>,
    ) -> Result<(), StorageError> {
        let mut sessions = lock(&self.sessions)?;
        let state = sessions.get_mut(id).ok_or(StorageError::NotFound)?;
        complete_step_in(&mut state.steps, key, completed_at)
    }

    async fn complete_session(
        &self,
        id: &RevisionSessionId,
        completed_at: DateTime<Utc>,
    ) -> Result<(), StorageError> {
        let mut sessions = lock(&self.sessions)?;
        let state = sessions.get_mut(id).ok_or(StorageError::NotFound)?;
        state.status = SessionStatus::Completed;
        state.completed_at.get_or_insert(completed_at);
        Ok(())
    }
}

#[async_trait]
impl MnemonicRequestRepository for InMemoryRepository {
    async fn create_request(
        &self,
        request: &NewMnemonicRequest,
    ) -> Result<MnemonicRequestId, StorageError> {
        let id = MnemonicRequestId::generate();
        lock(&self.mnemonic_requests)?
            .insert(id.clone(), MnemonicRequestRecord::from_new(id.clone(), request));
        Ok(id)
    }

    async fn update_request(
        &self,
        id: &MnemonicRequestId,
        update: &MnemonicRequestUpdate,
    ) -> Result<(), StorageError> {
        let mut requests = lock(&self.mnemonic_requests)?;
        let record = requests.get_mut(id).ok_or(StorageError::NotFound)?;
        record.apply(update);
        Ok(())
    }

    async fn get_request(
        &self,
        id: &MnemonicRequestId,
    ) -> Result<Option<MnemonicRequestRecord>, StorageError> {
        Ok(lock(&self.mnemonic_requests)?.get(id).cloned())
    }
}

#[async_trait]
impl ReflectionRepository for InMemoryRepository {
    async fn insert_reflection(
        &self,
        reflection: &Reflection,
        _created_at: DateTime<Utc>,
    ) -> Result<i64, StorageError> {
        let mut reflections = lock(&self.reflections)?;
        reflections.push(reflection.clone());
        i64::try_from(reflections.len())
            .map_err(|_| StorageError::Serialization("reflection id overflow".into()))
    }

    async fn list_reflections(
        &self,
        session: &RevisionSessionId,
    ) -> Result<Vec<Reflection>, StorageError> {
        Ok(lock(&self.reflections)?
            .iter()
            .filter(|r| r.revision_session_id() == session)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl MnemonicActivityRepository for InMemoryRepository {
    async fn is_favourite(
        &self,
        learner: &LearnerId,
        mnemonic: &MnemonicId,
    ) -> Result<bool, StorageError> {
        Ok(lock(&self.favourites)?.contains(&(learner.clone(), mnemonic.clone())))
    }

    async fn set_favourite(
        &self,
        learner: &LearnerId,
        mnemonic: &MnemonicId,
        make_favourite: bool,
        _at: DateTime<Utc>,
    ) -> Result<bool, StorageError> {
        let mut favourites = lock(&self.favourites)?;
        let key = (learner.clone(), mnemonic.clone());
        if make_favourite {
            favourites.insert(key);
        } else {
            favourites.remove(&key);
        }
        Ok(make_favourite)
    }

    async fn start_play(
        &self,
        learner: &LearnerId,
        mnemonic: &MnemonicId,
        session: Option<&RevisionSessionId>,
        source: &str,
        at: DateTime<Utc>,
    ) -> Result<PlayId, StorageError> {
        let mut plays = lock(&self.plays)?;
        tracing::debug!(mnemonic_id = %mnemonic, source, session = ?session, %at, "mnemonic play started");
        plays.push(PlayRecord {
            learner_id: learner.clone(),
            mnemonic_id: mnemonic.clone(),
            ended: None,
        });
        PlayId::try_from(plays.len())
            .map_err(|_| StorageError::Serialization("play id overflow".into()))
    }

    async fn end_play(
        &self,
        play: PlayId,
        duration_seconds: u32,
        completed: bool,
        at: DateTime<Utc>,
    ) -> Result<(), StorageError> {
        let mut plays = lock(&self.plays)?;
        let index = usize::try_from(play - 1).map_err(|_| StorageError::NotFound)?;
        let record = plays.get_mut(index).ok_or(StorageError::NotFound)?;
        record.ended = Some((duration_seconds, completed, at));
        Ok(())
    }
}

/// Aggregates repositories behind trait objects for easy backend swapping.
#[derive(Clone)]
pub struct Storage {
    pub planned_sessions: Arc<dyn PlannedSessionRepository>,
    pub revision_sessions: Arc<dyn RevisionSessionRepository>,
    pub mnemonic_requests: Arc<dyn MnemonicRequestRepository>,
    pub reflections: Arc<dyn ReflectionRepository>,
    pub mnemonic_activity: Arc<dyn MnemonicActivityRepository>,
}

impl Storage {
    #[must_use]
    pub fn in_memory() -> Self {
        Self::from_repository(InMemoryRepository::new())
    }

    /// Use one repository value for every contract.
    #[must_use]
    pub fn from_repository<R>(repo: R) -> Self
    where
        R: PlannedSessionRepository
            + RevisionSessionRepository
            + MnemonicRequestRepository
            + ReflectionRepository
            + MnemonicActivityRepository
            + Clone
            + 'static,
    {
        Self {
            planned_sessions: Arc::new(repo.clone()),
            revision_sessions: Arc::new(repo.clone()),
            mnemonic_requests: Arc::new(repo.clone()),
            reflections: Arc::new(repo.clone()),
            mnemonic_activity: Arc::new(repo),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, NaiveDate};
    use revise_core::model::{ReflectionDraft, SubjectId};
    use revise_core::time::fixed_now;

    fn planned(id: &str) -> PlannedSession {
        PlannedSession {
            id: PlannedSessionId::new(id).unwrap(),
            learner_id: LearnerId::new("learner-1").unwrap(),
            learner_name: "Sam".into(),
            subject_id: SubjectId::new("biology").unwrap(),
            subject_name: "Biology".into(),
            subject_icon: Some("leaf".into()),
            subject_color: Some("#2e7d32".into()),
            topic_id: TopicId::new("photosynthesis").unwrap(),
            topic_name: "Photosynthesis".into(),
            duration_minutes: 20,
            scheduled_for: NaiveDate::from_ymd_opt(2026, 1, 12).unwrap(),
        }
    }

    #[tokio::test]
    async fn start_or_get_is_idempotent() {
        let repo = InMemoryRepository::new();
        let plan = planned("ps-1");
        repo.upsert_planned_session(&plan).await.unwrap();

        let first = repo.start_or_get(&plan.id, fixed_now()).await.unwrap();
        let second = repo.start_or_get(&plan.id, fixed_now()).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(repo.revision_session_count().unwrap(), 1);
    }

    #[tokio::test]
    async fn start_for_unknown_plan_is_not_found() {
        let repo = InMemoryRepository::new();
        let missing = PlannedSessionId::new("nope").unwrap();
        let err = repo.start_or_get(&missing, fixed_now()).await.unwrap_err();
        assert!(matches!(err, StorageError::NotFound));
    }

    #[tokio::test]
    async fn new_session_starts_on_first_step() {
        let repo = InMemoryRepository::new();
        let plan = planned("ps-1");
        repo.upsert_planned_session(&plan).await.unwrap();
        let id = repo.start_or_get(&plan.id, fixed_now()).await.unwrap();

        let state = repo.get_session_state(&id).await.unwrap();
        state.validate_steps().unwrap();
        assert_eq!(state.overview.topic_name, "Photosynthesis");
        assert_eq!(state.steps[0].status, StepStatus::InProgress);
        assert!(state.steps[1..]
            .iter()
            .all(|r| r.status == StepStatus::NotStarted));
    }

    #[tokio::test]
    async fn completing_a_step_promotes_the_next() {
        let repo = InMemoryRepository::new();
        let plan = planned("ps-1");
        repo.upsert_planned_session(&plan).await.unwrap();
        let id = repo.start_or_get(&plan.id, fixed_now()).await.unwrap();

        let at = fixed_now() + Duration::minutes(3);
        repo.mark_step_complete(&id, StepKey::Preview, at)
            .await
            .unwrap();

        let state = repo.get_session_state(&id).await.unwrap();
        let preview = state.step(StepKey::Preview).unwrap();
        assert_eq!(preview.status, StepStatus::Completed);
        assert_eq!(preview.completed_at, Some(at));
        assert_eq!(
            state.step(StepKey::Recall).unwrap().status,
            StepStatus::InProgress
        );
        state.validate_steps().unwrap();
    }

    #[tokio::test]
    async fn recompleting_an_earlier_step_keeps_a_single_in_progress() {
        let repo = InMemoryRepository::new();
        let plan = planned("ps-1");
        repo.upsert_planned_session(&plan).await.unwrap();
        let id = repo.start_or_get(&plan.id, fixed_now()).await.unwrap();
        for key in [StepKey::Preview, StepKey::Recall] {
            repo.mark_step_complete(&id, key, fixed_now()).await.unwrap();
        }

        repo.mark_step_complete(&id, StepKey::Preview, fixed_now() + Duration::hours(1))
            .await
            .unwrap();

        let state = repo.get_session_state(&id).await.unwrap();
        state.validate_steps().unwrap();
        assert_eq!(
            state.step(StepKey::Preview).unwrap().completed_at,
            Some(fixed_now())
        );
        assert_eq!(
            state.step(StepKey::Reinforce).unwrap().status,
            StepStatus::InProgress
        );
    }

    #[tokio::test]
    async fn patches_merge_server_side() {
        let repo = InMemoryRepository::new();
        let plan = planned("ps-1");
        repo.upsert_planned_session(&plan).await.unwrap();
        let id = repo.start_or_get(&plan.id, fixed_now()).await.unwrap();

        repo.patch_step(&id, StepKey::Recall, &StepPayload::new().with("a", 1))
            .await
            .unwrap();
        repo.patch_step(&id, StepKey::Recall, &StepPayload::new().with("b", 2))
            .await
            .unwrap();

        let state = repo.get_session_state(&id).await.unwrap();
        let payload = &state.step(StepKey::Recall).unwrap().payload;
        assert_eq!(payload.len(), 2);
    }

    #[tokio::test]
    async fn mnemonic_request_rows_track_updates() {
        let repo = InMemoryRepository::new();
        let id = repo
            .create_request(&NewMnemonicRequest {
                learner_id: LearnerId::new("learner-1").unwrap(),
                original_prompt: "Biology | Photosynthesis | style=rap".into(),
                subject: "biology".into(),
                level: "gcse".into(),
                exam_board: None,
                topic_id: TopicId::new("photosynthesis").unwrap(),
                topic_name: "Photosynthesis".into(),
                style: MnemonicStyle::Rap,
                created_at: fixed_now(),
            })
            .await
            .unwrap();

        let row = repo.get_request(&id).await.unwrap().unwrap();
        assert_eq!(row.status, MnemonicRequestStatus::Pending);

        repo.update_request(
            &id,
            &MnemonicRequestUpdate {
                status: MnemonicRequestStatus::Failed,
                mnemonic_id: None,
                was_cached: None,
                error_message: Some("timeout".into()),
                completed_at: Some(fixed_now()),
            },
        )
        .await
        .unwrap();

        let row = repo.get_request(&id).await.unwrap().unwrap();
        assert_eq!(row.status, MnemonicRequestStatus::Failed);
        assert_eq!(row.error_message.as_deref(), Some("timeout"));
    }

    #[tokio::test]
    async fn reflections_are_listed_per_session() {
        let repo = InMemoryRepository::new();
        let session = RevisionSessionId::new("rs-1").unwrap();
        let reflection = ReflectionDraft {
            learner_id: LearnerId::new("learner-1").unwrap(),
            revision_session_id: session.clone(),
            text_note: Some("light reactions first".into()),
            audio_url: None,
            audio_duration_seconds: None,
        }
        .validate()
        .unwrap();

        repo.insert_reflection(&reflection, fixed_now()).await.unwrap();

        let listed = repo.list_reflections(&session).await.unwrap();
        assert_eq!(listed, vec![reflection]);
        let other = RevisionSessionId::new("rs-2").unwrap();
        assert!(repo.list_reflections(&other).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn favourites_toggle_and_plays_end() {
        let repo = InMemoryRepository::new();
        let learner = LearnerId::new("learner-1").unwrap();
        let mnemonic = MnemonicId::new("m-1").unwrap();

        assert!(!repo.is_favourite(&learner, &mnemonic).await.unwrap());
        repo.set_favourite(&learner, &mnemonic, true, fixed_now())
            .await
            .unwrap();
        assert!(repo.is_favourite(&learner, &mnemonic).await.unwrap());

        let play = repo
            .start_play(&learner, &mnemonic, None, "summary", fixed_now())
            .await
            .unwrap();
        repo.end_play(play, 30, true, fixed_now()).await.unwrap();
        assert_eq!(repo.completed_plays(&learner, &mnemonic).unwrap(), 1);
        assert!(matches!(
            repo.end_play(play + 10, 1, false, fixed_now()).await,
            Err(StorageError::NotFound)
        ));
    }
}
