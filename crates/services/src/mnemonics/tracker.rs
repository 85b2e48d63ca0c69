use std::sync::Arc;

use revise_core::Clock;
use revise_core::model::{
    LearnerIdentity, Mnemonic, MnemonicId, MnemonicRequestId, MnemonicStatus, MnemonicStyle,
    RevisionSessionId, TopicId, is_subject_mnemonic_suitable,
};
use storage::repository::{
    MnemonicRequestRecord, MnemonicRequestRepository, MnemonicRequestStatus,
    MnemonicRequestUpdate, NewMnemonicRequest,
};
use url::Url;

use super::client::{GenerationPayload, GenerationResponse, MnemonicGenerator};
use super::normalize::normalize;
use crate::config::DEFAULT_LEVEL;
use crate::error::MnemonicError;

/// What to generate a mnemonic for.
#[derive(Debug, Clone, PartialEq)]
pub struct MnemonicRequest {
    pub topic_id: TopicId,
    pub topic_name: String,
    pub subject_name: String,
    pub style: MnemonicStyle,
    pub level: Option<String>,
    pub exam_board: Option<String>,
    pub revision_session_id: Option<RevisionSessionId>,
}

/// Result of one tracked generation attempt.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackedMnemonic {
    /// Tracking row of the attempt, if one could be created.
    pub request_id: Option<MnemonicRequestId>,
    pub mnemonic: Mnemonic,
    pub cached: bool,
}

/// Issues tracked mnemonic generation requests.
#[derive(Clone)]
pub struct MnemonicTracker {
    requests: Arc<dyn MnemonicRequestRepository>,
    generator: Arc<dyn MnemonicGenerator>,
    clock: Clock,
    server_tracking: bool,
    callback_url: Option<Url>,
}

impl MnemonicTracker {
    #[must_use]
    pub fn new(
        requests: Arc<dyn MnemonicRequestRepository>,
        generator: Arc<dyn MnemonicGenerator>,
        clock: Clock,
    ) -> Self {
        Self {
            requests,
            generator,
            clock,
            server_tracking: false,
            callback_url: None,
        }
    }

    /// Leave status updates of tracking rows to the backend.
    #[must_use]
    pub fn with_server_tracking(mut self, enabled: bool) -> Self {
        self.server_tracking = enabled;
        self
    }

    #[must_use]
    pub fn with_callback_url(mut self, callback_url: Option<Url>) -> Self {
        self.callback_url = callback_url;
        self
    }

    /// Generate a mnemonic under a fresh tracking row.
    ///
    /// Every call creates a new tracking row, so a retry never reuses a
    /// previous request. Backend and tracking failures produce a failed
    /// mnemonic rather than an error.
    ///
    /// # Errors
    ///
    /// Returns `MnemonicError::UnsuitableSubject` before any I/O when the
    /// subject is not eligible for mnemonics.
    pub async fn generate(
        &self,
        learner: &LearnerIdentity,
        request: &MnemonicRequest,
    ) -> Result<TrackedMnemonic, MnemonicError> {
        if !is_subject_mnemonic_suitable(&request.subject_name) {
            tracing::info!(subject = %request.subject_name, "mnemonic refused for subject");
            return Err(MnemonicError::UnsuitableSubject {
                subject: request.subject_name.clone(),
            });
        }

        let style = request.style;
        let level = request
            .level
            .clone()
            .unwrap_or_else(|| DEFAULT_LEVEL.to_string());
        let subject = request.subject_name.trim().to_lowercase();

        let new_request = NewMnemonicRequest {
            learner_id: learner.learner_id.clone(),
            original_prompt: format!(
                "{} | {} | style={}",
                request.subject_name, request.topic_name, style
            ),
            subject: subject.clone(),
            level: level.clone(),
            exam_board: request.exam_board.clone(),
            topic_id: request.topic_id.clone(),
            topic_name: request.topic_name.clone(),
            style,
            created_at: self.clock.now(),
        };
        let request_id = match self.requests.create_request(&new_request).await {
            Ok(id) => id,
            Err(err) => {
                tracing::warn!(error = %err, "could not create mnemonic tracking row");
                return Ok(TrackedMnemonic {
                    request_id: None,
                    mnemonic: Mnemonic::failed(style, None),
                    cached: false,
                });
            }
        };

        let payload = GenerationPayload {
            request_id: request_id.as_str().to_string(),
            topic_id: request.topic_id.as_str().to_string(),
            topic_name: request.topic_name.clone(),
            subject,
            level,
            exam_board: request.exam_board.clone(),
            topic: request.topic_name.clone(),
            subtopic: None,
            mnemonic_type: "educational",
            style: style.wire_name().to_string(),
            style_reference: style.descriptor().to_string(),
            callback_url: self.callback_url.as_ref().map(ToString::to_string),
        };

        tracing::debug!(
            request_id = %request_id,
            %style,
            session = ?request.revision_session_id,
            "requesting mnemonic"
        );
        let response = self.generator.generate(&payload).await;
        let mnemonic = normalize(&response, style);

        if !self.server_tracking {
            self.record_outcome(&request_id, &response, &mnemonic).await;
        }

        tracing::info!(
            request_id = %request_id,
            status = ?mnemonic.status(),
            cached = response.cached,
            "mnemonic request resolved"
        );
        Ok(TrackedMnemonic {
            request_id: Some(request_id),
            mnemonic,
            cached: response.cached,
        })
    }

    async fn record_outcome(
        &self,
        request_id: &MnemonicRequestId,
        response: &GenerationResponse,
        mnemonic: &Mnemonic,
    ) {
        let now = self.clock.now();
        let mnemonic_id = response
            .mnemonic
            .as_ref()
            .and_then(|generated| generated.id.as_deref())
            .or(response.mnemonic_id.as_deref())
            .and_then(|raw| MnemonicId::new(raw).ok());
        let was_cached = Some(response.cached);
        let update = match mnemonic.status() {
            MnemonicStatus::Failed => MnemonicRequestUpdate {
                status: MnemonicRequestStatus::Failed,
                mnemonic_id,
                was_cached,
                error_message: Some(
                    response
                        .error
                        .clone()
                        .unwrap_or_else(|| "generation failed".to_string()),
                ),
                completed_at: Some(now),
            },
            MnemonicStatus::Generating => MnemonicRequestUpdate {
                status: MnemonicRequestStatus::Processing,
                mnemonic_id,
                was_cached,
                error_message: None,
                completed_at: None,
            },
            MnemonicStatus::Ready => MnemonicRequestUpdate {
                status: MnemonicRequestStatus::Completed,
                mnemonic_id,
                was_cached,
                error_message: None,
                completed_at: Some(now),
            },
        };

        if let Err(err) = self.requests.update_request(request_id, &update).await {
            tracing::warn!(request_id = %request_id, error = %err, "could not update mnemonic tracking row");
        }
    }

    /// Read back the tracking row of an earlier request without generating again.
    ///
    /// # Errors
    ///
    /// Returns `MnemonicError::UnknownRequest` if no such row exists.
    pub async fn poll(
        &self,
        request_id: &MnemonicRequestId,
    ) -> Result<MnemonicRequestRecord, MnemonicError> {
        self.requests
            .get_request(request_id)
            .await?
            .ok_or(MnemonicError::UnknownRequest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mnemonics::client::GenerationStatus;
    use async_trait::async_trait;
    use revise_core::model::LearnerId;
    use revise_core::time::fixed_clock;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use storage::repository::{InMemoryRepository, StorageError};

    #[derive(Default)]
    struct CountingGenerator {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl MnemonicGenerator for CountingGenerator {
        async fn generate(&self, _: &GenerationPayload) -> GenerationResponse {
            self.calls.fetch_add(1, Ordering::SeqCst);
            GenerationResponse {
                success: true,
                status: Some(GenerationStatus::Processing),
                mnemonic_id: Some("m-9".into()),
                ..GenerationResponse::default()
            }
        }
    }

    #[derive(Default)]
    struct RejectingGenerator {
        styles: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl MnemonicGenerator for RejectingGenerator {
        async fn generate(&self, payload: &GenerationPayload) -> GenerationResponse {
            self.styles.lock().unwrap().push(payload.style.clone());
            GenerationResponse {
                mnemonic_id: Some("m-top".into()),
                cached: true,
                ..GenerationResponse::failure("quota exceeded")
            }
        }
    }

    struct OfflineRequests;

    #[async_trait]
    impl MnemonicRequestRepository for OfflineRequests {
        async fn create_request(
            &self,
            _: &NewMnemonicRequest,
        ) -> Result<MnemonicRequestId, StorageError> {
            Err(StorageError::Connection("offline".into()))
        }

        async fn update_request(
            &self,
            _: &MnemonicRequestId,
            _: &MnemonicRequestUpdate,
        ) -> Result<(), StorageError> {
            Err(StorageError::Connection("offline".into()))
        }

        async fn get_request(
            &self,
            _: &MnemonicRequestId,
        ) -> Result<Option<MnemonicRequestRecord>, StorageError> {
            Err(StorageError::Connection("offline".into()))
        }
    }

    fn learner() -> LearnerIdentity {
        LearnerIdentity::new(LearnerId::new("learner-1").unwrap())
    }

    fn request(subject: &str) -> MnemonicRequest {
        MnemonicRequest {
            topic_id: TopicId::new("forces").unwrap(),
            topic_name: "Forces".into(),
            subject_name: subject.into(),
            style: MnemonicStyle::Rock,
            level: None,
            exam_board: None,
            revision_session_id: None,
        }
    }

    #[tokio::test]
    async fn untracked_request_is_never_sent() {
        let generator = Arc::new(CountingGenerator::default());
        let tracker = MnemonicTracker::new(Arc::new(OfflineRequests), generator.clone(), fixed_clock());

        let tracked = tracker.generate(&learner(), &request("Physics")).await.unwrap();
        assert!(tracked.request_id.is_none());
        assert!(tracked.mnemonic.is_failed());
        assert_eq!(tracked.mnemonic.style(), MnemonicStyle::Rock);
        assert_eq!(generator.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn processing_answer_marks_row_processing() {
        let repo = InMemoryRepository::new();
        let generator = Arc::new(CountingGenerator::default());
        let tracker = MnemonicTracker::new(Arc::new(repo.clone()), generator, fixed_clock());

        let tracked = tracker.generate(&learner(), &request("Physics")).await.unwrap();
        assert_eq!(tracked.mnemonic.status(), MnemonicStatus::Generating);
        let id = tracked.request_id.unwrap();
        let record = tracker.poll(&id).await.unwrap();
        assert_eq!(record.status, MnemonicRequestStatus::Processing);
        assert_eq!(record.subject, "physics");
        assert_eq!(record.mnemonic_id.unwrap().as_str(), "m-9");
    }

    #[tokio::test]
    async fn failed_row_keeps_backend_id_and_cache_flag() {
        let repo = InMemoryRepository::new();
        let generator = Arc::new(RejectingGenerator::default());
        let tracker = MnemonicTracker::new(Arc::new(repo.clone()), generator.clone(), fixed_clock());

        let mut rap = request("Physics");
        rap.style = MnemonicStyle::Rap;
        let tracked = tracker.generate(&learner(), &rap).await.unwrap();
        assert!(tracked.mnemonic.is_failed());
        assert_eq!(*generator.styles.lock().unwrap(), vec!["hip-hop".to_string()]);

        let record = tracker.poll(&tracked.request_id.unwrap()).await.unwrap();
        assert_eq!(record.status, MnemonicRequestStatus::Failed);
        assert_eq!(record.mnemonic_id.unwrap().as_str(), "m-top");
        assert_eq!(record.was_cached, Some(true));
        assert_eq!(record.error_message.as_deref(), Some("quota exceeded"));
    }

    #[tokio::test]
    async fn server_tracking_leaves_row_pending() {
        let repo = InMemoryRepository::new();
        let tracker = MnemonicTracker::new(
            Arc::new(repo.clone()),
            Arc::new(CountingGenerator::default()),
            fixed_clock(),
        )
        .with_server_tracking(true);

        let tracked = tracker.generate(&learner(), &request("Physics")).await.unwrap();
        let record = tracker.poll(&tracked.request_id.unwrap()).await.unwrap();
        assert_eq!(record.status, MnemonicRequestStatus::Pending);
    }
}
