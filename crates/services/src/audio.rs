use std::sync::Arc;

use revise_core::Clock;
use revise_core::model::{LearnerIdentity, RevisionSessionId};
use storage::objects::AudioObjectStore;
use storage::repository::StorageError;
use url::Url;

use crate::error::AudioUploadError;

pub const DEFAULT_AUDIO_CONTENT_TYPE: &str = "audio/webm";

const MAX_PATH_ATTEMPTS: usize = 3;

/// A recorded clip waiting to be uploaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioClip {
    bytes: Vec<u8>,
    content_type: String,
    duration_seconds: Option<u32>,
}

impl AudioClip {
    #[must_use]
    pub fn new(bytes: Vec<u8>) -> Self {
        Self {
            bytes,
            content_type: DEFAULT_AUDIO_CONTENT_TYPE.to_string(),
            duration_seconds: None,
        }
    }

    #[must_use]
    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = content_type.into();
        self
    }

    #[must_use]
    pub fn with_duration(mut self, seconds: u32) -> Self {
        self.duration_seconds = Some(seconds);
        self
    }

    #[must_use]
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    #[must_use]
    pub fn content_type(&self) -> &str {
        &self.content_type
    }

    #[must_use]
    pub fn duration_seconds(&self) -> Option<u32> {
        self.duration_seconds
    }

    fn extension(&self) -> &'static str {
        let base = self
            .content_type
            .split(';')
            .next()
            .unwrap_or_default()
            .trim();
        match base {
            "audio/webm" => "webm",
            "audio/ogg" => "ogg",
            "audio/mpeg" => "mp3",
            "audio/mp4" | "audio/x-m4a" => "m4a",
            "audio/wav" | "audio/x-wav" => "wav",
            _ => "bin",
        }
    }
}

/// Stable reference to an uploaded clip.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioReference {
    pub url: Url,
    pub path: String,
    pub duration_seconds: Option<u32>,
}

/// Uploads recorded clips under learner- and session-scoped paths.
#[derive(Clone)]
pub struct AudioCaptureBridge {
    store: Arc<dyn AudioObjectStore>,
    clock: Clock,
}

impl AudioCaptureBridge {
    #[must_use]
    pub fn new(store: Arc<dyn AudioObjectStore>, clock: Clock) -> Self {
        Self { store, clock }
    }

    /// Store `clip` and return its URL.
    ///
    /// Paths look like `{learner}/{session}/{unix_millis}-{8 hex}.{ext}`. A
    /// path that is already taken is retried with a new suffix.
    ///
    /// # Errors
    ///
    /// Returns `AudioUploadError::EmptyClip` for an empty clip, and
    /// `AudioUploadError::Storage` if the store rejects the object.
    pub async fn upload(
        &self,
        learner: &LearnerIdentity,
        session: &RevisionSessionId,
        clip: AudioClip,
    ) -> Result<AudioReference, AudioUploadError> {
        if clip.bytes.is_empty() {
            return Err(AudioUploadError::EmptyClip);
        }

        let mut attempt = 0;
        loop {
            attempt += 1;
            let path = self.object_path(learner, session, &clip);
            match self
                .store
                .put_object(&path, &clip.bytes, &clip.content_type)
                .await
            {
                Ok(url) => {
                    tracing::info!(%path, size = clip.bytes.len(), "audio uploaded");
                    return Ok(AudioReference {
                        url,
                        path,
                        duration_seconds: clip.duration_seconds,
                    });
                }
                Err(StorageError::Conflict) if attempt < MAX_PATH_ATTEMPTS => {
                    tracing::debug!(%path, "audio path taken, retrying");
                }
                Err(err) => {
                    tracing::warn!(%path, error = %err, "audio upload failed");
                    return Err(err.into());
                }
            }
        }
    }

    fn object_path(
        &self,
        learner: &LearnerIdentity,
        session: &RevisionSessionId,
        clip: &AudioClip,
    ) -> String {
        format!(
            "{}/{}/{}-{:08x}.{}",
            learner.learner_id,
            session,
            self.clock.unix_millis(),
            rand::random::<u32>(),
            clip.extension()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use revise_core::model::LearnerId;
    use revise_core::time::fixed_clock;
    use std::sync::Mutex;
    use storage::objects::InMemoryAudioStore;

    fn learner() -> LearnerIdentity {
        LearnerIdentity::new(LearnerId::new("learner-1").unwrap())
    }

    fn session() -> RevisionSessionId {
        RevisionSessionId::new("rs-1").unwrap()
    }

    fn memory_store() -> InMemoryAudioStore {
        InMemoryAudioStore::new(Url::parse("memory://voice-notes/").unwrap())
    }

    #[tokio::test]
    async fn upload_scopes_path_by_learner_and_session() {
        let store = memory_store();
        let bridge = AudioCaptureBridge::new(Arc::new(store.clone()), fixed_clock());

        let reference = bridge
            .upload(&learner(), &session(), AudioClip::new(vec![1, 2, 3]).with_duration(9))
            .await
            .unwrap();

        let millis = fixed_clock().unix_millis();
        assert!(reference.path.starts_with(&format!("learner-1/rs-1/{millis}-")));
        assert!(reference.path.ends_with(".webm"));
        assert_eq!(reference.duration_seconds, Some(9));
        let stored = store.get(&reference.path).unwrap().unwrap();
        assert_eq!(stored.content_type, "audio/webm");
    }

    #[tokio::test]
    async fn empty_clip_is_rejected_before_io() {
        let store = memory_store();
        let bridge = AudioCaptureBridge::new(Arc::new(store.clone()), fixed_clock());
        let err = bridge
            .upload(&learner(), &session(), AudioClip::new(Vec::new()))
            .await
            .unwrap_err();
        assert!(matches!(err, AudioUploadError::EmptyClip));
        assert_eq!(store.object_count().unwrap(), 0);
    }

    struct FailingStore {
        calls: Mutex<usize>,
    }

    #[async_trait]
    impl AudioObjectStore for FailingStore {
        async fn put_object(&self, _: &str, _: &[u8], _: &str) -> Result<Url, StorageError> {
            *self.calls.lock().unwrap() += 1;
            Err(StorageError::Connection("bucket offline".into()))
        }
    }

    #[tokio::test]
    async fn store_failure_is_propagated() {
        let store = Arc::new(FailingStore {
            calls: Mutex::new(0),
        });
        let bridge = AudioCaptureBridge::new(store.clone(), fixed_clock());
        let err = bridge
            .upload(&learner(), &session(), AudioClip::new(vec![0]))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            AudioUploadError::Storage(StorageError::Connection(_))
        ));
        assert_eq!(*store.calls.lock().unwrap(), 1);
    }

    #[test]
    fn extension_follows_content_type() {
        let clip = AudioClip::new(vec![1]).with_content_type("audio/ogg; codecs=opus");
        assert_eq!(clip.extension(), "ogg");
        assert_eq!(AudioClip::new(vec![1]).with_content_type("x/y").extension(), "bin");
    }
}
