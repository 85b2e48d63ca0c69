use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use url::Url;

use crate::repository::StorageError;

/// Write-once object storage for recorded audio.
#[async_trait]
pub trait AudioObjectStore: Send + Sync {
    /// Store `bytes` under `path` and return the public URL of the object.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Conflict` if an object already exists at `path`,
    /// `StorageError::InvalidInput` for unusable paths, and
    /// `StorageError::Connection` when the backend cannot be written.
    async fn put_object(
        &self,
        path: &str,
        bytes: &[u8],
        content_type: &str,
    ) -> Result<Url, StorageError>;
}

fn validate_object_path(path: &str) -> Result<(), StorageError> {
    if path.is_empty() || path.starts_with('/') {
        return Err(StorageError::InvalidInput(format!("invalid object path: {path}")));
    }
    let clean = Path::new(path)
        .components()
        .all(|c| matches!(c, Component::Normal(_)));
    if !clean {
        return Err(StorageError::InvalidInput(format!("invalid object path: {path}")));
    }
    Ok(())
}

fn object_url(base: &Url, path: &str) -> Result<Url, StorageError> {
    base.join(path)
        .map_err(|e| StorageError::InvalidInput(format!("invalid object path {path}: {e}")))
}

/// Stored object, kept for inspection in tests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    pub bytes: Vec<u8>,
    pub content_type: String,
}

/// In-memory audio bucket.
#[derive(Clone)]
pub struct InMemoryAudioStore {
    base_url: Url,
    objects: Arc<Mutex<HashMap<String, StoredObject>>>,
}

impl InMemoryAudioStore {
    #[must_use]
    pub fn new(base_url: Url) -> Self {
        Self {
            base_url,
            objects: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// # Errors
    ///
    /// Returns `StorageError::Connection` if the store lock is poisoned.
    pub fn get(&self, path: &str) -> Result<Option<StoredObject>, StorageError> {
        let objects = self
            .objects
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        Ok(objects.get(path).cloned())
    }

    /// # Errors
    ///
    /// Returns `StorageError::Connection` if the store lock is poisoned.
    pub fn object_count(&self) -> Result<usize, StorageError> {
        let objects = self
            .objects
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        Ok(objects.len())
    }
}

#[async_trait]
impl AudioObjectStore for InMemoryAudioStore {
    async fn put_object(
        &self,
        path: &str,
        bytes: &[u8],
        content_type: &str,
    ) -> Result<Url, StorageError> {
        validate_object_path(path)?;
        let url = object_url(&self.base_url, path)?;
        let mut objects = self
            .objects
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        if objects.contains_key(path) {
            return Err(StorageError::Conflict);
        }
        objects.insert(
            path.to_string(),
            StoredObject {
                bytes: bytes.to_vec(),
                content_type: content_type.to_string(),
            },
        );
        Ok(url)
    }
}

/// Audio bucket backed by a local directory, served from `public_base`.
#[derive(Debug, Clone)]
pub struct FsAudioStore {
    root: PathBuf,
    public_base: Url,
}

impl FsAudioStore {
    /// # Errors
    ///
    /// Returns `StorageError::InvalidInput` if `public_base` cannot serve as a
    /// base URL.
    pub fn new(root: impl Into<PathBuf>, public_base: Url) -> Result<Self, StorageError> {
        if public_base.cannot_be_a_base() {
            return Err(StorageError::InvalidInput(format!(
                "public base url cannot be a base: {public_base}"
            )));
        }
        let mut public_base = public_base;
        if !public_base.path().ends_with('/') {
            let path = format!("{}/", public_base.path());
            public_base.set_path(&path);
        }
        Ok(Self {
            root: root.into(),
            public_base,
        })
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }
}

#[async_trait]
impl AudioObjectStore for FsAudioStore {
    async fn put_object(
        &self,
        path: &str,
        bytes: &[u8],
        content_type: &str,
    ) -> Result<Url, StorageError> {
        validate_object_path(path)?;
        let url = object_url(&self.public_base, path)?;
        let target = self.root.join(path);
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| StorageError::Connection(e.to_string()))?;
        }

        let mut file = match tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&target)
            .await
        {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                return Err(StorageError::Conflict);
            }
            Err(e) => return Err(StorageError::Connection(e.to_string())),
        };
        file.write_all(bytes)
            .await
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        file.flush()
            .await
            .map_err(|e| StorageError::Connection(e.to_string()))?;

        tracing::debug!(path, content_type, size = bytes.len(), "stored audio object");
        Ok(url)
    }
}
