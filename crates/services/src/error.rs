//! Shared error types for the services crate.

use thiserror::Error;

use revise_core::model::{PayloadError, StepKey};
use storage::repository::StorageError;
use storage::sqlite::SqliteInitError;

/// Errors emitted by `SessionRunEngine`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum EngineError {
    #[error("no session is loaded")]
    NotLoaded,
    #[error("session has already exited")]
    Exited,
    #[error("failed to persist step {key}")]
    Persist {
        key: StepKey,
        #[source]
        source: StorageError,
    },
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted by the mnemonic tracker and activity service.
///
/// Generation failures are not errors: they come back as a failed `Mnemonic`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum MnemonicError {
    #[error("mnemonics are not available for {subject}")]
    UnsuitableSubject { subject: String },
    #[error("unknown mnemonic request")]
    UnknownRequest,
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted by `AudioCaptureBridge`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AudioUploadError {
    #[error("audio clip is empty")]
    EmptyClip,
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted by step controllers.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StepError {
    #[error("choose a confidence level first")]
    MissingConfidence,
    #[error("no mnemonic style has been chosen yet")]
    NoStyleSelected,
    #[error("all cards are already rated")]
    DeckExhausted,
    #[error("step {expected} is not the current step ({current})")]
    NotCurrentStep { expected: StepKey, current: StepKey },
    #[error(transparent)]
    Payload(#[from] PayloadError),
    #[error(transparent)]
    Engine(#[from] EngineError),
    #[error(transparent)]
    Mnemonic(#[from] MnemonicError),
    #[error(transparent)]
    Audio(#[from] AudioUploadError),
}

/// Errors raised while reading configuration.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConfigError {
    #[error("{var} is not a valid URL: {source}")]
    InvalidUrl {
        var: &'static str,
        #[source]
        source: url::ParseError,
    },
    #[error("{var} has an invalid value: {raw}")]
    InvalidValue { var: &'static str, raw: String },
    #[error("audio directory cannot be resolved: {0}")]
    AudioDir(String),
}

/// Errors emitted while bootstrapping app services.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AppServicesError {
    #[error(transparent)]
    Sqlite(#[from] SqliteInitError),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Config(#[from] ConfigError),
}
