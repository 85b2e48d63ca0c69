#![forbid(unsafe_code)]

pub mod app_services;
pub mod audio;
pub mod config;
pub mod error;
pub mod mnemonics;
pub mod session_run;
pub mod steps;

pub use revise_core::Clock;

pub use app_services::AppServices;
pub use audio::{AudioCaptureBridge, AudioClip, AudioReference};
pub use config::ReviseConfig;
pub use error::{
    AppServicesError, AudioUploadError, ConfigError, EngineError, MnemonicError, StepError,
};
pub use mnemonics::{MnemonicActivityService, MnemonicRequest, MnemonicTracker, TrackedMnemonic};
pub use session_run::{ResumePoint, RunPhase, SessionRunEngine};
