//! Tracked mnemonic generation and mnemonic activity.

mod activity;
mod client;
mod normalize;
mod tracker;

pub use activity::MnemonicActivityService;
pub use client::{
    GeneratedMnemonic, GenerationPayload, GenerationResponse, GenerationStatus,
    HttpMnemonicGenerator, MnemonicGenerator,
};
pub use normalize::normalize;
pub use tracker::{MnemonicRequest, MnemonicTracker, TrackedMnemonic};
