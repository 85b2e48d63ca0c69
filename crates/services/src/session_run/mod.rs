//! Session run engine and step payload resumption.

mod engine;
mod payloads;

pub use engine::{FINISH_ERROR_MESSAGE, LOAD_ERROR_MESSAGE, RunPhase, SessionRunEngine};
pub use payloads::{ResumePoint, StepPayloadStore};
