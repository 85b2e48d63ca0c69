//! Controllers for the six steps of a revision session.
//!
//! Each step reads its own payload slice from the engine and writes back
//! through `SessionRunEngine::patch_step` / `advance_step`.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use revise_core::model::{StepKey, StepPayload};

use crate::error::StepError;
use crate::session_run::SessionRunEngine;

mod complete;
mod practice;
mod preview;
mod recall;
mod reinforce;
mod summary;

pub use complete::{CompleteOutcome, CompletePayload, CompleteStep, CompleteSubmission};
pub use practice::{Difficulty, PracticeAnswer, PracticePayload, PracticeRound, SelfAssessment};
pub use preview::{PreviewPayload, PreviewStep};
pub use recall::{RecallDeck, RecallPayload, RecallRating};
pub use reinforce::{ReinforcePayload, ReinforceProgress};
pub use summary::{SummaryPayload, SummaryStep};

/// Self-reported confidence before and after a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfidenceLevel {
    VeryConfident,
    FairlyConfident,
    BitUnsure,
    NeedHelp,
}

/// Decode a step's stored payload, defaulting any missing fields.
///
/// # Errors
///
/// Returns `StepError::Payload` if a stored field has the wrong shape.
pub fn read_payload<T: DeserializeOwned>(
    engine: &SessionRunEngine,
    key: StepKey,
) -> Result<T, StepError> {
    Ok(engine.payload(key).decode()?)
}

async fn patch_typed<T: Serialize>(
    engine: &mut SessionRunEngine,
    key: StepKey,
    value: &T,
) -> Result<(), StepError> {
    let patch = StepPayload::from_typed(value)?;
    engine.patch_step(key, patch).await?;
    Ok(())
}

/// Only the step the learner is on may be completed.
fn ensure_current(engine: &SessionRunEngine, key: StepKey) -> Result<(), StepError> {
    let current = engine.current_step();
    if current == key {
        Ok(())
    } else {
        Err(StepError::NotCurrentStep {
            expected: key,
            current,
        })
    }
}

/// Patch a step with `value`, then complete it.
async fn patch_and_advance<T: Serialize>(
    engine: &mut SessionRunEngine,
    key: StepKey,
    value: &T,
) -> Result<StepKey, StepError> {
    ensure_current(engine, key)?;
    patch_typed(engine, key, value).await?;
    Ok(engine.advance_step().await?)
}
