mod ids;
mod learner;
mod mnemonic;
mod payload;
mod reflection;
mod session;
mod step;

pub use ids::{
    IdError, LearnerId, MnemonicId, MnemonicRequestId, PlannedSessionId, RevisionSessionId,
    SubjectId, TopicId,
};
pub use learner::LearnerIdentity;
pub use mnemonic::{
    Mnemonic, MnemonicStatus, MnemonicStyle, UnknownStyle, is_subject_mnemonic_suitable,
};
pub use payload::{PayloadError, StepPayload};
pub use reflection::{
    Reflection, ReflectionDraft, ReflectionError, SESSION_REFLECTION_CONTEXT, TranscriptionStatus,
};
pub use session::{
    PlannedSession, SessionOverview, SessionState, SessionStateError, SessionStatus,
};
pub use step::{STEP_COUNT, StepError, StepKey, StepRecord, StepStatus};
