use std::sync::Arc;

use revise_core::Clock;
use revise_core::model::{LearnerId, MnemonicId, RevisionSessionId};
use storage::repository::{MnemonicActivityRepository, PlayId};

use crate::error::MnemonicError;

/// Favourites and playback tracking for generated mnemonics.
#[derive(Clone)]
pub struct MnemonicActivityService {
    repo: Arc<dyn MnemonicActivityRepository>,
    clock: Clock,
}

impl MnemonicActivityService {
    #[must_use]
    pub fn new(repo: Arc<dyn MnemonicActivityRepository>, clock: Clock) -> Self {
        Self { repo, clock }
    }

    /// Flip the favourite flag and return the new state.
    ///
    /// # Errors
    ///
    /// Returns `MnemonicError::Storage` on storage failures.
    pub async fn toggle_favourite(
        &self,
        learner: &LearnerId,
        mnemonic: &MnemonicId,
    ) -> Result<bool, MnemonicError> {
        let current = self.repo.is_favourite(learner, mnemonic).await?;
        Ok(self
            .repo
            .set_favourite(learner, mnemonic, !current, self.clock.now())
            .await?)
    }

    /// # Errors
    ///
    /// Returns `MnemonicError::Storage` on storage failures.
    pub async fn is_favourite(
        &self,
        learner: &LearnerId,
        mnemonic: &MnemonicId,
    ) -> Result<bool, MnemonicError> {
        Ok(self.repo.is_favourite(learner, mnemonic).await?)
    }

    /// # Errors
    ///
    /// Returns `MnemonicError::Storage` on storage failures.
    pub async fn start_play(
        &self,
        learner: &LearnerId,
        mnemonic: &MnemonicId,
        session: Option<&RevisionSessionId>,
        source: &str,
    ) -> Result<PlayId, MnemonicError> {
        Ok(self
            .repo
            .start_play(learner, mnemonic, session, source, self.clock.now())
            .await?)
    }

    /// Close a play. Negative durations are recorded as zero.
    ///
    /// # Errors
    ///
    /// Returns `MnemonicError::Storage` on storage failures.
    pub async fn end_play(
        &self,
        play: PlayId,
        duration_seconds: i64,
        completed: bool,
    ) -> Result<(), MnemonicError> {
        let duration = u32::try_from(duration_seconds.max(0)).unwrap_or(u32::MAX);
        self.repo
            .end_play(play, duration, completed, self.clock.now())
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use revise_core::time::fixed_clock;
    use storage::repository::InMemoryRepository;

    #[tokio::test]
    async fn toggle_flips_favourite() {
        let repo = InMemoryRepository::new();
        let service = MnemonicActivityService::new(Arc::new(repo), fixed_clock());
        let learner = LearnerId::new("learner-1").unwrap();
        let mnemonic = MnemonicId::new("m-1").unwrap();

        assert!(service.toggle_favourite(&learner, &mnemonic).await.unwrap());
        assert!(service.is_favourite(&learner, &mnemonic).await.unwrap());
        assert!(!service.toggle_favourite(&learner, &mnemonic).await.unwrap());
    }

    #[tokio::test]
    async fn negative_play_duration_is_floored() {
        let repo = InMemoryRepository::new();
        let service = MnemonicActivityService::new(Arc::new(repo.clone()), fixed_clock());
        let learner = LearnerId::new("learner-1").unwrap();
        let mnemonic = MnemonicId::new("m-1").unwrap();

        let play = service
            .start_play(&learner, &mnemonic, None, "summary")
            .await
            .unwrap();
        service.end_play(play, -5, true).await.unwrap();
        assert_eq!(repo.completed_plays(&learner, &mnemonic).unwrap(), 1);
    }
}
