use chrono::{DateTime, Utc};
use revise_core::model::{LearnerId, MnemonicId, RevisionSessionId};

use super::SqliteRepository;
use super::mapping::conn;
use crate::repository::{MnemonicActivityRepository, PlayId, StorageError};

#[async_trait::async_trait]
impl MnemonicActivityRepository for SqliteRepository {
    async fn is_favourite(
        &self,
        learner: &LearnerId,
        mnemonic: &MnemonicId,
    ) -> Result<bool, StorageError> {
        let row = sqlx::query(
            "SELECT 1 FROM mnemonic_favourites WHERE learner_id = ?1 AND mnemonic_id = ?2",
        )
        .bind(learner.as_str())
        .bind(mnemonic.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(conn)?;
        Ok(row.is_some())
    }

    async fn set_favourite(
        &self,
        learner: &LearnerId,
        mnemonic: &MnemonicId,
        make_favourite: bool,
        at: DateTime<Utc>,
    ) -> Result<bool, StorageError> {
        if make_favourite {
            sqlx::query(
                r"
                INSERT INTO mnemonic_favourites (learner_id, mnemonic_id, created_at)
                VALUES (?1, ?2, ?3)
                ON CONFLICT(learner_id, mnemonic_id) DO NOTHING
                ",
            )
            .bind(learner.as_str())
            .bind(mnemonic.as_str())
            .bind(at)
            .execute(&self.pool)
            .await
            .map_err(conn)?;
        } else {
            sqlx::query("DELETE FROM mnemonic_favourites WHERE learner_id = ?1 AND mnemonic_id = ?2")
                .bind(learner.as_str())
                .bind(mnemonic.as_str())
                .execute(&self.pool)
                .await
                .map_err(conn)?;
        }
        Ok(make_favourite)
    }

    async fn start_play(
        &self,
        learner: &LearnerId,
        mnemonic: &MnemonicId,
        session: Option<&RevisionSessionId>,
        source: &str,
        at: DateTime<Utc>,
    ) -> Result<PlayId, StorageError> {
        let res = sqlx::query(
            r"
            INSERT INTO mnemonic_plays (learner_id, mnemonic_id, revision_session_id, source, started_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ",
        )
        .bind(learner.as_str())
        .bind(mnemonic.as_str())
        .bind(session.map(|s| s.as_str().to_string()))
        .bind(source)
        .bind(at)
        .execute(&self.pool)
        .await
        .map_err(conn)?;

        Ok(res.last_insert_rowid())
    }

    async fn end_play(
        &self,
        play: PlayId,
        duration_seconds: u32,
        completed: bool,
        at: DateTime<Utc>,
    ) -> Result<(), StorageError> {
        let res = sqlx::query(
            r"
            UPDATE mnemonic_plays
            SET ended_at = ?2, duration_seconds = ?3, completed = ?4
            WHERE id = ?1
            ",
        )
        .bind(play)
        .bind(at)
        .bind(i64::from(duration_seconds))
        .bind(i64::from(completed))
        .execute(&self.pool)
        .await
        .map_err(conn)?;

        if res.rows_affected() == 0 {
            return Err(StorageError::NotFound);
        }
        Ok(())
    }
}
