use chrono::{DateTime, Utc};
use revise_core::model::{Reflection, RevisionSessionId};

use super::SqliteRepository;
use super::mapping::{conn, map_reflection_row};
use crate::repository::{ReflectionRepository, StorageError};

#[async_trait::async_trait]
impl ReflectionRepository for SqliteRepository {
    async fn insert_reflection(
        &self,
        reflection: &Reflection,
        created_at: DateTime<Utc>,
    ) -> Result<i64, StorageError> {
        let res = sqlx::query(
            r"
            INSERT INTO reflections (
                learner_id, revision_session_id, context_type, text_note,
                audio_url, audio_duration_seconds, transcription_status, created_at
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            ",
        )
        .bind(reflection.learner_id().as_str())
        .bind(reflection.revision_session_id().as_str())
        .bind(reflection.context_type())
        .bind(reflection.text_note())
        .bind(reflection.audio_url().map(|u| u.as_str().to_string()))
        .bind(reflection.audio_duration_seconds().map(i64::from))
        .bind(reflection.transcription_status().map(|s| s.as_str()))
        .bind(created_at)
        .execute(&self.pool)
        .await
        .map_err(conn)?;

        Ok(res.last_insert_rowid())
    }

    async fn list_reflections(
        &self,
        session: &RevisionSessionId,
    ) -> Result<Vec<Reflection>, StorageError> {
        let rows = sqlx::query(
            r"
            SELECT learner_id, revision_session_id, text_note, audio_url, audio_duration_seconds
            FROM reflections
            WHERE revision_session_id = ?1
            ORDER BY id ASC
            ",
        )
        .bind(session.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;

        rows.iter().map(map_reflection_row).collect()
    }
}
