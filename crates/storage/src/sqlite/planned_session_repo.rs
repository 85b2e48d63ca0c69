use revise_core::model::{PlannedSession, PlannedSessionId};

use super::SqliteRepository;
use super::mapping::{conn, map_planned_session_row};
use crate::repository::{PlannedSessionRepository, StorageError};

#[async_trait::async_trait]
impl PlannedSessionRepository for SqliteRepository {
    async fn upsert_planned_session(&self, planned: &PlannedSession) -> Result<(), StorageError> {
        sqlx::query(
            r"
            INSERT INTO planned_sessions (
                id, learner_id, learner_name, subject_id, subject_name,
                subject_icon, subject_color, topic_id, topic_name,
                duration_minutes, scheduled_for
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
            ON CONFLICT(id) DO UPDATE SET
                learner_id = excluded.learner_id,
                learner_name = excluded.learner_name,
                subject_id = excluded.subject_id,
                subject_name = excluded.subject_name,
                subject_icon = excluded.subject_icon,
                subject_color = excluded.subject_color,
                topic_id = excluded.topic_id,
                topic_name = excluded.topic_name,
                duration_minutes = excluded.duration_minutes,
                scheduled_for = excluded.scheduled_for
            ",
        )
        .bind(planned.id.as_str())
        .bind(planned.learner_id.as_str())
        .bind(&planned.learner_name)
        .bind(planned.subject_id.as_str())
        .bind(&planned.subject_name)
        .bind(planned.subject_icon.as_deref())
        .bind(planned.subject_color.as_deref())
        .bind(planned.topic_id.as_str())
        .bind(&planned.topic_name)
        .bind(i64::from(planned.duration_minutes))
        .bind(planned.scheduled_for)
        .execute(&self.pool)
        .await
        .map_err(conn)?;

        Ok(())
    }

    async fn get_planned_session(
        &self,
        id: &PlannedSessionId,
    ) -> Result<Option<PlannedSession>, StorageError> {
        let row = sqlx::query(
            r"
            SELECT id, learner_id, learner_name, subject_id, subject_name,
                   subject_icon, subject_color, topic_id, topic_name,
                   duration_minutes, scheduled_for
            FROM planned_sessions WHERE id = ?1
            ",
        )
        .bind(id.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(conn)?;

        row.as_ref().map(map_planned_session_row).transpose()
    }
}
