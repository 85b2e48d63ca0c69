use chrono::{DateTime, Utc};
use revise_core::model::{
    PlannedSessionId, RevisionSessionId, SessionOverview, SessionState, SessionStatus, StepKey,
    StepPayload, StepStatus,
};
use sqlx::Row;

use super::SqliteRepository;
use super::mapping::{conn, map_planned_session_row, map_step_row, ser};
use crate::repository::{RevisionSessionRepository, StorageError, initial_steps};

#[async_trait::async_trait]
impl RevisionSessionRepository for SqliteRepository {
    async fn start_or_get(
        &self,
        planned_id: &PlannedSessionId,
        now: DateTime<Utc>,
    ) -> Result<RevisionSessionId, StorageError> {
        let mut tx = self.pool.begin().await.map_err(conn)?;

        let existing = sqlx::query("SELECT id FROM revision_sessions WHERE planned_session_id = ?1")
            .bind(planned_id.as_str())
            .fetch_optional(&mut *tx)
            .await
            .map_err(conn)?;
        if let Some(row) = existing {
            let id: String = row.try_get("id").map_err(ser)?;
            return RevisionSessionId::new(id).map_err(ser);
        }

        let planned = sqlx::query("SELECT 1 FROM planned_sessions WHERE id = ?1")
            .bind(planned_id.as_str())
            .fetch_optional(&mut *tx)
            .await
            .map_err(conn)?;
        if planned.is_none() {
            return Err(StorageError::NotFound);
        }

        let id = RevisionSessionId::generate();
        let inserted = sqlx::query(
            r"
            INSERT INTO revision_sessions (id, planned_session_id, status, started_at)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT(planned_session_id) DO NOTHING
            ",
        )
        .bind(id.as_str())
        .bind(planned_id.as_str())
        .bind(SessionStatus::InProgress.as_str())
        .bind(now)
        .execute(&mut *tx)
        .await
        .map_err(conn)?;

        if inserted.rows_affected() == 0 {
            // Another writer started this plan between our read and insert.
            let row = sqlx::query("SELECT id FROM revision_sessions WHERE planned_session_id = ?1")
                .bind(planned_id.as_str())
                .fetch_one(&mut *tx)
                .await
                .map_err(conn)?;
            let id: String = row.try_get("id").map_err(ser)?;
            return RevisionSessionId::new(id).map_err(ser);
        }

        for step in initial_steps(now) {
            let payload = serde_json::to_string(&step.payload).map_err(ser)?;
            sqlx::query(
                r"
                INSERT INTO revision_session_steps (
                    revision_session_id, step_key, step_index, status,
                    answer_summary, started_at, completed_at
                )
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                ",
            )
            .bind(id.as_str())
            .bind(step.key.as_str())
            .bind(i64::from(step.index))
            .bind(step.status.as_str())
            .bind(payload)
            .bind(step.started_at)
            .bind(step.completed_at)
            .execute(&mut *tx)
            .await
            .map_err(conn)?;
        }

        tx.commit().await.map_err(conn)?;
        tracing::debug!(revision_session_id = %id, planned_session_id = %planned_id, "started revision session");
        Ok(id)
    }

    async fn get_session_state(
        &self,
        id: &RevisionSessionId,
    ) -> Result<SessionState, StorageError> {
        let row = sqlx::query(
            r"
            SELECT rs.status AS session_status, rs.completed_at AS session_completed_at,
                   ps.id, ps.learner_id, ps.learner_name, ps.subject_id, ps.subject_name,
                   ps.subject_icon, ps.subject_color, ps.topic_id, ps.topic_name,
                   ps.duration_minutes, ps.scheduled_for
            FROM revision_sessions rs
            JOIN planned_sessions ps ON ps.id = rs.planned_session_id
            WHERE rs.id = ?1
            ",
        )
        .bind(id.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(conn)?
        .ok_or(StorageError::NotFound)?;

        let planned = map_planned_session_row(&row)?;
        let status: SessionStatus = row
            .try_get::<String, _>("session_status")
            .map_err(ser)?
            .parse()
            .map_err(ser)?;
        let completed_at: Option<DateTime<Utc>> =
            row.try_get("session_completed_at").map_err(ser)?;

        let step_rows = sqlx::query(
            r"
            SELECT step_key, step_index, status, answer_summary, started_at, completed_at
            FROM revision_session_steps
            WHERE revision_session_id = ?1
            ORDER BY step_index ASC
            ",
        )
        .bind(id.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;

        let mut steps = Vec::with_capacity(step_rows.len());
        for row in &step_rows {
            steps.push(map_step_row(row)?);
        }

        let state = SessionState {
            overview: SessionOverview::for_planned(&planned, id.clone()),
            status,
            steps,
            completed_at,
        };
        state.validate_steps().map_err(ser)?;
        Ok(state)
    }

    async fn patch_step(
        &self,
        id: &RevisionSessionId,
        key: StepKey,
        patch: &StepPayload,
    ) -> Result<(), StorageError> {
        let mut tx = self.pool.begin().await.map_err(conn)?;

        let row = sqlx::query(
            r"
            SELECT answer_summary FROM revision_session_steps
            WHERE revision_session_id = ?1 AND step_key = ?2
            ",
        )
        .bind(id.as_str())
        .bind(key.as_str())
        .fetch_optional(&mut *tx)
        .await
        .map_err(conn)?
        .ok_or(StorageError::NotFound)?;

        let raw: String = row.try_get("answer_summary").map_err(ser)?;
        let mut payload: StepPayload = serde_json::from_str(&raw).map_err(ser)?;
        payload.merge(patch);

        sqlx::query(
            r"
            UPDATE revision_session_steps SET answer_summary = ?3
            WHERE revision_session_id = ?1 AND step_key = ?2
            ",
        )
        .bind(id.as_str())
        .bind(key.as_str())
        .bind(serde_json::to_string(&payload).map_err(ser)?)
        .execute(&mut *tx)
        .await
        .map_err(conn)?;

        tx.commit().await.map_err(conn)?;
        Ok(())
    }

    async fn mark_step_complete(
        &self,
        id: &RevisionSessionId,
        key: StepKey,
        completed_at: DateTime<Utc>,
    ) -> Result<(), StorageError> {
        let mut tx = self.pool.begin().await.map_err(conn)?;

        let exists = sqlx::query(
            "SELECT 1 FROM revision_session_steps WHERE revision_session_id = ?1 AND step_key = ?2",
        )
        .bind(id.as_str())
        .bind(key.as_str())
        .fetch_optional(&mut *tx)
        .await
        .map_err(conn)?;
        if exists.is_none() {
            return Err(StorageError::NotFound);
        }

        sqlx::query(
            r"
            UPDATE revision_session_steps
            SET status = ?3,
                completed_at = ?4,
                started_at = COALESCE(started_at, ?4)
            WHERE revision_session_id = ?1 AND step_key = ?2 AND status != ?3
            ",
        )
        .bind(id.as_str())
        .bind(key.as_str())
        .bind(StepStatus::Completed.as_str())
        .bind(completed_at)
        .execute(&mut *tx)
        .await
        .map_err(conn)?;

        if let Some(next) = key.next() {
            sqlx::query(
                r"
                UPDATE revision_session_steps
                SET status = ?3, started_at = ?5
                WHERE revision_session_id = ?1 AND step_key = ?2 AND status = ?4
                ",
            )
            .bind(id.as_str())
            .bind(next.as_str())
            .bind(StepStatus::InProgress.as_str())
            .bind(StepStatus::NotStarted.as_str())
            .bind(completed_at)
            .execute(&mut *tx)
            .await
            .map_err(conn)?;
        }

        tx.commit().await.map_err(conn)?;
        Ok(())
    }

    async fn complete_session(
        &self,
        id: &RevisionSessionId,
        completed_at: DateTime<Utc>,
    ) -> Result<(), StorageError> {
        let res = sqlx::query(
            r"
            UPDATE revision_sessions
            SET status = ?2, completed_at = COALESCE(completed_at, ?3)
            WHERE id = ?1
            ",
        )
        .bind(id.as_str())
        .bind(SessionStatus::Completed.as_str())
        .bind(completed_at)
        .execute(&self.pool)
        .await
        .map_err(conn)?;

        if res.rows_affected() == 0 {
            return Err(StorageError::NotFound);
        }
        Ok(())
    }
}
