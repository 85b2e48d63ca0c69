use chrono::Utc;
use sqlx::SqlitePool;

use super::SqliteInitError;

/// Runs the schema migrations in order, skipping versions already applied.
///
/// Version 1 creates planned sessions, revision sessions with their step
/// records, mnemonic request tracking, reflections and mnemonic activity.
#[allow(clippy::too_many_lines)]
pub async fn run_migrations(pool: &SqlitePool) -> Result<(), SqliteInitError> {
    async fn is_applied(pool: &SqlitePool, version: i64) -> Result<bool, sqlx::Error> {
        let row = sqlx::query("SELECT 1 FROM schema_migrations WHERE version = ?1")
            .bind(version)
            .fetch_optional(pool)
            .await?;
        Ok(row.is_some())
    }

    sqlx::query(
        r"
            CREATE TABLE IF NOT EXISTS schema_migrations (
                version INTEGER PRIMARY KEY,
                applied_at TEXT NOT NULL
            );
            ",
    )
    .execute(pool)
    .await?;

    if !is_applied(pool, 1).await? {
        let mut tx = pool.begin().await?;

        sqlx::query(
            r"
                CREATE TABLE IF NOT EXISTS planned_sessions (
                    id TEXT PRIMARY KEY,
                    learner_id TEXT NOT NULL,
                    learner_name TEXT NOT NULL,
                    subject_id TEXT NOT NULL,
                    subject_name TEXT NOT NULL,
                    subject_icon TEXT,
                    subject_color TEXT,
                    topic_id TEXT NOT NULL,
                    topic_name TEXT NOT NULL,
                    duration_minutes INTEGER NOT NULL CHECK (duration_minutes >= 0),
                    scheduled_for TEXT NOT NULL
                );
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                CREATE TABLE IF NOT EXISTS revision_sessions (
                    id TEXT PRIMARY KEY,
                    planned_session_id TEXT NOT NULL UNIQUE,
                    status TEXT NOT NULL,
                    started_at TEXT NOT NULL,
                    completed_at TEXT,
                    FOREIGN KEY (planned_session_id) REFERENCES planned_sessions(id)
                        ON DELETE CASCADE
                );
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                CREATE TABLE IF NOT EXISTS revision_session_steps (
                    revision_session_id TEXT NOT NULL,
                    step_key TEXT NOT NULL,
                    step_index INTEGER NOT NULL CHECK (step_index BETWEEN 1 AND 6),
                    status TEXT NOT NULL,
                    answer_summary TEXT NOT NULL DEFAULT '{}',
                    started_at TEXT,
                    completed_at TEXT,
                    PRIMARY KEY (revision_session_id, step_key),
                    FOREIGN KEY (revision_session_id) REFERENCES revision_sessions(id)
                        ON DELETE CASCADE
                );
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                CREATE TABLE IF NOT EXISTS mnemonic_requests (
                    id TEXT PRIMARY KEY,
                    learner_id TEXT NOT NULL,
                    original_prompt TEXT NOT NULL,
                    subject TEXT NOT NULL,
                    level TEXT NOT NULL,
                    exam_board TEXT,
                    topic_id TEXT NOT NULL,
                    topic_name TEXT NOT NULL,
                    style TEXT NOT NULL,
                    status TEXT NOT NULL,
                    mnemonic_id TEXT,
                    was_cached INTEGER,
                    error_message TEXT,
                    created_at TEXT NOT NULL,
                    completed_at TEXT
                );
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                CREATE TABLE IF NOT EXISTS reflections (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    learner_id TEXT NOT NULL,
                    revision_session_id TEXT NOT NULL,
                    context_type TEXT NOT NULL,
                    text_note TEXT,
                    audio_url TEXT,
                    audio_duration_seconds INTEGER,
                    transcription_status TEXT,
                    created_at TEXT NOT NULL
                );
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                CREATE TABLE IF NOT EXISTS mnemonic_favourites (
                    learner_id TEXT NOT NULL,
                    mnemonic_id TEXT NOT NULL,
                    created_at TEXT NOT NULL,
                    PRIMARY KEY (learner_id, mnemonic_id)
                );
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                CREATE TABLE IF NOT EXISTS mnemonic_plays (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    learner_id TEXT NOT NULL,
                    mnemonic_id TEXT NOT NULL,
                    revision_session_id TEXT,
                    source TEXT NOT NULL,
                    started_at TEXT NOT NULL,
                    ended_at TEXT,
                    duration_seconds INTEGER,
                    completed INTEGER
                );
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                CREATE INDEX IF NOT EXISTS idx_reflections_session
                ON reflections(revision_session_id, id);
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                INSERT INTO schema_migrations (version, applied_at)
                VALUES (?1, ?2)
                ON CONFLICT(version) DO NOTHING
            ",
        )
        .bind(1_i64)
        .bind(Utc::now())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
    }

    Ok(())
}
