use chrono::{DateTime, NaiveDate, Utc};
use revise_core::model::{
    LearnerId, MnemonicId, MnemonicRequestId, MnemonicStyle, PlannedSession, PlannedSessionId,
    Reflection, ReflectionDraft, RevisionSessionId, StepKey, StepPayload, StepRecord, StepStatus,
    SubjectId, TopicId,
};
use sqlx::Row;
use sqlx::sqlite::SqliteRow;
use url::Url;

use crate::repository::{MnemonicRequestRecord, MnemonicRequestStatus, StorageError};

pub(crate) fn ser<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Serialization(e.to_string())
}

pub(crate) fn conn(e: sqlx::Error) -> StorageError {
    StorageError::Connection(e.to_string())
}

pub(crate) fn u32_from_i64(field: &'static str, v: i64) -> Result<u32, StorageError> {
    u32::try_from(v).map_err(|_| StorageError::Serialization(format!("invalid {field}: {v}")))
}

pub(crate) fn map_planned_session_row(row: &SqliteRow) -> Result<PlannedSession, StorageError> {
    let scheduled_for: NaiveDate = row.try_get("scheduled_for").map_err(ser)?;
    Ok(PlannedSession {
        id: PlannedSessionId::new(row.try_get::<String, _>("id").map_err(ser)?).map_err(ser)?,
        learner_id: LearnerId::new(row.try_get::<String, _>("learner_id").map_err(ser)?)
            .map_err(ser)?,
        learner_name: row.try_get("learner_name").map_err(ser)?,
        subject_id: SubjectId::new(row.try_get::<String, _>("subject_id").map_err(ser)?)
            .map_err(ser)?,
        subject_name: row.try_get("subject_name").map_err(ser)?,
        subject_icon: row.try_get("subject_icon").map_err(ser)?,
        subject_color: row.try_get("subject_color").map_err(ser)?,
        topic_id: TopicId::new(row.try_get::<String, _>("topic_id").map_err(ser)?).map_err(ser)?,
        topic_name: row.try_get("topic_name").map_err(ser)?,
        duration_minutes: u32_from_i64(
            "duration_minutes",
            row.try_get::<i64, _>("duration_minutes").map_err(ser)?,
        )?,
        scheduled_for,
    })
}

pub(crate) fn map_step_row(row: &SqliteRow) -> Result<StepRecord, StorageError> {
    let key: StepKey = row
        .try_get::<String, _>("step_key")
        .map_err(ser)?
        .parse()
        .map_err(ser)?;
    let status: StepStatus = row
        .try_get::<String, _>("status")
        .map_err(ser)?
        .parse()
        .map_err(ser)?;
    let index = u8::try_from(row.try_get::<i64, _>("step_index").map_err(ser)?)
        .map_err(|_| StorageError::Serialization("step_index overflow".into()))?;
    let raw_payload: String = row.try_get("answer_summary").map_err(ser)?;
    let payload: StepPayload = serde_json::from_str(&raw_payload).map_err(ser)?;
    let started_at: Option<DateTime<Utc>> = row.try_get("started_at").map_err(ser)?;
    let completed_at: Option<DateTime<Utc>> = row.try_get("completed_at").map_err(ser)?;

    StepRecord::from_persisted(key, index, status, payload, started_at, completed_at).map_err(ser)
}

pub(crate) fn parse_url(field: &'static str, raw: Option<String>) -> Result<Option<Url>, StorageError> {
    raw.map(|s| {
        Url::parse(&s).map_err(|e| StorageError::Serialization(format!("invalid {field}: {e}")))
    })
    .transpose()
}

pub(crate) fn map_reflection_row(row: &SqliteRow) -> Result<Reflection, StorageError> {
    let duration = row
        .try_get::<Option<i64>, _>("audio_duration_seconds")
        .map_err(ser)?
        .map(|v| u32_from_i64("audio_duration_seconds", v))
        .transpose()?;
    ReflectionDraft {
        learner_id: LearnerId::new(row.try_get::<String, _>("learner_id").map_err(ser)?)
            .map_err(ser)?,
        revision_session_id: RevisionSessionId::new(
            row.try_get::<String, _>("revision_session_id").map_err(ser)?,
        )
        .map_err(ser)?,
        text_note: row.try_get("text_note").map_err(ser)?,
        audio_url: parse_url("audio_url", row.try_get("audio_url").map_err(ser)?)?,
        audio_duration_seconds: duration,
    }
    .validate()
    .map_err(ser)
}

pub(crate) fn map_mnemonic_request_row(
    row: &SqliteRow,
) -> Result<MnemonicRequestRecord, StorageError> {
    let style: MnemonicStyle = row
        .try_get::<String, _>("style")
        .map_err(ser)?
        .parse()
        .map_err(ser)?;
    let status: MnemonicRequestStatus = row.try_get::<String, _>("status").map_err(ser)?.parse()?;
    let mnemonic_id = row
        .try_get::<Option<String>, _>("mnemonic_id")
        .map_err(ser)?
        .map(MnemonicId::new)
        .transpose()
        .map_err(ser)?;
    let was_cached = row
        .try_get::<Option<i64>, _>("was_cached")
        .map_err(ser)?
        .map(|v| v != 0);

    Ok(MnemonicRequestRecord {
        id: MnemonicRequestId::new(row.try_get::<String, _>("id").map_err(ser)?).map_err(ser)?,
        learner_id: LearnerId::new(row.try_get::<String, _>("learner_id").map_err(ser)?)
            .map_err(ser)?,
        topic_id: TopicId::new(row.try_get::<String, _>("topic_id").map_err(ser)?).map_err(ser)?,
        topic_name: row.try_get("topic_name").map_err(ser)?,
        subject: row.try_get("subject").map_err(ser)?,
        style,
        status,
        mnemonic_id,
        was_cached,
        error_message: row.try_get("error_message").map_err(ser)?,
        created_at: row.try_get("created_at").map_err(ser)?,
        completed_at: row.try_get("completed_at").map_err(ser)?,
    })
}
