use revise_core::model::MnemonicRequestId;

use super::SqliteRepository;
use super::mapping::{conn, map_mnemonic_request_row};
use crate::repository::{
    MnemonicRequestRecord, MnemonicRequestRepository, MnemonicRequestStatus,
    MnemonicRequestUpdate, NewMnemonicRequest, StorageError,
};

#[async_trait::async_trait]
impl MnemonicRequestRepository for SqliteRepository {
    async fn create_request(
        &self,
        request: &NewMnemonicRequest,
    ) -> Result<MnemonicRequestId, StorageError> {
        let id = MnemonicRequestId::generate();
        sqlx::query(
            r"
            INSERT INTO mnemonic_requests (
                id, learner_id, original_prompt, subject, level, exam_board,
                topic_id, topic_name, style, status, created_at
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
            ",
        )
        .bind(id.as_str())
        .bind(request.learner_id.as_str())
        .bind(&request.original_prompt)
        .bind(&request.subject)
        .bind(&request.level)
        .bind(request.exam_board.as_deref())
        .bind(request.topic_id.as_str())
        .bind(&request.topic_name)
        .bind(request.style.as_str())
        .bind(MnemonicRequestStatus::Pending.as_str())
        .bind(request.created_at)
        .execute(&self.pool)
        .await
        .map_err(conn)?;

        Ok(id)
    }

    async fn update_request(
        &self,
        id: &MnemonicRequestId,
        update: &MnemonicRequestUpdate,
    ) -> Result<(), StorageError> {
        let res = sqlx::query(
            r"
            UPDATE mnemonic_requests
            SET status = ?2,
                mnemonic_id = ?3,
                was_cached = ?4,
                error_message = ?5,
                completed_at = ?6
            WHERE id = ?1
            ",
        )
        .bind(id.as_str())
        .bind(update.status.as_str())
        .bind(update.mnemonic_id.as_ref().map(|m| m.as_str().to_string()))
        .bind(update.was_cached.map(i64::from))
        .bind(update.error_message.as_deref())
        .bind(update.completed_at)
        .execute(&self.pool)
        .await
        .map_err(conn)?;

        if res.rows_affected() == 0 {
            return Err(StorageError::NotFound);
        }
        Ok(())
    }

    async fn get_request(
        &self,
        id: &MnemonicRequestId,
    ) -> Result<Option<MnemonicRequestRecord>, StorageError> {
        let row = sqlx::query(
            r"
            SELECT id, learner_id, topic_id, topic_name, subject, style, status,
                   mnemonic_id, was_cached, error_message, created_at, completed_at
            FROM mnemonic_requests WHERE id = ?1
            ",
        )
        .bind(id.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(conn)?;

        row.as_ref().map(map_mnemonic_request_row).transpose()
    }
}
