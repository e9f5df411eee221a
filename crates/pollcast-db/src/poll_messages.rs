use crate::{DbError, DbPool};
use pollcast_models::poll::PollDelivery;

#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct PollMessageRow {
    pub logical_poll_id: String,
    pub external_poll_id: String,
    pub chat_id: i64,
    pub message_id: i64,
}

impl From<PollMessageRow> for PollDelivery {
    fn from(row: PollMessageRow) -> Self {
        PollDelivery {
            logical_poll_id: row.logical_poll_id,
            external_poll_id: row.external_poll_id,
            chat_id: row.chat_id,
            message_id: row.message_id,
        }
    }
}

/// Inserts a delivery unless `external_poll_id` is already recorded.
///
/// Returns the inserted row, or `None` when a row with the same external id
/// already existed (the existing row is left untouched).
pub async fn insert_poll_message(
    pool: &DbPool,
    logical_poll_id: &str,
    external_poll_id: &str,
    chat_id: i64,
    message_id: i64,
) -> Result<Option<PollMessageRow>, DbError> {
    let row = sqlx::query_as::<_, PollMessageRow>(
        "INSERT INTO poll_messages (logical_poll_id, external_poll_id, chat_id, message_id)
         VALUES (?1, ?2, ?3, ?4)
         ON CONFLICT (external_poll_id) DO NOTHING
         RETURNING logical_poll_id, external_poll_id, chat_id, message_id",
    )
    .bind(logical_poll_id)
    .bind(external_poll_id)
    .bind(chat_id)
    .bind(message_id)
    .fetch_optional(pool)
    .await?;
    Ok(row)
}

pub async fn get_poll_message(
    pool: &DbPool,
    external_poll_id: &str,
) -> Result<Option<PollMessageRow>, DbError> {
    let row = sqlx::query_as::<_, PollMessageRow>(
        "SELECT logical_poll_id, external_poll_id, chat_id, message_id
         FROM poll_messages WHERE external_poll_id = ?1",
    )
    .bind(external_poll_id)
    .fetch_optional(pool)
    .await?;
    Ok(row)
}

pub async fn find_logical_poll_id(
    pool: &DbPool,
    external_poll_id: &str,
) -> Result<Option<String>, DbError> {
    let id = sqlx::query_scalar::<_, String>(
        "SELECT logical_poll_id FROM poll_messages WHERE external_poll_id = ?1",
    )
    .bind(external_poll_id)
    .fetch_optional(pool)
    .await?;
    Ok(id)
}

pub async fn get_poll_messages_for_poll(
    pool: &DbPool,
    logical_poll_id: &str,
) -> Result<Vec<PollMessageRow>, DbError> {
    let rows = sqlx::query_as::<_, PollMessageRow>(
        "SELECT logical_poll_id, external_poll_id, chat_id, message_id
         FROM poll_messages WHERE logical_poll_id = ?1
         ORDER BY id",
    )
    .bind(logical_poll_id)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}
