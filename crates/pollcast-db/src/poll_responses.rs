use crate::{DbError, DbPool};
use chrono::{DateTime, Utc};
use pollcast_models::poll::PollResponse;
use sqlx::types::Json;

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct PollResponseRow {
    pub id: String,
    pub logical_poll_id: String,
    pub respondent_id: i64,
    pub option_indices: Json<Vec<i32>>,
    pub option_texts: Option<Json<Vec<String>>>,
    pub responded_at: DateTime<Utc>,
}

impl From<PollResponseRow> for PollResponse {
    fn from(row: PollResponseRow) -> Self {
        PollResponse {
            id: row.id,
            logical_poll_id: row.logical_poll_id,
            respondent_id: row.respondent_id,
            option_indices: row.option_indices.0,
            option_texts: row.option_texts.map(|t| t.0),
            responded_at: row.responded_at,
        }
    }
}

/// Inserts or replaces the response of `respondent_id` on `logical_poll_id`.
///
/// `id` is only used when no prior row exists; an update keeps the original
/// id and replaces the selection and timestamp.
pub async fn upsert_response(
    pool: &DbPool,
    id: &str,
    logical_poll_id: &str,
    respondent_id: i64,
    option_indices: &[i32],
    option_texts: Option<&[String]>,
    responded_at: DateTime<Utc>,
) -> Result<PollResponseRow, DbError> {
    let row = sqlx::query_as::<_, PollResponseRow>(
        "INSERT INTO poll_responses (id, logical_poll_id, respondent_id, option_indices, option_texts, responded_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)
         ON CONFLICT (logical_poll_id, respondent_id)
         DO UPDATE SET option_indices = excluded.option_indices,
                       option_texts = excluded.option_texts,
                       responded_at = excluded.responded_at
         RETURNING id, logical_poll_id, respondent_id, option_indices, option_texts, responded_at",
    )
    .bind(id)
    .bind(logical_poll_id)
    .bind(respondent_id)
    .bind(Json(option_indices.to_vec()))
    .bind(option_texts.map(|t| Json(t.to_vec())))
    .bind(responded_at)
    .fetch_one(pool)
    .await?;
    Ok(row)
}

pub async fn get_response(
    pool: &DbPool,
    logical_poll_id: &str,
    respondent_id: i64,
) -> Result<Option<PollResponseRow>, DbError> {
    let row = sqlx::query_as::<_, PollResponseRow>(
        "SELECT id, logical_poll_id, respondent_id, option_indices, option_texts, responded_at
         FROM poll_responses
         WHERE logical_poll_id = ?1 AND respondent_id = ?2",
    )
    .bind(logical_poll_id)
    .bind(respondent_id)
    .fetch_optional(pool)
    .await?;
    Ok(row)
}

pub async fn has_response(
    pool: &DbPool,
    logical_poll_id: &str,
    respondent_id: i64,
) -> Result<bool, DbError> {
    let found: Option<i64> = sqlx::query_scalar(
        "SELECT 1 FROM poll_responses
         WHERE logical_poll_id = ?1 AND respondent_id = ?2
         LIMIT 1",
    )
    .bind(logical_poll_id)
    .bind(respondent_id)
    .fetch_optional(pool)
    .await?;
    Ok(found.is_some())
}

/// Responses for a poll, oldest first.
pub async fn get_poll_responses(
    pool: &DbPool,
    logical_poll_id: &str,
) -> Result<Vec<PollResponseRow>, DbError> {
    let rows = sqlx::query_as::<_, PollResponseRow>(
        "SELECT id, logical_poll_id, respondent_id, option_indices, option_texts, responded_at
         FROM poll_responses
         WHERE logical_poll_id = ?1
         ORDER BY responded_at ASC, rowid ASC",
    )
    .bind(logical_poll_id)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

pub async fn delete_response(
    pool: &DbPool,
    logical_poll_id: &str,
    respondent_id: i64,
) -> Result<bool, DbError> {
    let result = sqlx::query(
        "DELETE FROM poll_responses WHERE logical_poll_id = ?1 AND respondent_id = ?2",
    )
    .bind(logical_poll_id)
    .bind(respondent_id)
    .execute(pool)
    .await?;
    Ok(result.rows_affected() > 0)
}
