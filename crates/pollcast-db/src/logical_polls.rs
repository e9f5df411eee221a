use crate::{DbError, DbPool};
use chrono::{DateTime, Utc};
use pollcast_models::poll::LogicalPoll;
use sqlx::types::Json;

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct LogicalPollRow {
    pub id: String,
    pub question: String,
    pub options: Json<Vec<String>>,
    pub is_anonymous: bool,
    pub allows_multiple_answers: bool,
    pub created_at: DateTime<Utc>,
}

impl From<LogicalPollRow> for LogicalPoll {
    fn from(row: LogicalPollRow) -> Self {
        LogicalPoll {
            id: row.id,
            question: row.question,
            options: row.options.0,
            is_anonymous: row.is_anonymous,
            allows_multiple_answers: row.allows_multiple_answers,
            created_at: row.created_at,
        }
    }
}

pub async fn create_logical_poll(
    pool: &DbPool,
    id: &str,
    question: &str,
    options: &[String],
    is_anonymous: bool,
    allows_multiple_answers: bool,
    created_at: DateTime<Utc>,
) -> Result<LogicalPollRow, DbError> {
    let row = sqlx::query_as::<_, LogicalPollRow>(
        "INSERT INTO logical_polls (id, question, options, is_anonymous, allows_multiple_answers, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)
         RETURNING id, question, options, is_anonymous, allows_multiple_answers, created_at",
    )
    .bind(id)
    .bind(question)
    .bind(Json(options.to_vec()))
    .bind(is_anonymous)
    .bind(allows_multiple_answers)
    .bind(created_at)
    .fetch_one(pool)
    .await?;
    Ok(row)
}

pub async fn get_logical_poll(pool: &DbPool, id: &str) -> Result<Option<LogicalPollRow>, DbError> {
    let row = sqlx::query_as::<_, LogicalPollRow>(
        "SELECT id, question, options, is_anonymous, allows_multiple_answers, created_at
         FROM logical_polls WHERE id = ?1",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;
    Ok(row)
}

/// All polls, newest first.
pub async fn list_logical_polls(pool: &DbPool) -> Result<Vec<LogicalPollRow>, DbError> {
    let rows = sqlx::query_as::<_, LogicalPollRow>(
        "SELECT id, question, options, is_anonymous, allows_multiple_answers, created_at
         FROM logical_polls
         ORDER BY created_at DESC, rowid DESC",
    )
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

/// Deletes the poll together with its deliveries and responses.
pub async fn delete_logical_poll(pool: &DbPool, id: &str) -> Result<bool, DbError> {
    let result = sqlx::query("DELETE FROM logical_polls WHERE id = ?1")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}
