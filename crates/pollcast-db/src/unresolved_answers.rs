use crate::{DbError, DbPool};
use chrono::{DateTime, Utc};
use pollcast_models::poll::UnresolvedPollAnswer;
use sqlx::types::Json;

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct UnresolvedAnswerRow {
    pub external_poll_id: String,
    pub respondent_id: i64,
    pub option_indices: Json<Vec<i32>>,
    pub received_at: DateTime<Utc>,
}

impl From<UnresolvedAnswerRow> for UnresolvedPollAnswer {
    fn from(row: UnresolvedAnswerRow) -> Self {
        UnresolvedPollAnswer {
            external_poll_id: row.external_poll_id,
            respondent_id: row.respondent_id,
            option_indices: row.option_indices.0,
            received_at: row.received_at,
        }
    }
}

/// Keeps only the latest answer per (external poll, respondent).
pub async fn upsert_unresolved_answer(
    pool: &DbPool,
    external_poll_id: &str,
    respondent_id: i64,
    option_indices: &[i32],
    received_at: DateTime<Utc>,
) -> Result<UnresolvedAnswerRow, DbError> {
    let row = sqlx::query_as::<_, UnresolvedAnswerRow>(
        "INSERT INTO unresolved_poll_answers (external_poll_id, respondent_id, option_indices, received_at)
         VALUES (?1, ?2, ?3, ?4)
         ON CONFLICT (external_poll_id, respondent_id)
         DO UPDATE SET option_indices = excluded.option_indices,
                       received_at = excluded.received_at
         RETURNING external_poll_id, respondent_id, option_indices, received_at",
    )
    .bind(external_poll_id)
    .bind(respondent_id)
    .bind(Json(option_indices.to_vec()))
    .bind(received_at)
    .fetch_one(pool)
    .await?;
    Ok(row)
}

/// Most recent first.
pub async fn list_unresolved_answers(
    pool: &DbPool,
    limit: i64,
) -> Result<Vec<UnresolvedAnswerRow>, DbError> {
    let rows = sqlx::query_as::<_, UnresolvedAnswerRow>(
        "SELECT external_poll_id, respondent_id, option_indices, received_at
         FROM unresolved_poll_answers
         ORDER BY received_at DESC, id DESC
         LIMIT ?1",
    )
    .bind(limit.max(1))
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_pool;

    #[tokio::test]
    async fn test_upsert_keeps_latest_answer() {
        let pool = test_pool().await;
        upsert_unresolved_answer(&pool, "legacy", 42, &[0], Utc::now())
            .await
            .unwrap();
        let row = upsert_unresolved_answer(&pool, "legacy", 42, &[2], Utc::now())
            .await
            .unwrap();
        assert_eq!(row.option_indices.0, vec![2]);
        assert_eq!(list_unresolved_answers(&pool, 50).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_list_respects_limit() {
        let pool = test_pool().await;
        for user in 0..5 {
            upsert_unresolved_answer(&pool, "legacy", user, &[0], Utc::now())
                .await
                .unwrap();
        }
        assert_eq!(list_unresolved_answers(&pool, 3).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_list_empty() {
        let pool = test_pool().await;
        assert!(list_unresolved_answers(&pool, 10).await.unwrap().is_empty());
    }
}
