use crate::{DbError, DbPool};
use chrono::{DateTime, Utc};
use pollcast_models::subscriber::{Subscriber, SubscriberProfile};

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct SubscriberRow {
    pub chat_id: i64,
    pub username: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub subscribed_at: DateTime<Utc>,
    pub is_active: bool,
}

impl From<SubscriberRow> for Subscriber {
    fn from(row: SubscriberRow) -> Self {
        Subscriber {
            chat_id: row.chat_id,
            username: row.username,
            first_name: row.first_name,
            last_name: row.last_name,
            subscribed_at: row.subscribed_at,
            is_active: row.is_active,
        }
    }
}

/// Subscribes `chat_id`, re-activating it if it was deactivated.
///
/// Profile fields are refreshed only when new values are supplied; the
/// original `subscribed_at` is kept.
pub async fn upsert_subscriber(
    pool: &DbPool,
    chat_id: i64,
    profile: &SubscriberProfile,
    now: DateTime<Utc>,
) -> Result<SubscriberRow, DbError> {
    let row = sqlx::query_as::<_, SubscriberRow>(
        "INSERT INTO subscribers (chat_id, username, first_name, last_name, subscribed_at, is_active)
         VALUES (?1, ?2, ?3, ?4, ?5, 1)
         ON CONFLICT (chat_id)
         DO UPDATE SET is_active = 1,
                       username = COALESCE(excluded.username, subscribers.username),
                       first_name = COALESCE(excluded.first_name, subscribers.first_name),
                       last_name = COALESCE(excluded.last_name, subscribers.last_name)
         RETURNING chat_id, username, first_name, last_name, subscribed_at, is_active",
    )
    .bind(chat_id)
    .bind(profile.username.as_deref())
    .bind(profile.first_name.as_deref())
    .bind(profile.last_name.as_deref())
    .bind(now)
    .fetch_one(pool)
    .await?;
    Ok(row)
}

/// Adds `chat_id` if unknown; an existing row is left as is.
pub async fn insert_subscriber_if_missing(
    pool: &DbPool,
    chat_id: i64,
    now: DateTime<Utc>,
) -> Result<bool, DbError> {
    let result = sqlx::query(
        "INSERT INTO subscribers (chat_id, subscribed_at, is_active)
         VALUES (?1, ?2, 1)
         ON CONFLICT (chat_id) DO NOTHING",
    )
    .bind(chat_id)
    .bind(now)
    .execute(pool)
    .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn get_subscriber(pool: &DbPool, chat_id: i64) -> Result<Option<SubscriberRow>, DbError> {
    let row = sqlx::query_as::<_, SubscriberRow>(
        "SELECT chat_id, username, first_name, last_name, subscribed_at, is_active
         FROM subscribers WHERE chat_id = ?1",
    )
    .bind(chat_id)
    .fetch_optional(pool)
    .await?;
    Ok(row)
}

pub async fn get_active_subscribers(pool: &DbPool) -> Result<Vec<SubscriberRow>, DbError> {
    let rows = sqlx::query_as::<_, SubscriberRow>(
        "SELECT chat_id, username, first_name, last_name, subscribed_at, is_active
         FROM subscribers
         WHERE is_active = 1
         ORDER BY subscribed_at DESC, id DESC",
    )
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

pub async fn get_all_subscribers(pool: &DbPool) -> Result<Vec<SubscriberRow>, DbError> {
    let rows = sqlx::query_as::<_, SubscriberRow>(
        "SELECT chat_id, username, first_name, last_name, subscribed_at, is_active
         FROM subscribers
         ORDER BY subscribed_at DESC, id DESC",
    )
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

pub async fn deactivate_subscriber(pool: &DbPool, chat_id: i64) -> Result<bool, DbError> {
    let result = sqlx::query(
        "UPDATE subscribers SET is_active = 0 WHERE chat_id = ?1 AND is_active = 1",
    )
    .bind(chat_id)
    .execute(pool)
    .await?;
    Ok(result.rows_affected() > 0)
}
