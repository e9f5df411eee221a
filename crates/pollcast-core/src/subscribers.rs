use crate::error::CoreError;
use chrono::Utc;
use pollcast_db::DbPool;
use pollcast_models::subscriber::{Subscriber, SubscriberProfile};
use serde::Serialize;
use serde_json::Value;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ImportSummary {
    pub found: usize,
    pub imported: usize,
    pub already_known: usize,
    pub skipped: usize,
}

/// Subscribes a chat that sent `/start`, re-activating it if needed.
pub async fn subscribe(
    pool: &DbPool,
    chat_id: i64,
    profile: &SubscriberProfile,
) -> Result<Subscriber, CoreError> {
    let row = pollcast_db::subscribers::upsert_subscriber(pool, chat_id, profile, Utc::now()).await?;
    tracing::info!(chat_id, "chat subscribed");
    Ok(row.into())
}

/// Adds a chat id without profile data. Returns false when it was already known.
pub async fn add_chat(pool: &DbPool, chat_id: i64) -> Result<bool, CoreError> {
    if chat_id == 0 {
        return Err(CoreError::validation("chat_id must be non-zero"));
    }
    Ok(pollcast_db::subscribers::insert_subscriber_if_missing(pool, chat_id, Utc::now()).await?)
}

pub async fn get(pool: &DbPool, chat_id: i64) -> Result<Option<Subscriber>, CoreError> {
    let row = pollcast_db::subscribers::get_subscriber(pool, chat_id).await?;
    Ok(row.map(Into::into))
}

pub async fn deactivate(pool: &DbPool, chat_id: i64) -> Result<bool, CoreError> {
    let changed = pollcast_db::subscribers::deactivate_subscriber(pool, chat_id).await?;
    if changed {
        tracing::info!(chat_id, "subscriber deactivated");
    }
    Ok(changed)
}

pub async fn list(pool: &DbPool, active_only: bool) -> Result<Vec<Subscriber>, CoreError> {
    let rows = if active_only {
        pollcast_db::subscribers::get_active_subscribers(pool).await?
    } else {
        pollcast_db::subscribers::get_all_subscribers(pool).await?
    };
    Ok(rows.into_iter().map(Into::into).collect())
}

pub async fn active_chat_ids(pool: &DbPool) -> Result<Vec<i64>, CoreError> {
    let rows = pollcast_db::subscribers::get_active_subscribers(pool).await?;
    Ok(rows.into_iter().map(|r| r.chat_id).collect())
}

/// Parses a JSON array of chat ids given as numbers or numeric strings.
///
/// Entries that are neither are skipped and counted in the second value.
pub fn parse_chat_list(raw: &str) -> Result<(Vec<i64>, usize), CoreError> {
    let value: Value = serde_json::from_str(raw)
        .map_err(|e| CoreError::validation(format!("chat list is not valid JSON: {e}")))?;
    let Value::Array(entries) = value else {
        return Err(CoreError::validation("chat list must be a JSON array"));
    };

    let mut ids = Vec::with_capacity(entries.len());
    let mut skipped = 0;
    for entry in entries {
        let id = match &entry {
            Value::Number(n) => n.as_i64(),
            Value::String(s) => s.trim().parse::<i64>().ok(),
            _ => None,
        };
        match id.filter(|id| *id != 0) {
            Some(id) if !ids.contains(&id) => ids.push(id),
            Some(_) => {}
            None => {
                tracing::warn!(%entry, "skipping chat list entry");
                skipped += 1;
            }
        }
    }
    Ok((ids, skipped))
}

/// Adds every chat of a legacy chat list that is not yet known.
pub async fn import_chat_list(pool: &DbPool, raw: &str) -> Result<ImportSummary, CoreError> {
    let (ids, skipped) = parse_chat_list(raw)?;
    let mut summary = ImportSummary {
        found: ids.len(),
        skipped,
        ..Default::default()
    };
    for chat_id in ids {
        if add_chat(pool, chat_id).await? {
            summary.imported += 1;
        } else {
            summary.already_known += 1;
        }
    }
    tracing::info!(
        found = summary.found,
        imported = summary.imported,
        skipped = summary.skipped,
        "chat list imported"
    );
    Ok(summary)
}
