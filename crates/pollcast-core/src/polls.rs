use crate::error::CoreError;
use chrono::Utc;
use pollcast_db::DbPool;
use pollcast_models::poll::LogicalPoll;

pub const MIN_OPTIONS: usize = 2;
/// Bot API limit for both native polls and inline keyboards we build.
pub const MAX_OPTIONS: usize = 10;
pub const MAX_QUESTION_CHARS: usize = 300;
pub const MAX_OPTION_CHARS: usize = 100;

/// Trims and checks a question with its options.
///
/// Nothing is written; callers that validate a whole batch before
/// persisting anything use this directly.
pub fn validate_draft(question: &str, options: &[String]) -> Result<(String, Vec<String>), CoreError> {
    let question = question.trim();
    if question.is_empty() {
        return Err(CoreError::validation("Poll question is required"));
    }
    if question.chars().count() > MAX_QUESTION_CHARS {
        return Err(CoreError::validation(format!(
            "Poll question must be at most {MAX_QUESTION_CHARS} characters"
        )));
    }
    if options.len() < MIN_OPTIONS {
        return Err(CoreError::validation(format!(
            "Poll needs at least {MIN_OPTIONS} options"
        )));
    }
    if options.len() > MAX_OPTIONS {
        return Err(CoreError::validation(format!(
            "Poll supports at most {MAX_OPTIONS} options"
        )));
    }

    let mut cleaned = Vec::with_capacity(options.len());
    for (index, option) in options.iter().enumerate() {
        let option = option.trim();
        if option.is_empty() {
            return Err(CoreError::validation(format!("Option {index} is empty")));
        }
        if option.chars().count() > MAX_OPTION_CHARS {
            return Err(CoreError::validation(format!(
                "Option {index} must be at most {MAX_OPTION_CHARS} characters"
            )));
        }
        cleaned.push(option.to_string());
    }
    Ok((question.to_string(), cleaned))
}

pub async fn create_poll(
    pool: &DbPool,
    question: &str,
    options: &[String],
    is_anonymous: bool,
    allows_multiple_answers: bool,
) -> Result<LogicalPoll, CoreError> {
    let (question, options) = validate_draft(question, options)?;
    let id = uuid::Uuid::new_v4().to_string();
    let row = pollcast_db::logical_polls::create_logical_poll(
        pool,
        &id,
        &question,
        &options,
        is_anonymous,
        allows_multiple_answers,
        Utc::now(),
    )
    .await?;
    tracing::info!(poll_id = %row.id, options = options.len(), "logical poll created");
    Ok(row.into())
}

pub async fn get_poll(pool: &DbPool, id: &str) -> Result<Option<LogicalPoll>, CoreError> {
    let row = pollcast_db::logical_polls::get_logical_poll(pool, id).await?;
    Ok(row.map(Into::into))
}

pub async fn require_poll(pool: &DbPool, id: &str) -> Result<LogicalPoll, CoreError> {
    get_poll(pool, id).await?.ok_or(CoreError::NotFound)
}

/// Newest first.
pub async fn list_polls(pool: &DbPool) -> Result<Vec<LogicalPoll>, CoreError> {
    let rows = pollcast_db::logical_polls::list_logical_polls(pool).await?;
    Ok(rows.into_iter().map(Into::into).collect())
}

/// Deletes a poll together with its deliveries and responses.
pub async fn purge_poll(pool: &DbPool, id: &str) -> Result<bool, CoreError> {
    let deleted = pollcast_db::logical_polls::delete_logical_poll(pool, id).await?;
    if deleted {
        tracing::info!(poll_id = %id, "logical poll purged");
    }
    Ok(deleted)
}
