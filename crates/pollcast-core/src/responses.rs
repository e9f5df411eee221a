use crate::error::CoreError;
use chrono::Utc;
use pollcast_db::DbPool;
use pollcast_models::poll::{LogicalPoll, PollResponse};

/// Checks a selection against `poll` and returns it deduplicated, in the
/// order first given.
pub fn normalize_selection(poll: &LogicalPoll, option_indices: &[i32]) -> Result<Vec<i32>, CoreError> {
    if option_indices.is_empty() {
        return Err(CoreError::validation("At least one option must be selected"));
    }
    let mut selection: Vec<i32> = Vec::with_capacity(option_indices.len());
    for &index in option_indices {
        if poll.option_text(index).is_none() {
            return Err(CoreError::validation(format!(
                "Option index {index} is out of range for a poll with {} options",
                poll.options.len()
            )));
        }
        if !selection.contains(&index) {
            selection.push(index);
        }
    }
    if selection.len() > 1 && !poll.allows_multiple_answers {
        return Err(CoreError::validation("This poll accepts a single answer"));
    }
    Ok(selection)
}

/// Option labels for an already normalized selection.
pub fn selection_texts(poll: &LogicalPoll, selection: &[i32]) -> Vec<String> {
    selection
        .iter()
        .filter_map(|&i| poll.option_text(i))
        .map(str::to_string)
        .collect()
}

/// Records the latest selection of `respondent_id`, replacing any earlier one.
///
/// When `option_texts` is omitted the labels are taken from the poll.
pub async fn upsert_response(
    pool: &DbPool,
    logical_poll_id: &str,
    respondent_id: i64,
    option_indices: &[i32],
    option_texts: Option<Vec<String>>,
) -> Result<PollResponse, CoreError> {
    let poll = crate::polls::require_poll(pool, logical_poll_id).await?;
    let selection = normalize_selection(&poll, option_indices)?;
    let texts = match option_texts {
        Some(texts) if texts.len() != selection.len() => {
            return Err(CoreError::validation(
                "Option texts must match the selected options",
            ));
        }
        Some(texts) => texts,
        None => selection_texts(&poll, &selection),
    };

    let id = uuid::Uuid::new_v4().to_string();
    let row = pollcast_db::poll_responses::upsert_response(
        pool,
        &id,
        logical_poll_id,
        respondent_id,
        &selection,
        Some(&texts),
        Utc::now(),
    )
    .await?;
    tracing::debug!(poll_id = %logical_poll_id, respondent_id, ?selection, "response recorded");
    Ok(row.into())
}

pub async fn has_responded(
    pool: &DbPool,
    logical_poll_id: &str,
    respondent_id: i64,
) -> Result<bool, CoreError> {
    Ok(pollcast_db::poll_responses::has_response(pool, logical_poll_id, respondent_id).await?)
}

pub async fn get_response(
    pool: &DbPool,
    logical_poll_id: &str,
    respondent_id: i64,
) -> Result<Option<PollResponse>, CoreError> {
    let row = pollcast_db::poll_responses::get_response(pool, logical_poll_id, respondent_id).await?;
    Ok(row.map(Into::into))
}

/// Removes the response of `respondent_id`, as when a native vote is retracted.
pub async fn retract_response(
    pool: &DbPool,
    logical_poll_id: &str,
    respondent_id: i64,
) -> Result<bool, CoreError> {
    let removed =
        pollcast_db::poll_responses::delete_response(pool, logical_poll_id, respondent_id).await?;
    if removed {
        tracing::debug!(poll_id = %logical_poll_id, respondent_id, "response retracted");
    }
    Ok(removed)
}
