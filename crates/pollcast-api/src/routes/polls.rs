use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use pollcast_core::AppState;
use pollcast_models::poll::{LogicalPoll, PollResults};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::ApiError;
use crate::middleware::AdminUser;

const DEFAULT_UNRESOLVED_LIMIT: i64 = 100;
const MAX_UNRESOLVED_LIMIT: i64 = 1000;

fn poll_to_json(p: &LogicalPoll) -> Value {
    json!({
        "id": p.id,
        "question": p.question,
        "options": p.options,
        "is_anonymous": p.is_anonymous,
        "allows_multiple_answers": p.allows_multiple_answers,
        "created_at": p.created_at.to_rfc3339(),
    })
}

fn results_to_json(results: &PollResults) -> Value {
    let options: Vec<Value> = results
        .poll
        .options
        .iter()
        .enumerate()
        .map(|(index, text)| {
            json!({
                "index": index,
                "text": text,
                "count": results.option_counts.get(index).copied().unwrap_or(0),
                "percentage": results.percentage(index),
            })
        })
        .collect();
    let responses: Vec<Value> = results
        .responses
        .iter()
        .map(|r| {
            json!({
                "respondent_id": r.respondent_id,
                "option_indices": r.option_indices,
                "option_texts": r.option_texts,
                "responded_at": r.responded_at.to_rfc3339(),
            })
        })
        .collect();
    json!({
        "poll": poll_to_json(&results.poll),
        "total_responses": results.total_responses,
        "options": options,
        "responses": responses,
    })
}

pub async fn list_polls(
    State(state): State<AppState>,
    _admin: AdminUser,
) -> Result<Json<Value>, ApiError> {
    let polls = pollcast_core::polls::list_polls(&state.db).await?;
    let polls: Vec<Value> = polls.iter().map(poll_to_json).collect();
    Ok(Json(json!({ "polls": polls })))
}

pub async fn get_results(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(poll_id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let results = pollcast_core::results::aggregate(&state.db, &poll_id).await?;
    Ok(Json(results_to_json(&results)))
}

pub async fn delete_poll(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(poll_id): Path<String>,
) -> Result<StatusCode, ApiError> {
    if pollcast_core::polls::purge_poll(&state.db, &poll_id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::NotFound)
    }
}

#[derive(Deserialize)]
pub struct UnresolvedQuery {
    pub limit: Option<i64>,
}

pub async fn list_unresolved(
    State(state): State<AppState>,
    _admin: AdminUser,
    Query(query): Query<UnresolvedQuery>,
) -> Result<Json<Value>, ApiError> {
    let limit = query
        .limit
        .unwrap_or(DEFAULT_UNRESOLVED_LIMIT)
        .clamp(1, MAX_UNRESOLVED_LIMIT);
    let rows = pollcast_db::unresolved_answers::list_unresolved_answers(&state.db, limit).await?;
    let answers: Vec<Value> = rows
        .into_iter()
        .map(|row| {
            let answer: pollcast_models::poll::UnresolvedPollAnswer = row.into();
            json!({
                "external_poll_id": answer.external_poll_id,
                "respondent_id": answer.respondent_id,
                "option_indices": answer.option_indices,
                "received_at": answer.received_at.to_rfc3339(),
            })
        })
        .collect();
    Ok(Json(json!({ "answers": answers })))
}
