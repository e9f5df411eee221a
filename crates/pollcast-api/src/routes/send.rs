use axum::{extract::State, http::StatusCode, Json};
use pollcast_core::broadcast::{deliver, normalize_targets, prepare_chain, prepare_single, send_chain};
use pollcast_core::AppState;
use pollcast_models::broadcast::{ChainMessage, PollDraft};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::ApiError;
use crate::middleware::AdminUser;

#[derive(Deserialize)]
pub struct SendChainRequest {
    pub messages: Vec<ChainMessage>,
    /// Restricts the fan-out to these chats instead of all active subscribers.
    #[serde(default)]
    pub chat_ids: Option<Vec<i64>>,
}

async fn target_chats(state: &AppState, requested: Option<Vec<i64>>) -> Result<Vec<i64>, ApiError> {
    let chats = match requested {
        Some(ids) => normalize_targets(ids)?,
        None => pollcast_core::subscribers::active_chat_ids(&state.db).await?,
    };
    if chats.is_empty() {
        return Err(ApiError::BadRequest("No active subscribers".into()));
    }
    Ok(chats)
}

fn require_bot(state: &AppState) -> Result<(), ApiError> {
    if state.bot.has_token() {
        Ok(())
    } else {
        Err(ApiError::ServiceUnavailable("bot token is not configured".into()))
    }
}

/// Validates the chain, creates its polls and sends it in the background.
pub async fn send_chain_handler(
    State(state): State<AppState>,
    _admin: AdminUser,
    Json(body): Json<SendChainRequest>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    require_bot(&state)?;
    let kinds: Vec<&'static str> = body.messages.iter().map(ChainMessage::kind).collect();
    let chats = target_chats(&state, body.chat_ids).await?;
    let prepared = prepare_chain(&state.db, body.messages, state.config.poll_delivery).await?;
    let poll_ids: Vec<String> = prepared
        .iter()
        .filter_map(|m| m.logical_poll_id())
        .map(str::to_string)
        .collect();

    tracing::info!(chats = chats.len(), ?kinds, "starting chain broadcast");
    let total_chats = chats.len();
    let task_state = state.clone();
    tokio::spawn(async move {
        let report = send_chain(
            &task_state.db,
            &task_state.bot,
            &chats,
            &prepared,
            task_state.config.pacing,
        )
        .await;
        tracing::info!(sent = report.sent, failed = report.failed, "chain broadcast complete");
    });

    Ok((
        StatusCode::ACCEPTED,
        Json(json!({
            "accepted": true,
            "chats": total_chats,
            "messages": kinds.len(),
            "poll_ids": poll_ids,
        })),
    ))
}

#[derive(Deserialize)]
pub struct SendPollRequest {
    #[serde(flatten)]
    pub poll: PollDraft,
    #[serde(default)]
    pub chat_ids: Option<Vec<i64>>,
}

/// Sends one poll to every target chat and waits for the fan-out to finish.
pub async fn send_poll_handler(
    State(state): State<AppState>,
    _admin: AdminUser,
    Json(body): Json<SendPollRequest>,
) -> Result<Json<Value>, ApiError> {
    require_bot(&state)?;
    let chats = target_chats(&state, body.chat_ids).await?;
    let prepared = prepare_chain(
        &state.db,
        vec![ChainMessage::Poll { poll: body.poll }],
        state.config.poll_delivery,
    )
    .await?;
    let report = send_chain(&state.db, &state.bot, &chats, &prepared, state.config.pacing).await;
    Ok(Json(json!({
        "poll_id": report.poll_ids.first(),
        "sent": report.sent,
        "failed": report.failed,
        "deactivated": report.deactivated,
        "results": report.outcomes,
    })))
}

#[derive(Deserialize)]
pub struct SendTestRequest {
    pub chat_id: i64,
    pub message: ChainMessage,
}

/// Sends a single non-poll message to one chat.
pub async fn send_test_handler(
    State(state): State<AppState>,
    _admin: AdminUser,
    Json(body): Json<SendTestRequest>,
) -> Result<Json<Value>, ApiError> {
    require_bot(&state)?;
    let prepared = prepare_single(body.message)?;
    let (outcome, error) = deliver(&state.db, &state.bot, body.chat_id, 0, &prepared).await;
    if let Some(e) = error {
        return Err(pollcast_core::CoreError::Transport(e).into());
    }
    Ok(Json(json!({ "success": outcome.success, "message_id": outcome.message_id })))
}
