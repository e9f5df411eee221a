use axum::{
    body::Bytes,
    extract::State,
    http::HeaderMap,
    Json,
};
use pollcast_core::updates::decode_update;
use pollcast_core::webhook::{handle_update, UpdateOutcome};
use pollcast_core::AppState;
use serde_json::{json, Value};

use crate::error::ApiError;
use crate::middleware::{verify_webhook_secret, AdminUser};

/// Telegram update intake.
///
/// Replies 200 for every update that was applied or deliberately skipped;
/// storage failures surface as 500 so Telegram redelivers the update.
pub async fn receive_update(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Value>, ApiError> {
    verify_webhook_secret(&state, &headers)?;
    let update = decode_update(&body)?;
    let outcome = handle_update(&state.webhook_context(), update).await?;
    if let UpdateOutcome::Unresolved { external_poll_id } = &outcome {
        tracing::warn!(%external_poll_id, "poll answer parked as unresolved");
    }
    Ok(Json(json!({ "ok": true })))
}

pub async fn setup_webhook(
    State(state): State<AppState>,
    _admin: AdminUser,
) -> Result<Json<Value>, ApiError> {
    if !state.bot.has_token() {
        return Err(ApiError::ServiceUnavailable("bot token is not configured".into()));
    }
    let url = state
        .config
        .webhook_url
        .as_deref()
        .filter(|u| !u.is_empty())
        .ok_or_else(|| ApiError::ServiceUnavailable("webhook url is not configured".into()))?;
    let ok = pollcast_core::webhook::configure_webhook(
        &state.bot,
        url,
        state.config.webhook_secret.as_deref(),
    )
    .await?;
    let info = match pollcast_telegram::BotApi::get_webhook_info(&state.bot).await {
        Ok(info) => info,
        Err(e) => {
            tracing::warn!(error = %e, "failed to read webhook info");
            Value::Null
        }
    };
    Ok(Json(json!({ "ok": ok, "url": url, "webhook_info": info })))
}

pub async fn delete_webhook(
    State(state): State<AppState>,
    _admin: AdminUser,
) -> Result<Json<Value>, ApiError> {
    if !state.bot.has_token() {
        return Err(ApiError::ServiceUnavailable("bot token is not configured".into()));
    }
    let ok = pollcast_core::webhook::remove_webhook(&state.bot).await?;
    Ok(Json(json!({ "ok": ok })))
}
