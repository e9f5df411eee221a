use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use pollcast_core::AppState;
use pollcast_models::subscriber::Subscriber;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::ApiError;
use crate::middleware::AdminUser;

fn subscriber_to_json(s: &Subscriber) -> Value {
    json!({
        "chat_id": s.chat_id,
        "username": s.username,
        "first_name": s.first_name,
        "last_name": s.last_name,
        "subscribed_at": s.subscribed_at.to_rfc3339(),
        "is_active": s.is_active,
    })
}

#[derive(Deserialize)]
pub struct ListQuery {
    #[serde(default)]
    pub active: bool,
}

pub async fn list_subscribers(
    State(state): State<AppState>,
    _admin: AdminUser,
    Query(query): Query<ListQuery>,
) -> Result<Json<Value>, ApiError> {
    let subscribers = pollcast_core::subscribers::list(&state.db, query.active).await?;
    let active = subscribers.iter().filter(|s| s.is_active).count();
    let list: Vec<Value> = subscribers.iter().map(subscriber_to_json).collect();
    Ok(Json(json!({
        "total": list.len(),
        "active": active,
        "subscribers": list,
    })))
}

#[derive(Deserialize)]
pub struct AddSubscriberRequest {
    pub chat_id: i64,
}

pub async fn add_subscriber(
    State(state): State<AppState>,
    _admin: AdminUser,
    Json(body): Json<AddSubscriberRequest>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let created = pollcast_core::subscribers::add_chat(&state.db, body.chat_id).await?;
    let subscriber = pollcast_core::subscribers::get(&state.db, body.chat_id)
        .await?
        .ok_or(ApiError::NotFound)?;
    let status = if created {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    Ok((
        status,
        Json(json!({ "created": created, "subscriber": subscriber_to_json(&subscriber) })),
    ))
}
