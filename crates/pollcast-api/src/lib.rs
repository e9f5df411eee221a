pub mod error;
pub mod middleware;
pub mod routes;

use axum::{
    extract::DefaultBodyLimit,
    routing::{delete, get, post},
    Json, Router,
};
use pollcast_core::AppState;
use serde_json::{json, Value};
use tower::limit::ConcurrencyLimitLayer;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Chain sends carry base64 media inline.
const SEND_BODY_LIMIT: usize = 64 * 1024 * 1024;
const MAX_CONCURRENT_REQUESTS: usize = 256;

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok", "version": env!("CARGO_PKG_VERSION") }))
}

pub fn build_router() -> Router<AppState> {
    let send = Router::new()
        .route("/api/send/chain", post(routes::send::send_chain_handler))
        .route("/api/send/poll", post(routes::send::send_poll_handler))
        .route("/api/send/test", post(routes::send::send_test_handler))
        .layer(DefaultBodyLimit::max(SEND_BODY_LIMIT));

    Router::new()
        .route("/health", get(health))
        .route("/api/webhook", post(routes::webhook::receive_update))
        .route(
            "/api/webhook/setup",
            post(routes::webhook::setup_webhook).delete(routes::webhook::delete_webhook),
        )
        .route("/api/polls", get(routes::polls::list_polls))
        .route("/api/polls/unresolved", get(routes::polls::list_unresolved))
        .route("/api/polls/{id}", delete(routes::polls::delete_poll))
        .route("/api/polls/{id}/results", get(routes::polls::get_results))
        .route(
            "/api/subscribers",
            get(routes::subscribers::list_subscribers).post(routes::subscribers::add_subscriber),
        )
        .merge(send)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .layer(ConcurrencyLimitLayer::new(MAX_CONCURRENT_REQUESTS))
}
