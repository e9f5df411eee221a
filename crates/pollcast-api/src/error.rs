use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use pollcast_core::CoreError;
use serde_json::{json, Value};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("not found")]
    NotFound,
    #[error("unauthorized")]
    Unauthorized,
    #[error("forbidden")]
    Forbidden,
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("bot api error: {0}")]
    BadGateway(String),
    #[error("service unavailable: {0}")]
    ServiceUnavailable(String),
    #[error("internal server error")]
    Internal(#[from] anyhow::Error),
}

impl ApiError {
    fn error_code(&self) -> &'static str {
        match self {
            ApiError::NotFound => "NOT_FOUND",
            ApiError::Unauthorized => "UNAUTHORIZED",
            ApiError::Forbidden => "FORBIDDEN",
            ApiError::BadRequest(_) => "BAD_REQUEST",
            ApiError::Conflict(_) => "CONFLICT",
            ApiError::BadGateway(_) => "BAD_GATEWAY",
            ApiError::ServiceUnavailable(_) => "SERVICE_UNAVAILABLE",
            ApiError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::NotFound => StatusCode::NOT_FOUND,
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden => StatusCode::FORBIDDEN,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::BadGateway(_) => StatusCode::BAD_GATEWAY,
            ApiError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let code = self.error_code();

        let message = match &self {
            ApiError::Internal(err) => {
                tracing::error!("API internal error: {err:#}");
                "internal server error".to_string()
            }
            other => other.to_string(),
        };

        let body = json!({
            "code": code,
            "message": message,
            "error": message,
            "details": Value::Null,
        });

        (status, Json(body)).into_response()
    }
}

impl From<CoreError> for ApiError {
    fn from(e: CoreError) -> Self {
        match e {
            CoreError::NotFound => ApiError::NotFound,
            CoreError::Validation(msg) => ApiError::BadRequest(msg),
            e @ CoreError::DuplicateDelivery { .. } => ApiError::Conflict(e.to_string()),
            CoreError::Database(e) => ApiError::Internal(anyhow::anyhow!(e)),
            CoreError::Transport(e) => {
                tracing::warn!(error = %e, "bot api call failed");
                ApiError::BadGateway(e.to_string())
            }
        }
    }
}

impl From<pollcast_db::DbError> for ApiError {
    fn from(e: pollcast_db::DbError) -> Self {
        match e {
            pollcast_db::DbError::Sqlx(e) => ApiError::Internal(anyhow::anyhow!(e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn core_errors_map_to_statuses() {
        // An unmigrated pool yields a genuine storage error.
        let pool = pollcast_db::create_pool("sqlite::memory:", 1).await.unwrap();
        let db_error = pollcast_db::logical_polls::get_logical_poll(&pool, "x")
            .await
            .unwrap_err();

        let cases = [
            (CoreError::NotFound, StatusCode::NOT_FOUND),
            (CoreError::validation("bad"), StatusCode::BAD_REQUEST),
            (
                CoreError::DuplicateDelivery {
                    external_poll_id: "x".into(),
                },
                StatusCode::CONFLICT,
            ),
            (
                CoreError::Database(db_error),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
            (
                CoreError::Transport(pollcast_telegram::TelegramError::Http("down".into())),
                StatusCode::BAD_GATEWAY,
            ),
        ];
        for (core, status) in cases {
            assert_eq!(ApiError::from(core).into_response().status(), status);
        }
    }

    #[tokio::test]
    async fn internal_errors_hide_details() {
        let response = ApiError::Internal(anyhow::anyhow!("disk on fire")).into_response();
        let body = axum::body::to_bytes(response.into_body(), 1024).await.unwrap();
        let value: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(value["code"], "INTERNAL_ERROR");
        assert_eq!(value["message"], "internal server error");
    }
}
