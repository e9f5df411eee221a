use axum::{
    extract::FromRequestParts,
    http::{header, request::Parts, HeaderMap},
};
use pollcast_core::AppState;
use sha2::{Digest, Sha256};

use crate::error::ApiError;

pub const WEBHOOK_SECRET_HEADER: &str = "x-telegram-bot-api-secret-token";

/// Compares two secrets through their digests so timing does not depend
/// on where they first differ.
fn secrets_match(expected: &str, provided: &str) -> bool {
    Sha256::digest(expected.as_bytes()) == Sha256::digest(provided.as_bytes())
}

fn extract_bearer(parts: &Parts) -> Option<&str> {
    parts
        .headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())?
        .strip_prefix("Bearer ")
        .map(str::trim)
}

/// Extractor guarding admin routes.
///
/// When no admin token is configured every request is admitted.
pub struct AdminUser;

impl FromRequestParts<AppState> for AdminUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let Some(expected) = state.config.admin_token.as_deref().filter(|t| !t.is_empty()) else {
            return Ok(AdminUser);
        };
        match extract_bearer(parts) {
            Some(token) if secrets_match(expected, token) => Ok(AdminUser),
            _ => Err(ApiError::Unauthorized),
        }
    }
}

/// Checks the secret Telegram echoes back on every webhook call.
pub fn verify_webhook_secret(state: &AppState, headers: &HeaderMap) -> Result<(), ApiError> {
    let Some(expected) = state.config.webhook_secret.as_deref().filter(|s| !s.is_empty()) else {
        return Ok(());
    };
    let provided = headers
        .get(WEBHOOK_SECRET_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    if secrets_match(expected, provided) {
        Ok(())
    } else {
        tracing::warn!("webhook call with missing or wrong secret token");
        Err(ApiError::Forbidden)
    }
}
