use crate::types::{InlineKeyboardMarkup, InputFile, MediaKind, Message, SentMessage};
use crate::{BotApi, TelegramError};
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;

pub const DEFAULT_API_BASE: &str = "https://api.telegram.org";

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
const MAX_RETRIES: u32 = 3;
const MAX_RETRY_AFTER: Duration = Duration::from_secs(30);
const MAX_MESSAGE_LEN: usize = 4096;
const MAX_CAPTION_LEN: usize = 1024;

#[derive(Debug, Deserialize)]
struct ResponseParameters {
    #[serde(default)]
    retry_after: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    ok: bool,
    result: Option<T>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    error_code: Option<i64>,
    #[serde(default)]
    parameters: Option<ResponseParameters>,
}

impl<T> Envelope<T> {
    fn into_result(self) -> Result<T, TelegramError> {
        if self.ok {
            return self
                .result
                .ok_or_else(|| TelegramError::Decode("missing result".into()));
        }
        Err(TelegramError::Api {
            code: self.error_code.unwrap_or(0),
            description: self.description.unwrap_or_default(),
            retry_after: self.parameters.and_then(|p| p.retry_after),
        })
    }
}

/// HTTP client for the Telegram Bot API.
#[derive(Debug, Clone)]
pub struct TelegramClient {
    http: Client,
    api_base: String,
    token: String,
}

impl TelegramClient {
    pub fn new(token: impl Into<String>) -> Result<Self, TelegramError> {
        Self::with_api_base(token, DEFAULT_API_BASE)
    }

    pub fn with_api_base(
        token: impl Into<String>,
        api_base: &str,
    ) -> Result<Self, TelegramError> {
        let parsed = url::Url::parse(api_base)
            .map_err(|e| TelegramError::Http(format!("invalid api base url: {e}")))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(TelegramError::Http(
                "api base url must be http or https".into(),
            ));
        }

        let http = Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .user_agent("pollcast/0.3")
            .build()
            .map_err(|e| TelegramError::Http(e.without_url().to_string()))?;

        Ok(Self {
            http,
            api_base: api_base.trim_end_matches('/').to_string(),
            token: token.into(),
        })
    }

    pub fn has_token(&self) -> bool {
        !self.token.trim().is_empty()
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/bot{}/{}", self.api_base, self.token, method)
    }

    async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        params: &Value,
    ) -> Result<T, TelegramError> {
        let url = self.method_url(method);
        let mut attempt = 0;
        loop {
            let resp = self
                .http
                .post(&url)
                .json(params)
                .send()
                .await
                .map_err(|e| TelegramError::Http(e.without_url().to_string()))?;
            match decode_response::<T>(resp).await {
                Err(err) if attempt < MAX_RETRIES => match retry_delay(&err) {
                    Some(delay) => {
                        attempt += 1;
                        tracing::warn!(method, attempt, ?delay, "bot api throttled, retrying");
                        tokio::time::sleep(delay).await;
                    }
                    None => return Err(err),
                },
                other => return other,
            }
        }
    }

    async fn call_multipart<T, F>(&self, method: &str, build_form: F) -> Result<T, TelegramError>
    where
        T: DeserializeOwned,
        F: Fn() -> Result<Form, TelegramError>,
    {
        let url = self.method_url(method);
        let mut attempt = 0;
        loop {
            let resp = self
                .http
                .post(&url)
                .multipart(build_form()?)
                .send()
                .await
                .map_err(|e| TelegramError::Http(e.without_url().to_string()))?;
            match decode_response::<T>(resp).await {
                Err(err) if attempt < MAX_RETRIES => match retry_delay(&err) {
                    Some(delay) => {
                        attempt += 1;
                        tracing::warn!(method, attempt, ?delay, "bot api throttled, retrying");
                        tokio::time::sleep(delay).await;
                    }
                    None => return Err(err),
                },
                other => return other,
            }
        }
    }
}

async fn decode_response<T: DeserializeOwned>(
    resp: reqwest::Response,
) -> Result<T, TelegramError> {
    let status = resp.status();
    let body = resp
        .bytes()
        .await
        .map_err(|e| TelegramError::Http(e.without_url().to_string()))?;
    let envelope: Envelope<T> = serde_json::from_slice(&body).map_err(|e| {
        TelegramError::Decode(format!("status {}: {e}", status.as_u16()))
    })?;
    envelope.into_result()
}

/// Only throttling (429 with `retry_after`) is retried here.
fn retry_delay(err: &TelegramError) -> Option<Duration> {
    match err {
        TelegramError::Api {
            code: 429,
            retry_after,
            ..
        } => Some(
            Duration::from_secs(retry_after.unwrap_or(1).max(1)).min(MAX_RETRY_AFTER),
        ),
        _ => None,
    }
}

fn truncate_chars(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

fn media_part(file: &InputFile) -> Result<Part, TelegramError> {
    let part = Part::bytes(file.bytes.clone()).file_name(file.file_name.clone());
    match file.mime_type.as_deref() {
        Some(mime) => part
            .mime_str(mime)
            .map_err(|e| TelegramError::Http(format!("invalid mime type: {e}"))),
        None => Ok(part),
    }
}

impl BotApi for TelegramClient {
    async fn send_message(
        &self,
        chat_id: i64,
        text: &str,
        keyboard: Option<&InlineKeyboardMarkup>,
    ) -> Result<SentMessage, TelegramError> {
        let mut params = json!({
            "chat_id": chat_id,
            "text": truncate_chars(text, MAX_MESSAGE_LEN),
        });
        if let Some(keyboard) = keyboard {
            params["reply_markup"] = json!(keyboard);
        }
        let message: Message = self.call("sendMessage", &params).await?;
        Ok(message.into())
    }

    async fn send_media(
        &self,
        chat_id: i64,
        kind: MediaKind,
        file: &InputFile,
        caption: Option<&str>,
    ) -> Result<SentMessage, TelegramError> {
        let caption = caption
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .map(|c| truncate_chars(c, MAX_CAPTION_LEN).to_string());
        let message: Message = self
            .call_multipart(kind.method(), || {
                let mut form = Form::new()
                    .text("chat_id", chat_id.to_string())
                    .part(kind.field(), media_part(file)?);
                if let Some(caption) = &caption {
                    form = form.text("caption", caption.clone());
                }
                Ok(form)
            })
            .await?;
        Ok(message.into())
    }

    async fn send_poll(
        &self,
        chat_id: i64,
        question: &str,
        options: &[String],
        is_anonymous: bool,
        allows_multiple_answers: bool,
    ) -> Result<SentMessage, TelegramError> {
        let params = json!({
            "chat_id": chat_id,
            "question": question,
            "options": options.iter().map(|o| json!({ "text": o })).collect::<Vec<_>>(),
            "is_anonymous": is_anonymous,
            "allows_multiple_answers": allows_multiple_answers,
        });
        let message: Message = self.call("sendPoll", &params).await?;
        Ok(message.into())
    }

    async fn answer_callback_query(
        &self,
        callback_query_id: &str,
        text: &str,
        show_alert: bool,
    ) -> Result<(), TelegramError> {
        let params = json!({
            "callback_query_id": callback_query_id,
            "text": text,
            "show_alert": show_alert,
        });
        let _: bool = self.call("answerCallbackQuery", &params).await?;
        Ok(())
    }

    async fn edit_message_text(
        &self,
        chat_id: i64,
        message_id: i64,
        text: &str,
    ) -> Result<(), TelegramError> {
        let params = json!({
            "chat_id": chat_id,
            "message_id": message_id,
            "text": truncate_chars(text, MAX_MESSAGE_LEN),
            "reply_markup": InlineKeyboardMarkup::default(),
        });
        // Returns the edited Message, or `true` for inline messages.
        let _: Value = self.call("editMessageText", &params).await?;
        Ok(())
    }

    async fn set_webhook(
        &self,
        url: &str,
        secret_token: Option<&str>,
    ) -> Result<bool, TelegramError> {
        let mut params = json!({
            "url": url,
            "allowed_updates": ["message", "callback_query", "poll_answer"],
        });
        if let Some(secret) = secret_token.filter(|s| !s.is_empty()) {
            params["secret_token"] = json!(secret);
        }
        self.call("setWebhook", &params).await
    }

    async fn delete_webhook(&self) -> Result<bool, TelegramError> {
        self.call("deleteWebhook", &json!({})).await
    }

    async fn get_webhook_info(&self) -> Result<Value, TelegramError> {
        self.call("getWebhookInfo", &json!({})).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelope_error_carries_retry_after() {
        let raw = r#"{"ok": false, "error_code": 429, "description": "Too Many Requests: retry after 7", "parameters": {"retry_after": 7}}"#;
        let envelope: Envelope<Value> = serde_json::from_str(raw).unwrap();
        let err = envelope.into_result().unwrap_err();
        assert_eq!(retry_delay(&err), Some(Duration::from_secs(7)));
    }

    #[test]
    fn envelope_ok_without_result_is_decode_error() {
        let envelope: Envelope<bool> = serde_json::from_str(r#"{"ok": true}"#).unwrap();
        assert!(matches!(
            envelope.into_result(),
            Err(TelegramError::Decode(_))
        ));
    }

    #[test]
    fn non_throttle_errors_are_not_retried() {
        let err = TelegramError::Api {
            code: 400,
            description: "Bad Request: chat not found".into(),
            retry_after: None,
        };
        assert_eq!(retry_delay(&err), None);
    }

    #[test]
    fn retry_after_is_capped() {
        let err = TelegramError::Api {
            code: 429,
            description: String::new(),
            retry_after: Some(3600),
        };
        assert_eq!(retry_delay(&err), Some(MAX_RETRY_AFTER));
    }

    #[test]
    fn truncate_respects_char_boundaries() {
        assert_eq!(truncate_chars("привет", 3), "при");
        assert_eq!(truncate_chars("hi", 10), "hi");
    }

    #[test]
    fn rejects_non_http_api_base() {
        assert!(TelegramClient::with_api_base("t", "ftp://example.com").is_err());
        assert!(TelegramClient::with_api_base("t", "not a url").is_err());
    }

    #[test]
    fn method_url_trims_trailing_slash() {
        let client = TelegramClient::with_api_base("123:abc", "http://localhost:8081/").unwrap();
        assert_eq!(
            client.method_url("getMe"),
            "http://localhost:8081/bot123:abc/getMe"
        );
    }
}
