pub mod client;
pub mod types;

pub use client::TelegramClient;

use thiserror::Error;
use types::{InlineKeyboardMarkup, InputFile, MediaKind, SentMessage};

/// Error descriptions that mean the chat can never be reached again.
const UNREACHABLE_CHAT_MARKERS: &[&str] = &[
    "chat not found",
    "bot was blocked",
    "user is deactivated",
    "chat was deactivated",
    "group chat was upgraded",
];

#[derive(Debug, Error)]
pub enum TelegramError {
    #[error("http error: {0}")]
    Http(String),
    #[error("bot api error {code}: {description}")]
    Api {
        code: i64,
        description: String,
        retry_after: Option<u64>,
    },
    #[error("invalid bot api response: {0}")]
    Decode(String),
}

impl TelegramError {
    /// True when further sends to the same chat are pointless
    /// (chat deleted, bot blocked, user deactivated).
    pub fn is_unrecoverable(&self) -> bool {
        match self {
            TelegramError::Api {
                code, description, ..
            } => {
                let lowered = description.to_ascii_lowercase();
                *code == 403
                    || UNREACHABLE_CHAT_MARKERS
                        .iter()
                        .any(|marker| lowered.contains(marker))
            }
            _ => false,
        }
    }
}

/// The subset of the Bot API the service relies on.
///
/// Implemented by [`TelegramClient`] for production and by recording fakes
/// in tests.
#[allow(async_fn_in_trait)]
pub trait BotApi: Send + Sync {
    async fn send_message(
        &self,
        chat_id: i64,
        text: &str,
        keyboard: Option<&InlineKeyboardMarkup>,
    ) -> Result<SentMessage, TelegramError>;

    async fn send_media(
        &self,
        chat_id: i64,
        kind: MediaKind,
        file: &InputFile,
        caption: Option<&str>,
    ) -> Result<SentMessage, TelegramError>;

    async fn send_poll(
        &self,
        chat_id: i64,
        question: &str,
        options: &[String],
        is_anonymous: bool,
        allows_multiple_answers: bool,
    ) -> Result<SentMessage, TelegramError>;

    async fn answer_callback_query(
        &self,
        callback_query_id: &str,
        text: &str,
        show_alert: bool,
    ) -> Result<(), TelegramError>;

    /// Replaces the text of a sent message and drops its inline keyboard.
    async fn edit_message_text(
        &self,
        chat_id: i64,
        message_id: i64,
        text: &str,
    ) -> Result<(), TelegramError>;

    async fn set_webhook(&self, url: &str, secret_token: Option<&str>)
        -> Result<bool, TelegramError>;

    async fn delete_webhook(&self) -> Result<bool, TelegramError>;

    async fn get_webhook_info(&self) -> Result<serde_json::Value, TelegramError>;
}
