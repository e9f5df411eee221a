//! In-memory pool and a recording [`BotApi`] for unit tests.

use pollcast_db::DbPool;
use pollcast_telegram::types::{InlineKeyboardMarkup, InputFile, MediaKind, SentMessage};
use pollcast_telegram::{BotApi, TelegramError};
use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Mutex;

pub async fn test_pool() -> DbPool {
    let pool = pollcast_db::create_pool("sqlite::memory:", 1).await.unwrap();
    pollcast_db::run_migrations(&pool).await.unwrap();
    pool
}

#[derive(Debug, Clone, PartialEq)]
pub enum BotCall {
    Message {
        chat_id: i64,
        text: String,
        keyboard: Option<InlineKeyboardMarkup>,
    },
    Media {
        chat_id: i64,
        kind: MediaKind,
        file_name: String,
        caption: Option<String>,
    },
    Poll {
        chat_id: i64,
        question: String,
        options: Vec<String>,
    },
    AnswerCallback {
        query_id: String,
        text: String,
        show_alert: bool,
    },
    Edit {
        chat_id: i64,
        message_id: i64,
        text: String,
    },
    SetWebhook {
        url: String,
        secret: Option<String>,
    },
    DeleteWebhook,
}

#[derive(Default)]
pub struct RecordingBot {
    calls: Mutex<Vec<BotCall>>,
    failing_chats: Mutex<HashMap<i64, (i64, String)>>,
    next_id: AtomicI64,
}

impl RecordingBot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every send to `chat_id` fails with the given Bot API error.
    pub fn fail_chat(&self, chat_id: i64, code: i64, description: &str) {
        self.failing_chats
            .lock()
            .unwrap()
            .insert(chat_id, (code, description.to_string()));
    }

    pub fn calls(&self) -> Vec<BotCall> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: BotCall) {
        self.calls.lock().unwrap().push(call);
    }

    fn check(&self, chat_id: i64) -> Result<(), TelegramError> {
        match self.failing_chats.lock().unwrap().get(&chat_id) {
            Some((code, description)) => Err(TelegramError::Api {
                code: *code,
                description: description.clone(),
                retry_after: None,
            }),
            None => Ok(()),
        }
    }

    fn next_message_id(&self) -> i64 {
        self.next_id.fetch_add(1, Ordering::SeqCst) + 1
    }
}

impl BotApi for RecordingBot {
    async fn send_message(
        &self,
        chat_id: i64,
        text: &str,
        keyboard: Option<&InlineKeyboardMarkup>,
    ) -> Result<SentMessage, TelegramError> {
        self.check(chat_id)?;
        self.record(BotCall::Message {
            chat_id,
            text: text.to_string(),
            keyboard: keyboard.cloned(),
        });
        Ok(SentMessage {
            message_id: self.next_message_id(),
            poll_id: None,
        })
    }

    async fn send_media(
        &self,
        chat_id: i64,
        kind: MediaKind,
        file: &InputFile,
        caption: Option<&str>,
    ) -> Result<SentMessage, TelegramError> {
        self.check(chat_id)?;
        self.record(BotCall::Media {
            chat_id,
            kind,
            file_name: file.file_name.clone(),
            caption: caption.map(str::to_string),
        });
        Ok(SentMessage {
            message_id: self.next_message_id(),
            poll_id: None,
        })
    }

    async fn send_poll(
        &self,
        chat_id: i64,
        question: &str,
        options: &[String],
        _is_anonymous: bool,
        _allows_multiple_answers: bool,
    ) -> Result<SentMessage, TelegramError> {
        self.check(chat_id)?;
        self.record(BotCall::Poll {
            chat_id,
            question: question.to_string(),
            options: options.to_vec(),
        });
        let message_id = self.next_message_id();
        Ok(SentMessage {
            message_id,
            poll_id: Some(format!("tg-poll-{message_id}")),
        })
    }

    async fn answer_callback_query(
        &self,
        callback_query_id: &str,
        text: &str,
        show_alert: bool,
    ) -> Result<(), TelegramError> {
        self.record(BotCall::AnswerCallback {
            query_id: callback_query_id.to_string(),
            text: text.to_string(),
            show_alert,
        });
        Ok(())
    }

    async fn edit_message_text(
        &self,
        chat_id: i64,
        message_id: i64,
        text: &str,
    ) -> Result<(), TelegramError> {
        self.record(BotCall::Edit {
            chat_id,
            message_id,
            text: text.to_string(),
        });
        Ok(())
    }

    async fn set_webhook(&self, url: &str, secret_token: Option<&str>) -> Result<bool, TelegramError> {
        self.record(BotCall::SetWebhook {
            url: url.to_string(),
            secret: secret_token.map(str::to_string),
        });
        Ok(true)
    }

    async fn delete_webhook(&self) -> Result<bool, TelegramError> {
        self.record(BotCall::DeleteWebhook);
        Ok(true)
    }

    async fn get_webhook_info(&self) -> Result<serde_json::Value, TelegramError> {
        Ok(serde_json::json!({ "url": "", "pending_update_count": 0 }))
    }
}
