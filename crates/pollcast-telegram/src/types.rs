//! Bot API wire types, limited to the fields this service reads or writes.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Deserialize)]
pub struct Update {
    pub update_id: i64,
    #[serde(default)]
    pub message: Option<Message>,
    #[serde(default)]
    pub callback_query: Option<CallbackQuery>,
    #[serde(default)]
    pub poll_answer: Option<PollAnswer>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct User {
    pub id: i64,
    #[serde(default)]
    pub is_bot: bool,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Chat {
    pub id: i64,
    #[serde(rename = "type")]
    pub kind: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Message {
    pub message_id: i64,
    pub chat: Chat,
    #[serde(default)]
    pub from: Option<User>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub caption: Option<String>,
    #[serde(default)]
    pub poll: Option<Poll>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Poll {
    pub id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CallbackQuery {
    pub id: String,
    pub from: User,
    #[serde(default)]
    pub message: Option<Message>,
    #[serde(default)]
    pub data: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PollAnswer {
    pub poll_id: String,
    #[serde(default)]
    pub user: Option<User>,
    #[serde(default)]
    pub option_ids: Vec<i32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InlineKeyboardButton {
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub callback_data: Option<String>,
}

impl InlineKeyboardButton {
    pub fn callback(text: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            url: None,
            callback_data: Some(data.into()),
        }
    }

    pub fn link(text: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            url: Some(url.into()),
            callback_data: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct InlineKeyboardMarkup {
    pub inline_keyboard: Vec<Vec<InlineKeyboardButton>>,
}

impl InlineKeyboardMarkup {
    /// One button per row.
    pub fn column(buttons: Vec<InlineKeyboardButton>) -> Self {
        Self {
            inline_keyboard: buttons.into_iter().map(|b| vec![b]).collect(),
        }
    }

    /// All buttons in a single row.
    pub fn row(buttons: Vec<InlineKeyboardButton>) -> Self {
        Self {
            inline_keyboard: vec![buttons],
        }
    }
}

/// What a successful send returns to the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentMessage {
    pub message_id: i64,
    /// Present when the message carries a native poll.
    pub poll_id: Option<String>,
}

impl From<Message> for SentMessage {
    fn from(message: Message) -> Self {
        SentMessage {
            message_id: message.message_id,
            poll_id: message.poll.map(|p| p.id),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Photo,
    Video,
    Document,
}

impl MediaKind {
    pub(crate) fn method(self) -> &'static str {
        match self {
            MediaKind::Photo => "sendPhoto",
            MediaKind::Video => "sendVideo",
            MediaKind::Document => "sendDocument",
        }
    }

    pub(crate) fn field(self) -> &'static str {
        match self {
            MediaKind::Photo => "photo",
            MediaKind::Video => "video",
            MediaKind::Document => "document",
        }
    }
}

/// An in-memory file upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputFile {
    pub bytes: Vec<u8>,
    pub file_name: String,
    pub mime_type: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_poll_answer_update() {
        let raw = r#"{"update_id": 5, "poll_answer": {"poll_id": "abc", "user": {"id": 42, "is_bot": false, "first_name": "Ana"}, "option_ids": [1]}}"#;
        let update: Update = serde_json::from_str(raw).unwrap();
        let answer = update.poll_answer.unwrap();
        assert_eq!(answer.poll_id, "abc");
        assert_eq!(answer.user.unwrap().id, 42);
        assert_eq!(answer.option_ids, vec![1]);
        assert!(update.message.is_none());
    }

    #[test]
    fn keyboard_omits_absent_fields() {
        let markup = InlineKeyboardMarkup::column(vec![
            InlineKeyboardButton::callback("Pizza", "poll:p:0"),
            InlineKeyboardButton::link("Site", "https://example.com"),
        ]);
        let value = serde_json::to_value(&markup).unwrap();
        assert_eq!(
            value,
            serde_json::json!({
                "inline_keyboard": [
                    [{"text": "Pizza", "callback_data": "poll:p:0"}],
                    [{"text": "Site", "url": "https://example.com"}]
                ]
            })
        );
    }

    #[test]
    fn sent_message_carries_native_poll_id() {
        let raw = r#"{"message_id": 7, "chat": {"id": 1, "type": "private"}, "poll": {"id": "5432"}}"#;
        let message: Message = serde_json::from_str(raw).unwrap();
        let sent = SentMessage::from(message);
        assert_eq!(sent.message_id, 7);
        assert_eq!(sent.poll_id.as_deref(), Some("5432"));
    }
}
