use serde::{Deserialize, Serialize};

use crate::poll::DeliveryMode;

/// Base64-encoded file attached to a chain message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaPayload {
    pub data: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, rename = "type")]
    pub mime_type: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollDraft {
    pub question: String,
    pub options: Vec<String>,
    #[serde(default = "default_true")]
    pub is_anonymous: bool,
    #[serde(default)]
    pub allows_multiple_answers: bool,
    /// Overrides the configured delivery mode for this poll.
    #[serde(default)]
    pub delivery: Option<DeliveryMode>,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ButtonAction {
    /// Opens `value` as a link.
    Url,
    /// Reports the press back as `question|label`.
    Callback,
    /// Sends `value` verbatim as callback data.
    Value,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ButtonDraft {
    pub text: String,
    pub action: ButtonAction,
    #[serde(default)]
    pub value: String,
}

/// One step of a broadcast chain, tagged by `type`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ChainMessage {
    Text {
        content: String,
    },
    Image {
        media: MediaPayload,
        #[serde(default)]
        caption: Option<String>,
    },
    Video {
        media: MediaPayload,
        #[serde(default)]
        caption: Option<String>,
    },
    File {
        media: MediaPayload,
        #[serde(default)]
        caption: Option<String>,
    },
    Poll {
        poll: PollDraft,
    },
    Buttons {
        #[serde(default)]
        content: String,
        buttons: Vec<ButtonDraft>,
    },
}

impl ChainMessage {
    pub fn kind(&self) -> &'static str {
        match self {
            ChainMessage::Text { .. } => "text",
            ChainMessage::Image { .. } => "image",
            ChainMessage::Video { .. } => "video",
            ChainMessage::File { .. } => "file",
            ChainMessage::Poll { .. } => "poll",
            ChainMessage::Buttons { .. } => "buttons",
        }
    }
}

/// Outcome of one send attempt during a fan-out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendOutcome {
    pub chat_id: i64,
    pub message_index: usize,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logical_poll_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_tagged_chain() {
        let raw = r#"[
            {"type": "text", "content": "hello"},
            {"type": "image", "media": {"data": "aGk=", "name": "a.png", "type": "image/png"}, "caption": "look"},
            {"type": "poll", "poll": {"question": "Lunch?", "options": ["Pizza", "Sushi"]}},
            {"type": "buttons", "content": "Pick", "buttons": [{"text": "Site", "action": "url", "value": "https://example.com"}]}
        ]"#;
        let chain: Vec<ChainMessage> = serde_json::from_str(raw).unwrap();
        assert_eq!(chain.len(), 4);
        assert_eq!(chain[1].kind(), "image");
        match &chain[2] {
            ChainMessage::Poll { poll } => {
                assert!(poll.is_anonymous);
                assert!(!poll.allows_multiple_answers);
                assert!(poll.delivery.is_none());
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn rejects_unknown_type() {
        let raw = r#"{"type": "sticker", "content": "x"}"#;
        assert!(serde_json::from_str::<ChainMessage>(raw).is_err());
    }
}
