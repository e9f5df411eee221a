use crate::callback_data::{self, CallbackData};
use crate::error::CoreError;
use pollcast_models::subscriber::SubscriberProfile;
use pollcast_telegram::types::{CallbackQuery, Message, Update, User};

/// Fallback question shown in notifications for raw button values.
const UNKNOWN_QUESTION: &str = "Question";

/// The message a callback button was attached to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt {
    pub chat_id: i64,
    pub message_id: i64,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Callback {
    pub query_id: String,
    pub from: User,
    pub prompt: Option<Prompt>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundUpdate {
    PollAnswer {
        external_poll_id: String,
        respondent: User,
        option_indices: Vec<i32>,
    },
    CallbackPoll {
        callback: Callback,
        logical_poll_id: String,
        option_index: i32,
    },
    CallbackMalformedPoll {
        callback: Callback,
    },
    CallbackButton {
        callback: Callback,
        question: String,
        label: String,
    },
    StartCommand {
        chat_id: i64,
        profile: SubscriberProfile,
    },
    OtherMessage {
        chat_id: i64,
        text: Option<String>,
    },
    Ignored {
        update_id: i64,
        reason: &'static str,
    },
}

pub fn profile_of(user: &User) -> SubscriberProfile {
    SubscriberProfile {
        username: user.username.clone(),
        first_name: user.first_name.clone(),
        last_name: user.last_name.clone(),
    }
}

pub fn decode_update(body: &[u8]) -> Result<InboundUpdate, CoreError> {
    let update: Update = serde_json::from_slice(body)
        .map_err(|e| CoreError::validation(format!("invalid update payload: {e}")))?;
    Ok(classify(update))
}

pub fn classify(update: Update) -> InboundUpdate {
    let update_id = update.update_id;
    if let Some(answer) = update.poll_answer {
        return match answer.user {
            Some(respondent) => InboundUpdate::PollAnswer {
                external_poll_id: answer.poll_id,
                respondent,
                option_indices: answer.option_ids,
            },
            None => InboundUpdate::Ignored {
                update_id,
                reason: "poll answer without user",
            },
        };
    }
    if let Some(query) = update.callback_query {
        return classify_callback(update_id, query);
    }
    if let Some(message) = update.message {
        return classify_message(message);
    }
    InboundUpdate::Ignored {
        update_id,
        reason: "unsupported update kind",
    }
}

fn classify_callback(update_id: i64, query: CallbackQuery) -> InboundUpdate {
    let Some(data) = query.data else {
        return InboundUpdate::Ignored {
            update_id,
            reason: "callback query without data",
        };
    };
    let prompt = query.message.map(|m| Prompt {
        chat_id: m.chat.id,
        message_id: m.message_id,
        text: m.text.or(m.caption).unwrap_or_default(),
    });
    let callback = Callback {
        query_id: query.id,
        from: query.from,
        prompt,
    };

    match callback_data::decode(&data) {
        CallbackData::Poll {
            logical_poll_id,
            option_index,
        } => InboundUpdate::CallbackPoll {
            callback,
            logical_poll_id,
            option_index,
        },
        CallbackData::MalformedPoll => InboundUpdate::CallbackMalformedPoll { callback },
        CallbackData::Button { question, label } => InboundUpdate::CallbackButton {
            callback,
            question,
            label,
        },
        CallbackData::Raw(value) => {
            let question = callback
                .prompt
                .as_ref()
                .map(|p| p.text.trim())
                .filter(|t| !t.is_empty())
                .unwrap_or(UNKNOWN_QUESTION)
                .to_string();
            InboundUpdate::CallbackButton {
                callback,
                question,
                label: value,
            }
        }
    }
}

fn classify_message(message: Message) -> InboundUpdate {
    let chat_id = message.chat.id;
    if message.chat.kind == "private" && message.text.as_deref().is_some_and(is_start_command) {
        let profile = message.from.as_ref().map(profile_of).unwrap_or_default();
        return InboundUpdate::StartCommand { chat_id, profile };
    }
    InboundUpdate::OtherMessage {
        chat_id,
        text: message.text,
    }
}

/// `/start`, `/start@botname` and `/start <payload>`.
fn is_start_command(text: &str) -> bool {
    let command = text.split_whitespace().next().unwrap_or_default();
    command == "/start" || command.starts_with("/start@")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode(raw: &str) -> InboundUpdate {
        decode_update(raw.as_bytes()).unwrap()
    }

    #[test]
    fn poll_answer_is_classified() {
        let update = decode(
            r#"{"update_id": 1, "poll_answer": {"poll_id": "P1", "user": {"id": 42, "is_bot": false, "first_name": "Ana"}, "option_ids": [0, 2]}}"#,
        );
        match update {
            InboundUpdate::PollAnswer {
                external_poll_id,
                respondent,
                option_indices,
            } => {
                assert_eq!(external_poll_id, "P1");
                assert_eq!(respondent.id, 42);
                assert_eq!(option_indices, vec![0, 2]);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn anonymous_poll_answer_is_ignored() {
        let update = decode(r#"{"update_id": 2, "poll_answer": {"poll_id": "P1", "option_ids": [0]}}"#);
        assert!(matches!(update, InboundUpdate::Ignored { update_id: 2, .. }));
    }

    #[test]
    fn poll_callback_carries_prompt() {
        let update = decode(
            r#"{"update_id": 3, "callback_query": {"id": "cb1", "from": {"id": 7, "is_bot": false},
                "message": {"message_id": 55, "chat": {"id": 700, "type": "private"}, "text": "Lunch?"},
                "data": "poll:abc:1"}}"#,
        );
        match update {
            InboundUpdate::CallbackPoll {
                callback,
                logical_poll_id,
                option_index,
            } => {
                assert_eq!(callback.query_id, "cb1");
                assert_eq!(logical_poll_id, "abc");
                assert_eq!(option_index, 1);
                let prompt = callback.prompt.unwrap();
                assert_eq!((prompt.chat_id, prompt.message_id), (700, 55));
                assert_eq!(prompt.text, "Lunch?");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn raw_callback_uses_prompt_as_question() {
        let update = decode(
            r#"{"update_id": 4, "callback_query": {"id": "cb2", "from": {"id": 7},
                "message": {"message_id": 1, "chat": {"id": 1, "type": "private"}, "text": "Join?"},
                "data": "yes"}}"#,
        );
        assert!(matches!(
            update,
            InboundUpdate::CallbackButton { ref question, ref label, .. } if question == "Join?" && label == "yes"
        ));
    }

    #[test]
    fn start_only_in_private_chats() {
        let private = decode(
            r#"{"update_id": 5, "message": {"message_id": 1, "chat": {"id": 9, "type": "private"},
                "from": {"id": 9, "username": "ana"}, "text": "/start ref42"}}"#,
        );
        assert!(matches!(
            private,
            InboundUpdate::StartCommand { chat_id: 9, ref profile } if profile.username.as_deref() == Some("ana")
        ));

        let group = decode(
            r#"{"update_id": 6, "message": {"message_id": 1, "chat": {"id": -5, "type": "group"}, "text": "/start"}}"#,
        );
        assert!(matches!(group, InboundUpdate::OtherMessage { chat_id: -5, .. }));
    }

    #[test]
    fn start_command_variants() {
        assert!(is_start_command("/start"));
        assert!(is_start_command("/start@pollcast_bot"));
        assert!(!is_start_command("/started"));
        assert!(!is_start_command("hello /start"));
    }

    #[test]
    fn empty_and_invalid_updates() {
        assert!(matches!(decode(r#"{"update_id": 8}"#), InboundUpdate::Ignored { .. }));
        assert!(matches!(
            decode_update(b"not json"),
            Err(CoreError::Validation(_))
        ));
    }
}
