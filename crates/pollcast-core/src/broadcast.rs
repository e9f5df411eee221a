//! Sequential fan-out of a message chain to subscribed chats.

use crate::callback_data;
use crate::error::CoreError;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use pollcast_db::DbPool;
use pollcast_models::broadcast::{ButtonAction, ButtonDraft, ChainMessage, MediaPayload, PollDraft, SendOutcome};
use pollcast_models::poll::{DeliveryMode, LogicalPoll, PollDelivery};
use pollcast_telegram::types::{InlineKeyboardButton, InlineKeyboardMarkup, InputFile, MediaKind};
use pollcast_telegram::{BotApi, TelegramError};
use serde::Serialize;
use std::collections::HashSet;
use std::time::Duration;

const DEFAULT_BUTTONS_PROMPT: &str = "Choose an option:";
const MAX_CHAIN_LEN: usize = 20;
const MAX_BUTTONS: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pacing {
    /// Pause after each successful message within a chat.
    pub message_delay: Duration,
    /// Pause between two chats.
    pub chat_delay: Duration,
}

impl Default for Pacing {
    fn default() -> Self {
        Self {
            message_delay: Duration::from_millis(1000),
            chat_delay: Duration::from_millis(2000),
        }
    }
}

/// A chain message that passed validation and is ready to send.
#[derive(Debug, Clone)]
pub enum PreparedMessage {
    Text(String),
    Media {
        kind: MediaKind,
        file: InputFile,
        caption: Option<String>,
    },
    Poll {
        poll: LogicalPoll,
        delivery: DeliveryMode,
    },
    Buttons {
        text: String,
        keyboard: InlineKeyboardMarkup,
    },
}

impl PreparedMessage {
    pub fn logical_poll_id(&self) -> Option<&str> {
        match self {
            PreparedMessage::Poll { poll, .. } => Some(&poll.id),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct BroadcastReport {
    pub chats: usize,
    pub sent: usize,
    pub failed: usize,
    pub deactivated: Vec<i64>,
    pub poll_ids: Vec<String>,
    pub outcomes: Vec<SendOutcome>,
}

enum Pending {
    Ready(PreparedMessage),
    Poll {
        question: String,
        options: Vec<String>,
        is_anonymous: bool,
        allows_multiple_answers: bool,
        delivery: DeliveryMode,
    },
}

/// Validates every message, then creates the logical polls the chain needs.
///
/// Nothing is persisted unless the whole chain is valid.
pub async fn prepare_chain(
    pool: &DbPool,
    messages: Vec<ChainMessage>,
    default_delivery: DeliveryMode,
) -> Result<Vec<PreparedMessage>, CoreError> {
    if messages.is_empty() {
        return Err(CoreError::validation("Message chain is empty"));
    }
    if messages.len() > MAX_CHAIN_LEN {
        return Err(CoreError::validation(format!(
            "Message chain supports at most {MAX_CHAIN_LEN} messages"
        )));
    }

    let pending = messages
        .into_iter()
        .enumerate()
        .map(|(index, message)| {
            check_message(message, default_delivery)
                .map_err(|e| CoreError::validation(format!("Message {}: {e}", index + 1)))
        })
        .collect::<Result<Vec<_>, _>>()?;

    let mut prepared = Vec::with_capacity(pending.len());
    for item in pending {
        prepared.push(match item {
            Pending::Ready(message) => message,
            Pending::Poll {
                question,
                options,
                is_anonymous,
                allows_multiple_answers,
                delivery,
            } => {
                let poll = crate::polls::create_poll(
                    pool,
                    &question,
                    &options,
                    is_anonymous,
                    allows_multiple_answers,
                )
                .await?;
                PreparedMessage::Poll { poll, delivery }
            }
        });
    }
    Ok(prepared)
}

/// Validates a message that creates no poll, for one-off test sends.
pub fn prepare_single(message: ChainMessage) -> Result<PreparedMessage, CoreError> {
    match check_message(message, DeliveryMode::default())? {
        Pending::Ready(message) => Ok(message),
        Pending::Poll { .. } => Err(CoreError::validation(
            "Polls cannot be sent as a test message",
        )),
    }
}

fn check_message(message: ChainMessage, default_delivery: DeliveryMode) -> Result<Pending, CoreError> {
    Ok(match message {
        ChainMessage::Text { content } => {
            let content = content.trim();
            if content.is_empty() {
                return Err(CoreError::validation("Text message is empty"));
            }
            Pending::Ready(PreparedMessage::Text(content.to_string()))
        }
        ChainMessage::Image { media, caption } => media_message(MediaKind::Photo, media, caption)?,
        ChainMessage::Video { media, caption } => media_message(MediaKind::Video, media, caption)?,
        ChainMessage::File { media, caption } => media_message(MediaKind::Document, media, caption)?,
        ChainMessage::Poll { poll } => check_poll(poll, default_delivery)?,
        ChainMessage::Buttons { content, buttons } => {
            let text = match content.trim() {
                "" => DEFAULT_BUTTONS_PROMPT.to_string(),
                trimmed => trimmed.to_string(),
            };
            let keyboard = build_keyboard(&text, &buttons)?;
            Pending::Ready(PreparedMessage::Buttons { text, keyboard })
        }
    })
}

fn check_poll(draft: PollDraft, default_delivery: DeliveryMode) -> Result<Pending, CoreError> {
    let (question, options) = crate::polls::validate_draft(&draft.question, &draft.options)?;
    Ok(Pending::Poll {
        question,
        options,
        is_anonymous: draft.is_anonymous,
        allows_multiple_answers: draft.allows_multiple_answers,
        delivery: draft.delivery.unwrap_or(default_delivery),
    })
}

fn media_message(kind: MediaKind, media: MediaPayload, caption: Option<String>) -> Result<Pending, CoreError> {
    let encoded = match media.data.split_once(";base64,") {
        Some((prefix, body)) if prefix.starts_with("data:") => body,
        _ => media.data.as_str(),
    };
    let bytes = STANDARD
        .decode(encoded.trim())
        .map_err(|_| CoreError::validation("Media is not valid base64"))?;
    if bytes.is_empty() {
        return Err(CoreError::validation("Media is empty"));
    }
    let file_name = media
        .name
        .filter(|n| !n.trim().is_empty())
        .unwrap_or_else(|| default_file_name(kind).to_string());
    Ok(Pending::Ready(PreparedMessage::Media {
        kind,
        file: InputFile {
            bytes,
            file_name,
            mime_type: media.mime_type.filter(|m| !m.is_empty()),
        },
        caption: caption.filter(|c| !c.trim().is_empty()),
    }))
}

fn default_file_name(kind: MediaKind) -> &'static str {
    match kind {
        MediaKind::Photo => "image.jpg",
        MediaKind::Video => "video.mp4",
        MediaKind::Document => "file.bin",
    }
}

fn build_keyboard(question: &str, buttons: &[ButtonDraft]) -> Result<InlineKeyboardMarkup, CoreError> {
    if buttons.is_empty() {
        return Err(CoreError::validation("Buttons message needs at least one button"));
    }
    if buttons.len() > MAX_BUTTONS {
        return Err(CoreError::validation(format!(
            "Buttons message supports at most {MAX_BUTTONS} buttons"
        )));
    }

    let mut row = Vec::with_capacity(buttons.len());
    for button in buttons {
        let text = button.text.trim();
        if text.is_empty() {
            return Err(CoreError::validation("Button text is empty"));
        }
        let value = button.value.trim();
        row.push(match button.action {
            ButtonAction::Url => {
                if !(value.starts_with("https://") || value.starts_with("http://") || value.starts_with("tg://")) {
                    return Err(CoreError::validation(format!("Button `{text}` needs a valid url")));
                }
                InlineKeyboardButton::link(text, value)
            }
            ButtonAction::Callback => {
                InlineKeyboardButton::callback(text, callback_data::encode_button(question, text))
            }
            ButtonAction::Value => {
                callback_data::validate_raw(value)?;
                InlineKeyboardButton::callback(text, value)
            }
        });
    }
    Ok(InlineKeyboardMarkup::row(row))
}

/// Sends one prepared message to one chat, recording poll deliveries.
pub async fn deliver<B: BotApi>(
    pool: &DbPool,
    bot: &B,
    chat_id: i64,
    message_index: usize,
    message: &PreparedMessage,
) -> (SendOutcome, Option<TelegramError>) {
    let result = match message {
        PreparedMessage::Text(text) => bot.send_message(chat_id, text, None).await,
        PreparedMessage::Media {
            kind,
            file,
            caption,
        } => bot.send_media(chat_id, *kind, file, caption.as_deref()).await,
        PreparedMessage::Buttons { text, keyboard } => {
            bot.send_message(chat_id, text, Some(keyboard)).await
        }
        PreparedMessage::Poll { poll, delivery } => {
            return deliver_poll(pool, bot, chat_id, message_index, poll, *delivery).await;
        }
    };

    match result {
        Ok(sent) => (
            SendOutcome {
                chat_id,
                message_index,
                success: true,
                message_id: Some(sent.message_id),
                logical_poll_id: None,
                error: None,
            },
            None,
        ),
        Err(e) => (failed(chat_id, message_index, None, &e), Some(e)),
    }
}

async fn deliver_poll<B: BotApi>(
    pool: &DbPool,
    bot: &B,
    chat_id: i64,
    message_index: usize,
    poll: &LogicalPoll,
    mode: DeliveryMode,
) -> (SendOutcome, Option<TelegramError>) {
    let sent = match mode {
        DeliveryMode::Buttons => {
            let keyboard = match poll_keyboard(poll) {
                Ok(keyboard) => keyboard,
                Err(e) => {
                    return (failed(chat_id, message_index, Some(poll.id.as_str()), &e), None);
                }
            };
            bot.send_message(chat_id, &poll.question, Some(&keyboard))
                .await
                .map(|sent| (button_delivery(poll, chat_id, sent.message_id), sent))
        }
        DeliveryMode::Native => bot
            .send_poll(
                chat_id,
                &poll.question,
                &poll.options,
                poll.is_anonymous,
                poll.allows_multiple_answers,
            )
            .await
            .and_then(|sent| {
                let external = sent
                    .poll_id
                    .clone()
                    .ok_or_else(|| TelegramError::Decode("sendPoll returned no poll".into()))?;
                Ok((
                    PollDelivery {
                        logical_poll_id: poll.id.clone(),
                        external_poll_id: external,
                        chat_id,
                        message_id: sent.message_id,
                    },
                    sent,
                ))
            }),
    };

    let (delivery, sent) = match sent {
        Ok(pair) => pair,
        Err(e) => return (failed(chat_id, message_index, Some(poll.id.as_str()), &e), Some(e)),
    };
    if let Err(e) = crate::delivery::record_delivery(pool, &delivery).await {
        tracing::error!(
            poll_id = %poll.id,
            chat_id,
            external_poll_id = %delivery.external_poll_id,
            error = %e,
            "poll sent but delivery not recorded"
        );
    }
    (
        SendOutcome {
            chat_id,
            message_index,
            success: true,
            message_id: Some(sent.message_id),
            logical_poll_id: Some(poll.id.clone()),
            error: None,
        },
        None,
    )
}

fn button_delivery(poll: &LogicalPoll, chat_id: i64, message_id: i64) -> PollDelivery {
    PollDelivery {
        logical_poll_id: poll.id.clone(),
        external_poll_id: crate::delivery::button_external_id(&poll.id, chat_id),
        chat_id,
        message_id,
    }
}

fn poll_keyboard(poll: &LogicalPoll) -> Result<InlineKeyboardMarkup, CoreError> {
    let buttons = poll
        .options
        .iter()
        .enumerate()
        .map(|(index, option)| {
            callback_data::encode_poll(&poll.id, index)
                .map(|data| InlineKeyboardButton::callback(option.as_str(), data))
        })
        .collect::<Result<Vec<_>, _>>()?;
    Ok(InlineKeyboardMarkup::column(buttons))
}

fn failed(
    chat_id: i64,
    message_index: usize,
    logical_poll_id: Option<&str>,
    error: &dyn std::fmt::Display,
) -> SendOutcome {
    SendOutcome {
        chat_id,
        message_index,
        success: false,
        message_id: None,
        logical_poll_id: logical_poll_id.map(str::to_string),
        error: Some(error.to_string()),
    }
}

/// Checks caller-supplied target chats: ids must be non-zero, repeats are
/// dropped and the first-seen order is kept.
pub fn normalize_targets(chat_ids: Vec<i64>) -> Result<Vec<i64>, CoreError> {
    let mut targets = Vec::with_capacity(chat_ids.len());
    for chat_id in chat_ids {
        if chat_id == 0 {
            return Err(CoreError::validation("chat_ids must be non-zero"));
        }
        if !targets.contains(&chat_id) {
            targets.push(chat_id);
        }
    }
    Ok(targets)
}

/// Sends `messages` to every chat in order, one chat at a time.
///
/// A chat whose send fails with an unrecoverable error is deactivated and
/// receives none of the remaining messages. A chat listed twice is sent to
/// once.
pub async fn send_chain<B: BotApi>(
    pool: &DbPool,
    bot: &B,
    chat_ids: &[i64],
    messages: &[PreparedMessage],
    pacing: Pacing,
) -> BroadcastReport {
    let mut report = BroadcastReport {
        poll_ids: messages
            .iter()
            .filter_map(PreparedMessage::logical_poll_id)
            .map(str::to_string)
            .collect(),
        ..Default::default()
    };

    let mut seen = HashSet::with_capacity(chat_ids.len());
    let targets: Vec<i64> = chat_ids.iter().copied().filter(|id| seen.insert(*id)).collect();
    report.chats = targets.len();

    for (chat_pos, &chat_id) in targets.iter().enumerate() {
        if chat_pos > 0 {
            tokio::time::sleep(pacing.chat_delay).await;
        }
        for (index, message) in messages.iter().enumerate() {
            let (outcome, error) = deliver(pool, bot, chat_id, index, message).await;
            let succeeded = outcome.success;
            report.outcomes.push(outcome);
            if succeeded {
                report.sent += 1;
                if index + 1 < messages.len() || chat_pos + 1 < targets.len() {
                    tokio::time::sleep(pacing.message_delay).await;
                }
                continue;
            }

            report.failed += 1;
            match error {
                Some(e) if e.is_unrecoverable() => {
                    tracing::warn!(chat_id, error = %e, "chat unreachable, deactivating");
                    match crate::subscribers::deactivate(pool, chat_id).await {
                        Ok(_) => report.deactivated.push(chat_id),
                        Err(e) => tracing::error!(chat_id, error = %e, "failed to deactivate subscriber"),
                    }
                    break;
                }
                Some(e) => tracing::warn!(chat_id, message_index = index, error = %e, "send failed"),
                None => tracing::warn!(chat_id, message_index = index, "send skipped"),
            }
        }
    }

    tracing::info!(
        chats = report.chats,
        sent = report.sent,
        failed = report.failed,
        deactivated = report.deactivated.len(),
        "broadcast finished"
    );
    report
}
