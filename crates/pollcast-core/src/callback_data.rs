//! Encoding of inline-button callback payloads.
//!
//! Two shapes travel in `callback_data`:
//!
//! * `poll:<logical_poll_id>:<option_index>` for options of a button poll;
//! * `<question>|<label>` for generic buttons, each part cut to
//!   [`BUTTON_PART_MAX_CHARS`] characters.
//!
//! Anything else is passed through as a raw value. The Bot API caps the
//! payload at [`MAX_CALLBACK_DATA_BYTES`] bytes.

use crate::error::CoreError;

pub const MAX_CALLBACK_DATA_BYTES: usize = 64;
pub const POLL_PREFIX: &str = "poll:";
pub const BUTTON_SEPARATOR: char = '|';
pub const BUTTON_PART_MAX_CHARS: usize = 20;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallbackData {
    Poll {
        logical_poll_id: String,
        option_index: i32,
    },
    /// Carries the poll prefix but not a usable id or index.
    MalformedPoll,
    Button {
        question: String,
        label: String,
    },
    Raw(String),
}

pub fn encode_poll(logical_poll_id: &str, option_index: usize) -> Result<String, CoreError> {
    let data = format!("{POLL_PREFIX}{logical_poll_id}:{option_index}");
    if data.len() > MAX_CALLBACK_DATA_BYTES {
        return Err(CoreError::validation(
            "poll id too long for callback data",
        ));
    }
    Ok(data)
}

pub fn encode_button(question: &str, label: &str) -> String {
    let mut question: String = question
        .trim()
        .chars()
        .take(BUTTON_PART_MAX_CHARS)
        .map(|c| if c == BUTTON_SEPARATOR { '/' } else { c })
        .collect();
    // A question must never read as a poll payload.
    if question.starts_with(POLL_PREFIX) {
        question.replace_range(POLL_PREFIX.len() - 1..POLL_PREFIX.len(), "/");
    }
    let label: String = label.trim().chars().take(BUTTON_PART_MAX_CHARS).collect();
    let data = format!("{question}{BUTTON_SEPARATOR}{label}");
    truncate_bytes(&data, MAX_CALLBACK_DATA_BYTES).to_string()
}

/// Checks an operator-supplied raw callback value.
pub fn validate_raw(value: &str) -> Result<(), CoreError> {
    if value.is_empty() {
        return Err(CoreError::validation("button value is required"));
    }
    if value.len() > MAX_CALLBACK_DATA_BYTES {
        return Err(CoreError::validation(format!(
            "button value must be at most {MAX_CALLBACK_DATA_BYTES} bytes"
        )));
    }
    if value.starts_with(POLL_PREFIX) {
        return Err(CoreError::validation(format!(
            "button value must not start with `{POLL_PREFIX}`"
        )));
    }
    Ok(())
}

pub fn decode(data: &str) -> CallbackData {
    if let Some(rest) = data.strip_prefix(POLL_PREFIX) {
        return match rest.rsplit_once(':') {
            Some((id, index)) if !id.is_empty() => match index.parse::<i32>() {
                Ok(option_index) if option_index >= 0 => CallbackData::Poll {
                    logical_poll_id: id.to_string(),
                    option_index,
                },
                _ => CallbackData::MalformedPoll,
            },
            _ => CallbackData::MalformedPoll,
        };
    }
    match data.split_once(BUTTON_SEPARATOR) {
        Some((question, label)) => CallbackData::Button {
            question: question.to_string(),
            label: label.to_string(),
        },
        None => CallbackData::Raw(data.to_string()),
    }
}

fn truncate_bytes(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}
