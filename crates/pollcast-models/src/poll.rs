use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A question and its options, independent of how it was delivered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogicalPoll {
    pub id: String,
    pub question: String,
    pub options: Vec<String>,
    pub is_anonymous: bool,
    pub allows_multiple_answers: bool,
    pub created_at: DateTime<Utc>,
}

impl LogicalPoll {
    /// Label for `index`, if it addresses one of the options.
    pub fn option_text(&self, index: i32) -> Option<&str> {
        usize::try_from(index)
            .ok()
            .and_then(|i| self.options.get(i))
            .map(String::as_str)
    }
}

/// One delivery of a logical poll to one chat.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollDelivery {
    pub logical_poll_id: String,
    pub external_poll_id: String,
    pub chat_id: i64,
    pub message_id: i64,
}

/// The latest selection of one respondent on one poll.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollResponse {
    pub id: String,
    pub logical_poll_id: String,
    pub respondent_id: i64,
    pub option_indices: Vec<i32>,
    pub option_texts: Option<Vec<String>>,
    pub responded_at: DateTime<Utc>,
}

/// A poll answer whose external poll id did not resolve to a logical poll.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnresolvedPollAnswer {
    pub external_poll_id: String,
    pub respondent_id: i64,
    pub option_indices: Vec<i32>,
    pub received_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollResults {
    pub poll: LogicalPoll,
    /// Number of distinct respondents.
    pub total_responses: u64,
    /// One entry per option index, zero-filled.
    pub option_counts: Vec<u64>,
    pub responses: Vec<PollResponse>,
}

impl PollResults {
    /// Share of respondents that picked `index`, rounded to a whole percent.
    pub fn percentage(&self, index: usize) -> u64 {
        let count = self.option_counts.get(index).copied().unwrap_or(0);
        if self.total_responses == 0 {
            return 0;
        }
        (count * 100 + self.total_responses / 2) / self.total_responses
    }
}

/// How a poll reaches each chat.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryMode {
    /// A text prompt with one inline button per option.
    #[default]
    Buttons,
    /// A native Telegram poll object.
    Native,
}
