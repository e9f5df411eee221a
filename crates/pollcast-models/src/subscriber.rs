use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subscriber {
    pub chat_id: i64,
    pub username: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub subscribed_at: DateTime<Utc>,
    pub is_active: bool,
}

/// Optional profile fields captured on `/start`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriberProfile {
    pub username: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

impl SubscriberProfile {
    /// `@username`, else the full name, else `Unknown`.
    pub fn display_tag(&self) -> String {
        if let Some(username) = self.username.as_deref().filter(|u| !u.is_empty()) {
            return format!("@{username}");
        }
        let full = format!(
            "{} {}",
            self.first_name.as_deref().unwrap_or("Unknown"),
            self.last_name.as_deref().unwrap_or("")
        );
        full.trim().to_string()
    }
}
