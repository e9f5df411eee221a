pub mod broadcast;
pub mod callback_data;
pub mod delivery;
pub mod error;
pub mod polls;
pub mod responses;
pub mod results;
pub mod subscribers;
pub mod updates;
pub mod webhook;

#[cfg(test)]
pub(crate) mod testing;

pub use broadcast::Pacing;
pub use error::CoreError;

use pollcast_db::DbPool;
use pollcast_models::poll::DeliveryMode;
use pollcast_telegram::TelegramClient;

/// Settings resolved at startup and shared by every request.
#[derive(Clone, Debug, Default)]
pub struct AppConfig {
    /// Public URL Telegram posts updates to.
    pub webhook_url: Option<String>,
    /// Expected value of the `X-Telegram-Bot-Api-Secret-Token` header.
    pub webhook_secret: Option<String>,
    /// Bearer token for admin routes. `None` leaves them open.
    pub admin_token: Option<String>,
    pub notify_chat_id: Option<i64>,
    pub pacing: Pacing,
    pub poll_delivery: DeliveryMode,
}

/// Shared application state passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub db: DbPool,
    pub bot: TelegramClient,
    pub config: AppConfig,
}

impl AppState {
    pub fn webhook_context(&self) -> webhook::WebhookContext<'_, TelegramClient> {
        webhook::WebhookContext {
            db: &self.db,
            bot: &self.bot,
            notify_chat_id: self.config.notify_chat_id,
        }
    }
}
