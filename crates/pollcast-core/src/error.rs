use pollcast_db::DbError;
use pollcast_telegram::TelegramError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("not found")]
    NotFound,
    #[error("{0}")]
    Validation(String),
    #[error("poll delivery {external_poll_id} is already recorded for another message")]
    DuplicateDelivery { external_poll_id: String },
    #[error("database error: {0}")]
    Database(#[from] DbError),
    #[error("bot api error: {0}")]
    Transport(#[from] TelegramError),
}

impl CoreError {
    pub fn validation(msg: impl Into<String>) -> Self {
        CoreError::Validation(msg.into())
    }
}
