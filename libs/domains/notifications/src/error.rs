//! Error types for the notifications domain.

use core_config::ConfigError;
use stream_worker::StreamError;
use thiserror::Error;
use uuid::Uuid;

/// Result type for notification operations.
pub type NotificationResult<T> = Result<T, NotificationError>;

/// Errors that can occur in the notifications domain.
#[derive(Debug, Error)]
pub enum NotificationError {
    /// No notification with this id.
    #[error("Notification not found: {0}")]
    NotFound(Uuid),

    /// Storage error.
    #[error("Database error: {0}")]
    DatabaseError(String),

    /// Broker error at startup or shutdown.
    #[error("Stream error: {0}")]
    Stream(#[from] StreamError),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    ConfigError(#[from] ConfigError),

    /// Lifecycle operation called in the wrong state.
    #[error("Invalid lifecycle state: {0}")]
    InvalidState(String),

    /// Internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<sea_orm::DbErr> for NotificationError {
    fn from(err: sea_orm::DbErr) -> Self {
        NotificationError::DatabaseError(err.to_string())
    }
}
