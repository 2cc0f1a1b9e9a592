//! Stream error types
//!
//! Handler errors tell the worker how a message ended:
//! - **Decode**: poison message, logged and skipped
//! - **Rejected**: well-formed but deliberately not processed
//! - **Processing**: side effect failed, logged and skipped (at-most-once)
//!
//! All three are acknowledged. Transport errors never reach a handler.

use thiserror::Error;

/// Stream processing errors
#[derive(Error, Debug)]
pub enum StreamError {
    /// Redis connection or command error
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Connect or send exceeded its time bound
    #[error("Timed out after {millis}ms: {operation}")]
    Timeout { operation: &'static str, millis: u64 },

    /// Operation on a handle that was never connected or already disconnected
    #[error("Not connected: {0}")]
    NotConnected(String),

    /// Consumer group does not exist on the stream
    #[error("Consumer group '{group}' missing on stream '{stream}'")]
    NoGroup { stream: String, group: String },

    /// Message could not be decoded (poison message)
    #[error("Decode error: {0}")]
    Decode(String),

    /// Message was valid but deliberately skipped
    #[error("Rejected: {0}")]
    Rejected(String),

    /// Message handling failed
    #[error("Processing error: {0}")]
    Processing(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Shutdown requested
    #[error("Shutdown requested")]
    Shutdown,
}

impl StreamError {
    pub fn decode(message: impl Into<String>) -> Self {
        StreamError::Decode(message.into())
    }

    pub fn rejected(message: impl Into<String>) -> Self {
        StreamError::Rejected(message.into())
    }

    pub fn processing(message: impl Into<String>) -> Self {
        StreamError::Processing(message.into())
    }

    /// Broken or refused connection to Redis
    pub fn is_connection_error(&self) -> bool {
        match self {
            StreamError::Redis(e) => {
                e.is_connection_dropped() || e.is_connection_refusal() || e.is_io_error()
            }
            StreamError::NotConnected(_) => true,
            _ => false,
        }
    }

    /// The consumer group vanished (stream deleted or group destroyed)
    pub fn is_nogroup_error(&self) -> bool {
        match self {
            StreamError::NoGroup { .. } => true,
            StreamError::Redis(e) => e.to_string().contains("NOGROUP"),
            _ => false,
        }
    }

    pub fn is_timeout(&self) -> bool {
        match self {
            StreamError::Timeout { .. } => true,
            StreamError::Redis(e) => e.is_timeout(),
            _ => false,
        }
    }

    /// Short label for logs and metrics
    pub fn kind(&self) -> &'static str {
        match self {
            StreamError::Redis(_) => "redis",
            StreamError::Serialization(_) => "serialization",
            StreamError::Timeout { .. } => "timeout",
            StreamError::NotConnected(_) => "not_connected",
            StreamError::NoGroup { .. } => "no_group",
            StreamError::Decode(_) => "decode",
            StreamError::Rejected(_) => "rejected",
            StreamError::Processing(_) => "processing",
            StreamError::Config(_) => "config",
            StreamError::Shutdown => "shutdown",
        }
    }
}

impl From<serde_json::Error> for StreamError {
    fn from(err: serde_json::Error) -> Self {
        StreamError::Serialization(err.to_string())
    }
}
