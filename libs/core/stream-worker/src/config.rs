//! Worker configuration
//!
//! This module provides `WorkerConfig` for configuring the stream worker.

use crate::registry::StreamDef;
use std::time::Duration;

/// Configuration for the stream worker
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Stream name
    pub stream_name: String,

    /// Consumer group name
    pub consumer_group: String,

    /// Consumer name inside the group.
    ///
    /// Keep it stable across restarts: the pending list is per consumer, so a
    /// new name cannot see what the previous process left unacknowledged.
    pub consumer_id: String,

    /// Maximum number of entries fetched per read
    pub batch_size: usize,

    /// Blocking read timeout in milliseconds
    pub block_timeout_ms: u64,

    /// Re-read this consumer's unacknowledged entries before reading new ones
    pub recover_pending: bool,
}

impl WorkerConfig {
    pub const DEFAULT_CONSUMER_ID: &'static str = "worker";

    /// Create a new WorkerConfig from a StreamDef
    pub fn from_stream_def<S: StreamDef>() -> Self {
        Self::new(S::STREAM_NAME, S::CONSUMER_GROUP)
    }

    /// Create a new WorkerConfig with explicit values
    pub fn new(stream_name: impl Into<String>, consumer_group: impl Into<String>) -> Self {
        Self {
            stream_name: stream_name.into(),
            consumer_group: consumer_group.into(),
            consumer_id: Self::DEFAULT_CONSUMER_ID.to_string(),
            batch_size: 10,
            block_timeout_ms: 1000,
            recover_pending: true,
        }
    }

    /// Set the consumer ID
    pub fn with_consumer_id(mut self, id: impl Into<String>) -> Self {
        self.consumer_id = id.into();
        self
    }

    /// Set the batch size (at least 1)
    pub fn with_batch_size(mut self, size: usize) -> Self {
        self.batch_size = size.max(1);
        self
    }

    /// Set the blocking read timeout
    pub fn with_block_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.block_timeout_ms = timeout_ms;
        self
    }

    /// Enable or disable pending-list recovery on start
    pub fn with_recover_pending(mut self, enable: bool) -> Self {
        self.recover_pending = enable;
        self
    }

    pub fn block_timeout(&self) -> Duration {
        Duration::from_millis(self.block_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct TestStream;

    impl StreamDef for TestStream {
        const STREAM_NAME: &'static str = "test-events";
        const CONSUMER_GROUP: &'static str = "test-group";
    }

    #[test]
    fn test_from_stream_def() {
        let config = WorkerConfig::from_stream_def::<TestStream>();

        assert_eq!(config.stream_name, "test-events");
        assert_eq!(config.consumer_group, "test-group");
        assert_eq!(config.consumer_id, WorkerConfig::DEFAULT_CONSUMER_ID);
        assert!(config.recover_pending);
    }

    #[test]
    fn test_builder_pattern() {
        let config = WorkerConfig::new("my-stream", "my-group")
            .with_consumer_id("worker-1")
            .with_batch_size(0)
            .with_block_timeout_ms(250)
            .with_recover_pending(false);

        assert_eq!(config.stream_name, "my-stream");
        assert_eq!(config.consumer_id, "worker-1");
        assert_eq!(config.batch_size, 1);
        assert_eq!(config.block_timeout(), Duration::from_millis(250));
        assert!(!config.recover_pending);
    }
}
