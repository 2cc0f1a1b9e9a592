//! Stream producer
//!
//! Appends keyed entries to a Redis stream. The connection is opened on first
//! use and shared by every clone of the producer.
//!
//! # Example
//!
//! ```rust,ignore
//! use stream_worker::{MessageSink, StreamProducer};
//!
//! let producer = StreamProducer::from_stream_def::<TaskEventStream>("redis://localhost:6379")?;
//! let stream_id = producer.send("task_created", &payload).await?;
//! ```

use crate::error::StreamError;
use crate::registry::{MessageKey, StreamDef};
use crate::source::MessageSink;
use async_trait::async_trait;
use redis::aio::{ConnectionManager, ConnectionManagerConfig};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, info};

/// Redis Streams producer.
///
/// `ConnectionManager` multiplexes commands over one connection, so a single
/// producer serves concurrent callers.
pub struct StreamProducer {
    client: redis::Client,
    connection: Arc<RwLock<Option<ConnectionManager>>>,
    stream_name: String,
    max_length: i64,
    connect_timeout: Duration,
    response_timeout: Duration,
}

impl StreamProducer {
    pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
    pub const DEFAULT_RESPONSE_TIMEOUT: Duration = Duration::from_secs(5);

    /// Create a producer for a specific stream. Does not connect.
    pub fn new(redis_url: &str, stream_name: impl Into<String>) -> Result<Self, StreamError> {
        let client = redis::Client::open(redis_url)?;
        Ok(Self {
            client,
            connection: Arc::new(RwLock::new(None)),
            stream_name: stream_name.into(),
            max_length: 100_000,
            connect_timeout: Self::DEFAULT_CONNECT_TIMEOUT,
            response_timeout: Self::DEFAULT_RESPONSE_TIMEOUT,
        })
    }

    /// Create a producer from a `StreamDef` implementation.
    pub fn from_stream_def<S: StreamDef>(redis_url: &str) -> Result<Self, StreamError> {
        Ok(Self::new(redis_url, S::STREAM_NAME)?.with_max_length(S::MAX_LENGTH))
    }

    /// Set the maximum stream length (MAXLEN ~).
    pub fn with_max_length(mut self, max_length: i64) -> Self {
        self.max_length = max_length;
        self
    }

    /// Bound the time spent establishing the connection.
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Bound the wait for each command reply, XADD included.
    pub fn with_response_timeout(mut self, timeout: Duration) -> Self {
        self.response_timeout = timeout;
        self
    }

    pub fn connect_timeout(&self) -> Duration {
        self.connect_timeout
    }

    pub fn response_timeout(&self) -> Duration {
        self.response_timeout
    }

    pub async fn is_connected(&self) -> bool {
        self.connection.read().await.is_some()
    }

    async fn connection(&self) -> Result<ConnectionManager, StreamError> {
        if let Some(conn) = self.connection.read().await.as_ref() {
            return Ok(conn.clone());
        }

        let mut guard = self.connection.write().await;
        // Another caller may have connected while we waited for the write lock
        if let Some(conn) = guard.as_ref() {
            return Ok(conn.clone());
        }

        let manager_config = ConnectionManagerConfig::new()
            .set_connection_timeout(Some(self.connect_timeout))
            .set_response_timeout(Some(self.response_timeout));
        let manager = tokio::time::timeout(
            self.connect_timeout,
            ConnectionManager::new_with_config(self.client.clone(), manager_config),
        )
        .await
        .map_err(|_| StreamError::Timeout {
            operation: "connect",
            millis: self.connect_timeout.as_millis() as u64,
        })??;

        info!(stream = %self.stream_name, "Producer connected");
        *guard = Some(manager.clone());
        Ok(manager)
    }

    /// Get the current stream length.
    pub async fn stream_length(&self) -> Result<i64, StreamError> {
        let mut conn = self.connection().await?;
        let len: i64 = redis::cmd("XLEN")
            .arg(&self.stream_name)
            .query_async(&mut conn)
            .await?;
        Ok(len)
    }
}

#[async_trait]
impl MessageSink for StreamProducer {
    async fn connect(&self) -> Result<(), StreamError> {
        self.connection().await.map(|_| ())
    }

    async fn send(&self, key: &str, value: &str) -> Result<String, StreamError> {
        let mut conn = self.connection().await?;

        // XADD with MAXLEN ~ for approximate trimming
        let stream_id: String = redis::cmd("XADD")
            .arg(&self.stream_name)
            .arg("MAXLEN")
            .arg("~")
            .arg(self.max_length)
            .arg("*")
            .arg(MessageKey::Key.as_ref())
            .arg(key)
            .arg(MessageKey::Value.as_ref())
            .arg(value)
            .query_async(&mut conn)
            .await?;

        debug!(
            stream = %self.stream_name,
            stream_id = %stream_id,
            key = %key,
            "Appended entry"
        );

        Ok(stream_id)
    }

    async fn disconnect(&self) -> Result<(), StreamError> {
        if self.connection.write().await.take().is_some() {
            info!(stream = %self.stream_name, "Producer disconnected");
        }
        Ok(())
    }

    fn stream_name(&self) -> &str {
        &self.stream_name
    }
}

impl Clone for StreamProducer {
    fn clone(&self) -> Self {
        Self {
            client: self.client.clone(),
            connection: self.connection.clone(),
            stream_name: self.stream_name.clone(),
            max_length: self.max_length,
            connect_timeout: self.connect_timeout,
            response_timeout: self.response_timeout,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct TestStream;
    impl StreamDef for TestStream {
        const STREAM_NAME: &'static str = "test-events";
        const CONSUMER_GROUP: &'static str = "test-group";
        const MAX_LENGTH: i64 = 500;
    }

    #[test]
    fn test_rejects_invalid_url() {
        let result = StreamProducer::new("not a url", "s");
        assert!(matches!(result, Err(StreamError::Redis(_))));
    }

    #[tokio::test]
    async fn test_from_stream_def_is_lazy() {
        let producer = StreamProducer::from_stream_def::<TestStream>("redis://127.0.0.1:1").unwrap();
        assert_eq!(producer.stream_name(), "test-events");
        assert_eq!(producer.max_length, 500);
        assert!(!producer.is_connected().await);
    }

    #[tokio::test]
    async fn test_disconnect_without_connect_is_noop() {
        let producer = StreamProducer::new("redis://127.0.0.1:1", "s").unwrap();
        producer.disconnect().await.unwrap();
        producer.disconnect().await.unwrap();
        assert!(!producer.is_connected().await);
    }

    #[tokio::test]
    async fn test_send_to_unreachable_broker_fails() {
        let producer = StreamProducer::new("redis://127.0.0.1:1", "s")
            .unwrap()
            .with_connect_timeout(Duration::from_millis(200));
        let result = producer.send("k", "v").await;
        assert!(result.is_err());
        assert!(!producer.is_connected().await);
    }

    #[test]
    fn test_timeouts_default_and_override() {
        let producer = StreamProducer::new("redis://127.0.0.1:1", "s").unwrap();
        assert_eq!(producer.connect_timeout(), StreamProducer::DEFAULT_CONNECT_TIMEOUT);
        assert_eq!(producer.response_timeout(), StreamProducer::DEFAULT_RESPONSE_TIMEOUT);

        let producer = producer
            .with_connect_timeout(Duration::from_millis(250))
            .with_response_timeout(Duration::from_millis(750));
        assert_eq!(producer.connect_timeout(), Duration::from_millis(250));
        assert_eq!(producer.clone().response_timeout(), Duration::from_millis(750));
    }

    #[tokio::test]
    async fn test_clones_share_connection_slot() {
        let producer = StreamProducer::new("redis://127.0.0.1:1", "s").unwrap();
        let clone = producer.clone();
        assert!(Arc::ptr_eq(&producer.connection, &clone.connection));
    }
}
