//! Stream consumer for Redis operations
//!
//! Reads entries through a consumer group with XREADGROUP and acknowledges
//! them with XACK.

use crate::config::WorkerConfig;
use crate::error::StreamError;
use crate::message::StreamMessage;
use crate::source::MessageSource;
use async_trait::async_trait;
use redis::aio::{ConnectionManager, ConnectionManagerConfig};
use redis::{RedisResult, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

/// Slack on top of BLOCK before a read reply counts as lost
const RESPONSE_MARGIN: Duration = Duration::from_secs(5);

/// Redis Streams consumer bound to one group and consumer name.
pub struct StreamConsumer {
    client: redis::Client,
    connection: Arc<RwLock<Option<ConnectionManager>>>,
    config: WorkerConfig,
    connect_timeout: Duration,
}

impl StreamConsumer {
    /// Create a new StreamConsumer. Does not connect.
    pub fn new(redis_url: &str, config: WorkerConfig) -> Result<Self, StreamError> {
        Ok(Self {
            client: redis::Client::open(redis_url)?,
            connection: Arc::new(RwLock::new(None)),
            config,
            connect_timeout: Duration::from_secs(5),
        })
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Get the consumer ID
    pub fn consumer_id(&self) -> &str {
        &self.config.consumer_id
    }

    /// Time allowed for any reply on this connection.
    ///
    /// A blocking XREADGROUP legitimately stays silent for the whole BLOCK
    /// interval, and Redis assigns entries to the consumer even when the client
    /// has already given up on the reply.
    pub fn response_timeout(&self) -> Duration {
        self.config.block_timeout() + RESPONSE_MARGIN
    }

    async fn connection(&self) -> Result<ConnectionManager, StreamError> {
        if let Some(conn) = self.connection.read().await.as_ref() {
            return Ok(conn.clone());
        }

        let mut guard = self.connection.write().await;
        if let Some(conn) = guard.as_ref() {
            return Ok(conn.clone());
        }

        let manager_config = ConnectionManagerConfig::new()
            .set_connection_timeout(Some(self.connect_timeout))
            .set_response_timeout(Some(self.response_timeout()));
        let manager = tokio::time::timeout(
            self.connect_timeout,
            ConnectionManager::new_with_config(self.client.clone(), manager_config),
        )
        .await
        .map_err(|_| StreamError::Timeout {
            operation: "connect",
            millis: self.connect_timeout.as_millis() as u64,
        })??;

        *guard = Some(manager.clone());
        Ok(manager)
    }

    fn map_read_error(&self, e: redis::RedisError) -> StreamError {
        if e.to_string().contains("NOGROUP") {
            StreamError::NoGroup {
                stream: self.config.stream_name.clone(),
                group: self.config.consumer_group.clone(),
            }
        } else {
            StreamError::Redis(e)
        }
    }

    async fn read_group(
        &self,
        count: usize,
        block: Option<Duration>,
        start: &str,
    ) -> Result<Value, StreamError> {
        let mut conn = self.connection().await?;

        let mut cmd = redis::cmd("XREADGROUP");
        cmd.arg("GROUP")
            .arg(&self.config.consumer_group)
            .arg(&self.config.consumer_id);
        if let Some(block) = block {
            cmd.arg("BLOCK").arg(block.as_millis() as u64);
        }
        cmd.arg("COUNT")
            .arg(count)
            .arg("STREAMS")
            .arg(&self.config.stream_name)
            .arg(start);

        cmd.query_async(&mut conn)
            .await
            .map_err(|e| self.map_read_error(e))
    }

    async fn ack_many(&self, stream_ids: &[&str]) -> Result<(), StreamError> {
        let mut conn = self.connection().await?;

        let mut cmd = redis::cmd("XACK");
        cmd.arg(&self.config.stream_name)
            .arg(&self.config.consumer_group);
        for stream_id in stream_ids {
            cmd.arg(*stream_id);
        }
        let _: i64 = cmd.query_async(&mut conn).await?;
        Ok(())
    }

    /// Flatten an XREADGROUP reply into messages in stream order.
    ///
    /// The reply is walked as raw values so that one entry with binary fields
    /// cannot fail the rest of the batch. Handles both the RESP2 array and the
    /// RESP3 map shape; `Nil` (BLOCK expired) yields nothing.
    fn parse_stream_response(reply: Value, redelivered: bool) -> Vec<StreamMessage> {
        let entries: Vec<Value> = match reply {
            Value::Array(streams) => streams
                .into_iter()
                .flat_map(|stream| into_items(stream).into_iter().nth(1).map(into_items))
                .flatten()
                .collect(),
            Value::Map(streams) => streams
                .into_iter()
                .flat_map(|(_name, entries)| into_items(entries))
                .collect(),
            _ => Vec::new(),
        };

        entries
            .into_iter()
            .filter_map(|entry| {
                let mut parts = into_items(entry).into_iter();
                let stream_id = String::from_utf8(into_bytes(parts.next()?)).ok()?;
                let fields = parts.next().map(into_pairs).unwrap_or_default();
                let msg = StreamMessage::from_bytes(stream_id, fields);
                Some(if redelivered { msg.redelivered() } else { msg })
            })
            .collect()
    }
}

fn into_items(value: Value) -> Vec<Value> {
    match value {
        Value::Array(items) | Value::Set(items) => items,
        _ => Vec::new(),
    }
}

fn into_bytes(value: Value) -> Vec<u8> {
    match value {
        Value::BulkString(bytes) => bytes,
        Value::SimpleString(text) => text.into_bytes(),
        Value::VerbatimString { text, .. } => text.into_bytes(),
        Value::Int(n) => n.to_string().into_bytes(),
        _ => Vec::new(),
    }
}

/// Entry fields: a flat `[name, value, ...]` array, or a map under RESP3
fn into_pairs(value: Value) -> Vec<(Vec<u8>, Vec<u8>)> {
    match value {
        Value::Map(pairs) => pairs
            .into_iter()
            .map(|(name, value)| (into_bytes(name), into_bytes(value)))
            .collect(),
        other => {
            let mut items = into_items(other).into_iter();
            let mut pairs = Vec::new();
            while let (Some(name), Some(value)) = (items.next(), items.next()) {
                pairs.push((into_bytes(name), into_bytes(value)));
            }
            pairs
        }
    }
}

#[async_trait]
impl MessageSource for StreamConsumer {
    async fn subscribe(&self) -> Result<(), StreamError> {
        let mut conn = self.connection().await?;

        // Create the group at 0 so a first subscription backfills retained history
        let result: RedisResult<()> = redis::cmd("XGROUP")
            .arg("CREATE")
            .arg(&self.config.stream_name)
            .arg(&self.config.consumer_group)
            .arg("0")
            .arg("MKSTREAM")
            .query_async(&mut conn)
            .await;

        match result {
            Ok(()) => {
                info!(
                    stream = %self.config.stream_name,
                    group = %self.config.consumer_group,
                    "Created consumer group"
                );
            }
            Err(e) if e.to_string().contains("BUSYGROUP") => {
                debug!(
                    stream = %self.config.stream_name,
                    group = %self.config.consumer_group,
                    "Consumer group already exists"
                );
            }
            Err(e) => return Err(StreamError::Redis(e)),
        }

        Ok(())
    }

    async fn read_pending(&self, count: usize) -> Result<Vec<StreamMessage>, StreamError> {
        loop {
            // ID 0 returns this consumer's pending entries
            let reply = self.read_group(count, None, "0").await?;
            let (live, trimmed): (Vec<_>, Vec<_>) = Self::parse_stream_response(reply, true)
                .into_iter()
                .partition(|m| !m.fields.is_empty());

            if trimmed.is_empty() {
                return Ok(live);
            }

            // Entries trimmed from the stream come back with no fields and
            // can never be handled; acknowledge them so they leave the list
            let ids: Vec<&str> = trimmed.iter().map(|m| m.stream_id.as_str()).collect();
            warn!(
                count = ids.len(),
                "Acknowledging pending entries trimmed from the stream"
            );
            self.ack_many(&ids).await?;

            if !live.is_empty() {
                return Ok(live);
            }
        }
    }

    async fn read_new(
        &self,
        count: usize,
        block: Duration,
    ) -> Result<Vec<StreamMessage>, StreamError> {
        let reply = self.read_group(count, Some(block), ">").await?;
        Ok(Self::parse_stream_response(reply, false))
    }

    async fn ack(&self, stream_id: &str) -> Result<(), StreamError> {
        self.ack_many(&[stream_id]).await?;
        debug!(stream_id = %stream_id, "Acknowledged message");
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), StreamError> {
        if self.connection.write().await.take().is_some() {
            info!(
                stream = %self.config.stream_name,
                consumer_id = %self.config.consumer_id,
                "Consumer disconnected"
            );
        }
        Ok(())
    }

    fn stream_name(&self) -> &str {
        &self.config.stream_name
    }

    fn consumer_group(&self) -> &str {
        &self.config.consumer_group
    }
}
