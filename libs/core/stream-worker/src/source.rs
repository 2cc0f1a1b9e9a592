//! Transport seams between the worker/publishers and the broker.
//!
//! `StreamProducer`/`StreamConsumer` implement these over Redis;
//! `memory::MemoryBroker` implements them in-process for tests and local runs.

use crate::error::StreamError;
use crate::message::StreamMessage;
use async_trait::async_trait;
use std::time::Duration;

/// Write side of a stream.
#[async_trait]
pub trait MessageSink: Send + Sync {
    /// Establish the connection. Idempotent.
    async fn connect(&self) -> Result<(), StreamError>;

    /// Append one entry keyed by `key`. Returns the broker-assigned entry ID
    /// once the broker has accepted it.
    async fn send(&self, key: &str, value: &str) -> Result<String, StreamError>;

    /// Release the connection. Idempotent; a later `send` reconnects.
    async fn disconnect(&self) -> Result<(), StreamError>;

    fn stream_name(&self) -> &str;
}

/// Read side of a stream, bound to one consumer group and consumer.
#[async_trait]
pub trait MessageSource: Send + Sync {
    /// Connect and make sure the consumer group exists, starting at the
    /// beginning of the stream when created.
    async fn subscribe(&self) -> Result<(), StreamError>;

    /// Entries delivered to this consumer earlier but never acknowledged.
    async fn read_pending(&self, count: usize) -> Result<Vec<StreamMessage>, StreamError>;

    /// Entries never delivered to the group, waiting up to `block`.
    /// An empty batch means the wait expired.
    ///
    /// Dropping the future before it completes must not lose entries: anything
    /// the broker handed out is still in the pending list.
    async fn read_new(
        &self,
        count: usize,
        block: Duration,
    ) -> Result<Vec<StreamMessage>, StreamError>;

    /// Acknowledge one entry so it leaves the pending list.
    async fn ack(&self, stream_id: &str) -> Result<(), StreamError>;

    /// Release the connection. Idempotent.
    async fn disconnect(&self) -> Result<(), StreamError>;

    fn stream_name(&self) -> &str;

    fn consumer_group(&self) -> &str;
}
