//! Best-effort publication of task events.

use crate::codec;
use crate::events::{TaskEventEnvelope, TaskEventType, TaskSnapshot};
use crate::streams::TaskEventStream;
use async_trait::async_trait;
use core_config::BrokerConfig;
use std::sync::Arc;
use std::time::Duration;
use stream_worker::{MessageSink, StreamError, StreamMetrics, StreamProducer};
use tracing::{debug, instrument, warn};

/// Outcome of one publish attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublishResult {
    /// The broker accepted the entry
    Published { stream_id: String },
    /// Connect, encode, timeout or broker rejection
    Failed { reason: String },
}

impl PublishResult {
    pub fn is_published(&self) -> bool {
        matches!(self, PublishResult::Published { .. })
    }
}

/// Emits task events. Never returns an error: failures are reported in the result.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish(&self, event_type: TaskEventType, task: TaskSnapshot) -> PublishResult;

    /// Release the broker connection. Idempotent.
    async fn disconnect(&self);
}

/// Publisher over any `MessageSink` (Redis in production, memory in tests).
pub struct TaskEventPublisher<S: MessageSink> {
    sink: Arc<S>,
    connect_timeout: Duration,
    send_timeout: Duration,
    metrics: StreamMetrics,
}

impl<S: MessageSink> TaskEventPublisher<S> {
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

    pub fn new(sink: S) -> Self {
        Self::from_arc(Arc::new(sink))
    }

    pub fn from_arc(sink: Arc<S>) -> Self {
        let metrics = StreamMetrics::new(sink.stream_name().to_string(), "task_events");
        Self {
            sink,
            connect_timeout: Self::DEFAULT_TIMEOUT,
            send_timeout: Self::DEFAULT_TIMEOUT,
            metrics,
        }
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn with_send_timeout(mut self, timeout: Duration) -> Self {
        self.send_timeout = timeout;
        self
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn connect_timeout(&self) -> Duration {
        self.connect_timeout
    }

    pub fn send_timeout(&self) -> Duration {
        self.send_timeout
    }

    async fn try_publish(&self, envelope: &TaskEventEnvelope) -> Result<String, String> {
        let encoded = codec::encode(envelope).map_err(|e| format!("encode failed: {e}"))?;

        tokio::time::timeout(self.connect_timeout, self.sink.connect())
            .await
            .map_err(|_| format!("connect timed out after {}ms", self.connect_timeout.as_millis()))?
            .map_err(|e| format!("connect failed: {e}"))?;

        tokio::time::timeout(self.send_timeout, self.sink.send(&encoded.key, &encoded.payload))
            .await
            .map_err(|_| format!("send timed out after {}ms", self.send_timeout.as_millis()))?
            .map_err(|e| format!("send failed: {e}"))
    }
}

impl TaskEventPublisher<StreamProducer> {
    /// Redis publisher for the `task-events` stream, bounded by the broker's
    /// connect and send timeouts. Does not connect.
    pub fn from_config(config: &BrokerConfig) -> Result<Self, StreamError> {
        let producer = StreamProducer::from_stream_def::<TaskEventStream>(&config.url)?
            .with_connect_timeout(config.connect_timeout)
            .with_response_timeout(config.send_timeout);

        Ok(Self::new(producer)
            .with_connect_timeout(config.connect_timeout)
            .with_send_timeout(config.send_timeout))
    }
}

#[async_trait]
impl<S: MessageSink + 'static> EventPublisher for TaskEventPublisher<S> {
    #[instrument(skip(self, task), fields(event_type = %event_type, task_id = task.id))]
    async fn publish(&self, event_type: TaskEventType, task: TaskSnapshot) -> PublishResult {
        let envelope = TaskEventEnvelope::new(event_type, task);

        match self.try_publish(&envelope).await {
            Ok(stream_id) => {
                self.metrics.published(true);
                debug!(stream_id = %stream_id, "Task event published");
                PublishResult::Published { stream_id }
            }
            Err(reason) => {
                self.metrics.published(false);
                warn!(reason = %reason, "Task event not published");
                PublishResult::Failed { reason }
            }
        }
    }

    async fn disconnect(&self) {
        if let Err(e) = self.sink.disconnect().await {
            warn!(error = %e, "Error while disconnecting publisher");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::future::join_all;
    use stream_worker::MemoryBroker;

    fn snapshot(id: i64) -> TaskSnapshot {
        TaskSnapshot::new(id, format!("task {id}")).with_user_id(3)
    }

    #[tokio::test]
    async fn test_publish_appends_keyed_envelope() {
        let broker = MemoryBroker::new("task-events");
        let publisher = TaskEventPublisher::new(broker.sink());

        let result = publisher.publish(TaskEventType::Created, snapshot(7)).await;
        assert!(result.is_published());

        let entries = broker.entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].key(), Some("task_created"));

        let envelope = codec::decode(entries[0].key(), entries[0].value()).unwrap();
        assert_eq!(envelope.task.id, 7);
        assert_eq!(envelope.task.user_id, Some(3));
    }

    #[tokio::test]
    async fn test_publish_returns_stream_id() {
        let broker = MemoryBroker::new("task-events");
        let publisher = TaskEventPublisher::new(broker.sink());

        match publisher.publish(TaskEventType::Updated, snapshot(1)).await {
            PublishResult::Published { stream_id } => {
                assert_eq!(stream_id, broker.entries()[0].stream_id)
            }
            other => panic!("expected Published, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_broker_rejection_is_reported_not_raised() {
        let broker = MemoryBroker::new("task-events");
        broker.fail_next_sends(1);
        let publisher = TaskEventPublisher::new(broker.sink());

        let result = publisher.publish(TaskEventType::Deleted, snapshot(1)).await;
        assert!(matches!(result, PublishResult::Failed { ref reason } if reason.contains("send failed")));
        assert!(broker.is_empty());

        // The next publish goes through
        assert!(publisher.publish(TaskEventType::Deleted, snapshot(1)).await.is_published());
    }

    #[tokio::test]
    async fn test_slow_broker_times_out() {
        let broker = MemoryBroker::new("task-events");
        broker.set_send_delay(Some(Duration::from_secs(60)));
        let publisher =
            TaskEventPublisher::new(broker.sink()).with_send_timeout(Duration::from_millis(20));

        let result = publisher.publish(TaskEventType::Created, snapshot(1)).await;
        assert!(matches!(result, PublishResult::Failed { ref reason } if reason.contains("timed out")));
    }

    #[tokio::test]
    async fn test_concurrent_publishes_share_one_sink() {
        let broker = MemoryBroker::new("task-events");
        let publisher = Arc::new(TaskEventPublisher::new(broker.sink()));

        let results = join_all((1..=20).map(|id| {
            let publisher = publisher.clone();
            async move { publisher.publish(TaskEventType::Created, snapshot(id)).await }
        }))
        .await;

        assert!(results.iter().all(PublishResult::is_published));
        assert_eq!(broker.len(), 20);
    }

    #[tokio::test]
    async fn test_from_config_wires_broker_timeouts() {
        let mut config = BrokerConfig::new("redis://127.0.0.1:1");
        config.connect_timeout = Duration::from_millis(200);
        config.send_timeout = Duration::from_millis(300);

        let publisher = TaskEventPublisher::from_config(&config).unwrap();
        assert_eq!(publisher.connect_timeout(), Duration::from_millis(200));
        assert_eq!(publisher.send_timeout(), Duration::from_millis(300));
        assert_eq!(publisher.sink().stream_name(), "task-events");
        assert_eq!(publisher.sink().connect_timeout(), Duration::from_millis(200));
        assert_eq!(publisher.sink().response_timeout(), Duration::from_millis(300));
        assert!(!publisher.sink().is_connected().await);

        // Nothing listens on port 1: reported, not raised
        let result = publisher.publish(TaskEventType::Created, snapshot(1)).await;
        assert!(matches!(result, PublishResult::Failed { ref reason } if reason.contains("connect")));
    }

    #[test]
    fn test_from_config_rejects_invalid_url() {
        let result = TaskEventPublisher::from_config(&BrokerConfig::new("not a url"));
        assert!(matches!(result, Err(StreamError::Redis(_))));
    }

    #[tokio::test]
    async fn test_disconnect_is_idempotent_and_publish_reconnects() {
        let broker = MemoryBroker::new("task-events");
        let sink = Arc::new(broker.sink());
        let publisher = TaskEventPublisher::from_arc(sink.clone());

        publisher.publish(TaskEventType::Created, snapshot(1)).await;
        assert!(sink.is_connected());

        publisher.disconnect().await;
        publisher.disconnect().await;
        assert!(!sink.is_connected());

        assert!(publisher.publish(TaskEventType::Updated, snapshot(1)).await.is_published());
        assert!(sink.is_connected());
    }
}
