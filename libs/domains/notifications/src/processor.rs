//! Task event handler for the notifications stream worker.
//!
//! Turns one `task-events` entry into one persisted `Notification`.

use crate::config::OwnerPolicy;
use crate::derive::derive_message;
use crate::models::Notification;
use crate::repository::NotificationRepository;
use async_trait::async_trait;
use domain_tasks::codec;
use std::sync::Arc;
use stream_worker::{MessageHandler, StreamError, StreamMessage};
use tracing::info;

/// Decodes task events, derives the message text and persists a notification.
///
/// Failures map onto the worker's outcomes: undecodable payloads are poison,
/// ownerless events under `OwnerPolicy::Skip` are rejected, storage errors are
/// processing failures. None of them are retried.
pub struct NotificationProcessor<R: NotificationRepository> {
    repository: Arc<R>,
    policy: OwnerPolicy,
}

impl<R: NotificationRepository> NotificationProcessor<R> {
    pub fn new(repository: Arc<R>, policy: OwnerPolicy) -> Self {
        Self { repository, policy }
    }

    /// Build the record for a message without persisting it.
    pub fn build(&self, message: &StreamMessage) -> Result<Notification, StreamError> {
        if message.lossy {
            return Err(StreamError::decode("entry is not valid UTF-8"));
        }
        let envelope = codec::decode(message.key(), message.value())
            .map_err(|e| StreamError::decode(e.to_string()))?;

        let user_id = self.policy.resolve(envelope.task.user_id).ok_or_else(|| {
            StreamError::rejected(format!(
                "task {} has no userId and no default user is configured",
                envelope.task.id
            ))
        })?;

        // Stored as it arrived on the wire; the body is the fallback
        let event_type = message
            .key()
            .map(str::trim)
            .filter(|key| !key.is_empty())
            .map_or_else(|| envelope.event_type.to_string(), str::to_string);

        Ok(Notification::new(
            user_id,
            derive_message(&envelope.event_type, &envelope.task.title),
            envelope.task.id,
            event_type,
        ))
    }
}

#[async_trait]
impl<R: NotificationRepository + 'static> MessageHandler for NotificationProcessor<R> {
    async fn handle(&self, message: &StreamMessage) -> Result<(), StreamError> {
        let notification = self.build(message)?;

        self.repository
            .insert(&notification)
            .await
            .map_err(|e| StreamError::processing(e.to_string()))?;

        info!(
            stream_id = %message.stream_id,
            notification_id = %notification.id,
            event_type = %notification.event_type,
            task_id = notification.task_id,
            user_id = notification.user_id,
            "Notification stored"
        );
        Ok(())
    }

    fn name(&self) -> &'static str {
        "NotificationProcessor"
    }
}

impl<R: NotificationRepository> Clone for NotificationProcessor<R> {
    fn clone(&self) -> Self {
        Self {
            repository: Arc::clone(&self.repository),
            policy: self.policy,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::NotificationError;
    use crate::repository::MockNotificationRepository;

    fn message(key: &str, value: &str) -> StreamMessage {
        StreamMessage::new(
            "1-0",
            vec![
                ("key".to_string(), key.to_string()),
                ("value".to_string(), value.to_string()),
            ],
        )
    }

    fn created_buy_milk() -> StreamMessage {
        message(
            "task_created",
            r#"{"eventType":"task_created","task":{"id":7,"title":"Buy milk","userId":3},"timestamp":"2024-05-01T10:00:00.000Z"}"#,
        )
    }

    #[tokio::test]
    async fn test_created_event_persists_unread_notification() {
        let mut repo = MockNotificationRepository::new();
        repo.expect_insert()
            .withf(|n| {
                n.message == "New task created: \"Buy milk\""
                    && n.task_id == 7
                    && n.user_id == 3
                    && n.event_type == "task_created"
                    && !n.is_read
            })
            .times(1)
            .returning(|_| Ok(()));

        let processor = NotificationProcessor::new(Arc::new(repo), OwnerPolicy::default());
        processor.handle(&created_buy_milk()).await.unwrap();
    }

    #[tokio::test]
    async fn test_unknown_event_uses_default_branch_and_default_user() {
        let processor = NotificationProcessor::new(
            Arc::new(MockNotificationRepository::new()),
            OwnerPolicy::default(),
        );
        let notification = processor
            .build(&message(
                "task_archived",
                r#"{"eventType":"task_archived","task":{"id":9,"title":"X"},"timestamp":"2024-05-01T10:00:00.000Z"}"#,
            ))
            .unwrap();

        assert_eq!(notification.message, "Task event occurred: task_archived");
        assert_eq!(notification.user_id, 1);
        assert_eq!(notification.task_id, 9);
    }

    #[tokio::test]
    async fn test_event_type_is_stored_as_received() {
        let processor = NotificationProcessor::new(
            Arc::new(MockNotificationRepository::new()),
            OwnerPolicy::default(),
        );
        let payload = r#"{"task":{"id":7,"title":"Buy milk","userId":3}}"#;

        let notification = processor.build(&message("created", payload)).unwrap();
        assert_eq!(notification.event_type, "created");
        assert_eq!(notification.message, "New task created: \"Buy milk\"");

        let notification = processor
            .build(&StreamMessage::new(
                "2-0",
                vec![(
                    "value".to_string(),
                    r#"{"eventType":"task_deleted","task":{"id":7,"title":"Buy milk"}}"#.to_string(),
                )],
            ))
            .unwrap();
        assert_eq!(notification.event_type, "task_deleted");
    }

    #[tokio::test]
    async fn test_non_utf8_entry_is_poison() {
        let mut repo = MockNotificationRepository::new();
        repo.expect_insert().times(0);
        let processor = NotificationProcessor::new(Arc::new(repo), OwnerPolicy::default());

        let entry = StreamMessage::from_bytes(
            "1-0",
            vec![
                (b"key".to_vec(), b"task_created".to_vec()),
                (b"value".to_vec(), b"{\"task\":{\"id\":1,\"title\":\"\xff\"}}".to_vec()),
            ],
        );
        let result = processor.handle(&entry).await;
        assert!(matches!(result, Err(StreamError::Decode(_))));
    }

    #[tokio::test]
    async fn test_created_at_is_processing_time() {
        let processor = NotificationProcessor::new(
            Arc::new(MockNotificationRepository::new()),
            OwnerPolicy::default(),
        );
        let before = chrono::Utc::now();
        let notification = processor.build(&created_buy_milk()).unwrap();

        assert!(notification.created_at >= before);
        assert!(notification.created_at <= chrono::Utc::now());
    }

    #[tokio::test]
    async fn test_malformed_payload_is_poison() {
        let mut repo = MockNotificationRepository::new();
        repo.expect_insert().times(0);

        let processor = NotificationProcessor::new(Arc::new(repo), OwnerPolicy::default());

        let result = processor.handle(&message("task_created", "{not json")).await;
        assert!(matches!(result, Err(StreamError::Decode(_))));

        let result = processor
            .handle(&message("task_created", r#"{"task":{"title":"no id"}}"#))
            .await;
        assert!(matches!(result, Err(StreamError::Decode(_))));
    }

    #[tokio::test]
    async fn test_ownerless_event_rejected_under_skip_policy() {
        let mut repo = MockNotificationRepository::new();
        repo.expect_insert().times(0);

        let processor = NotificationProcessor::new(Arc::new(repo), OwnerPolicy::Skip);
        let result = processor
            .handle(&message(
                "task_updated",
                r#"{"eventType":"task_updated","task":{"id":9,"title":"X"}}"#,
            ))
            .await;

        assert!(matches!(result, Err(StreamError::Rejected(_))));
    }

    #[tokio::test]
    async fn test_storage_failure_is_processing_error() {
        let mut repo = MockNotificationRepository::new();
        repo.expect_insert()
            .returning(|_| Err(NotificationError::DatabaseError("disk I/O error".into())));

        let processor = NotificationProcessor::new(Arc::new(repo), OwnerPolicy::default());
        let result = processor.handle(&created_buy_milk()).await;

        assert!(matches!(result, Err(StreamError::Processing(_))));
    }
}
