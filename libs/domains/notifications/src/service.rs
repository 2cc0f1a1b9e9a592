//! Notification query service.

use crate::error::{NotificationError, NotificationResult};
use crate::models::{Notification, PageRequest};
use crate::repository::NotificationRepository;
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;

/// Read-side access to notifications.
///
/// Shares its repository with the consumer pipeline.
pub struct NotificationService<R: NotificationRepository> {
    repository: Arc<R>,
}

impl<R: NotificationRepository> Clone for NotificationService<R> {
    fn clone(&self) -> Self {
        Self {
            repository: Arc::clone(&self.repository),
        }
    }
}

impl<R: NotificationRepository> NotificationService<R> {
    pub fn new(repository: Arc<R>) -> Self {
        Self { repository }
    }

    /// A user's notifications, newest first. Defaults to `limit = 20, offset = 0`.
    #[instrument(skip(self))]
    pub async fn list_for_user(
        &self,
        user_id: i64,
        limit: Option<u64>,
        offset: Option<u64>,
    ) -> NotificationResult<Vec<Notification>> {
        self.repository
            .query_by_user(user_id, PageRequest::new(limit, offset))
            .await
    }

    /// Mark one notification read.
    ///
    /// Returns `NotFound` when no row changed.
    #[instrument(skip(self), fields(notification_id = %id))]
    pub async fn mark_as_read(&self, id: Uuid) -> NotificationResult<()> {
        match self.repository.mark_read(id).await? {
            0 => Err(NotificationError::NotFound(id)),
            _ => {
                info!("Notification marked read");
                Ok(())
            }
        }
    }

    /// Mark all of a user's unread notifications read, returning how many changed.
    #[instrument(skip(self))]
    pub async fn mark_all_as_read(&self, user_id: i64) -> NotificationResult<u64> {
        let changed = self.repository.mark_all_read(user_id).await?;
        info!(changed, "Notifications marked read");
        Ok(changed)
    }
}
