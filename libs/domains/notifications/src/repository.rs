use async_trait::async_trait;
use uuid::Uuid;

use crate::error::NotificationResult;
use crate::models::{Notification, PageRequest};

/// Notification storage.
///
/// The consumer only needs `init` and `insert`; the query service uses the rest.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait NotificationRepository: Send + Sync {
    /// Create the schema if missing. Must complete before consumption starts.
    async fn init(&self) -> NotificationResult<()>;

    /// Insert one record atomically
    async fn insert(&self, notification: &Notification) -> NotificationResult<()>;

    /// A user's notifications, newest first
    async fn query_by_user(
        &self,
        user_id: i64,
        page: PageRequest,
    ) -> NotificationResult<Vec<Notification>>;

    /// Mark one notification read, returning the number of rows changed
    async fn mark_read(&self, id: Uuid) -> NotificationResult<u64>;

    /// Mark every unread notification of a user read, returning the number changed
    async fn mark_all_read(&self, user_id: i64) -> NotificationResult<u64>;

    /// Release the storage handle
    async fn close(&self) -> NotificationResult<()>;
}
