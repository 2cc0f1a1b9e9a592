//! Data models for the notifications domain.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Paging defaults for `list_for_user`.
pub const DEFAULT_PAGE_LIMIT: u64 = 20;
pub const DEFAULT_PAGE_OFFSET: u64 = 0;

/// A persisted notification derived from one task event.
///
/// Only `is_read` ever changes after insertion, and only from `false` to `true`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    /// Generated at consumption time (UUIDv7, time-ordered).
    pub id: Uuid,
    pub user_id: i64,
    pub message: String,
    pub task_id: i64,
    pub event_type: String,
    pub created_at: DateTime<Utc>,
    pub is_read: bool,
}

impl Notification {
    /// Build an unread notification stamped with the current time.
    pub fn new(
        user_id: i64,
        message: impl Into<String>,
        task_id: i64,
        event_type: impl Into<String>,
    ) -> Self {
        Self::at(user_id, message, task_id, event_type, Utc::now())
    }

    /// Build an unread notification with an explicit creation time.
    pub fn at(
        user_id: i64,
        message: impl Into<String>,
        task_id: i64,
        event_type: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::now_v7(),
            user_id,
            message: message.into(),
            task_id,
            event_type: event_type.into(),
            created_at,
            is_read: false,
        }
    }
}

/// One page of a user's notifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRequest {
    pub limit: u64,
    pub offset: u64,
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            limit: DEFAULT_PAGE_LIMIT,
            offset: DEFAULT_PAGE_OFFSET,
        }
    }
}

impl PageRequest {
    /// Fill unset parts with the defaults.
    pub fn new(limit: Option<u64>, offset: Option<u64>) -> Self {
        Self {
            limit: limit.unwrap_or(DEFAULT_PAGE_LIMIT),
            offset: offset.unwrap_or(DEFAULT_PAGE_OFFSET),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_notification_is_unread() {
        let n = Notification::new(3, "hello", 7, "task_created");
        assert!(!n.is_read);
        assert_eq!(n.user_id, 3);
        assert_eq!(n.task_id, 7);
        assert_eq!(n.id.get_version_num(), 7);
    }

    #[test]
    fn test_ids_are_unique() {
        let a = Notification::new(1, "a", 1, "task_created");
        let b = Notification::new(1, "a", 1, "task_created");
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn test_serializes_camel_case() {
        let n = Notification::new(3, "m", 7, "task_created");
        let json = serde_json::to_value(&n).unwrap();
        assert_eq!(json["userId"], 3);
        assert_eq!(json["taskId"], 7);
        assert_eq!(json["eventType"], "task_created");
        assert_eq!(json["isRead"], false);
        assert!(json.get("createdAt").is_some());
    }

    #[test]
    fn test_page_request_defaults() {
        assert_eq!(PageRequest::default(), PageRequest { limit: 20, offset: 0 });
        assert_eq!(PageRequest::new(None, Some(20)), PageRequest { limit: 20, offset: 20 });
    }
}
