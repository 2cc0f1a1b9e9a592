//! Task change events as they travel over the stream.

use crate::models::Task;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Map, Value};
use std::fmt;

/// Kind of task change.
///
/// Published as `task_created`, `task_updated`, `task_deleted`. Parsing also
/// accepts the short forms `created`, `updated`, `deleted`; anything else is
/// kept verbatim in `Unknown`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum TaskEventType {
    Created,
    Updated,
    Deleted,
    Unknown(String),
}

impl TaskEventType {
    pub fn parse(raw: &str) -> Self {
        match raw {
            "task_created" | "created" => Self::Created,
            "task_updated" | "updated" => Self::Updated,
            "task_deleted" | "deleted" => Self::Deleted,
            other => Self::Unknown(other.to_string()),
        }
    }

    /// Wire name, also used as the routing key
    pub fn as_str(&self) -> &str {
        match self {
            Self::Created => "task_created",
            Self::Updated => "task_updated",
            Self::Deleted => "task_deleted",
            Self::Unknown(raw) => raw,
        }
    }

    pub fn is_known(&self) -> bool {
        !matches!(self, Self::Unknown(_))
    }
}

impl From<String> for TaskEventType {
    fn from(raw: String) -> Self {
        Self::parse(&raw)
    }
}

impl From<TaskEventType> for String {
    fn from(event_type: TaskEventType) -> Self {
        event_type.as_str().to_string()
    }
}

impl fmt::Display for TaskEventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Task state captured by value when the event is published.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskSnapshot {
    pub id: i64,
    #[serde(default)]
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<i64>,
    /// Every other field, carried through untouched
    #[serde(flatten)]
    pub attributes: Map<String, Value>,
}

impl TaskSnapshot {
    pub fn new(id: i64, title: impl Into<String>) -> Self {
        Self {
            id,
            title: title.into(),
            user_id: None,
            attributes: Map::new(),
        }
    }

    pub fn with_user_id(mut self, user_id: i64) -> Self {
        self.user_id = Some(user_id);
        self
    }
}

impl From<&Task> for TaskSnapshot {
    fn from(task: &Task) -> Self {
        let mut attributes = task.extra.clone();
        attributes.insert("description".into(), Value::String(task.description.clone()));
        attributes.insert("completed".into(), Value::Bool(task.completed));
        attributes.insert("createdAt".into(), Value::String(iso_millis(&task.created_at)));
        attributes.insert("updatedAt".into(), Value::String(iso_millis(&task.updated_at)));

        Self {
            id: task.id,
            title: task.title.clone(),
            user_id: task.user_id,
            attributes,
        }
    }
}

/// `{eventType, task, timestamp}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskEventEnvelope {
    pub event_type: TaskEventType,
    pub task: TaskSnapshot,
    #[serde(serialize_with = "serialize_timestamp")]
    pub timestamp: DateTime<Utc>,
}

impl TaskEventEnvelope {
    /// Stamp a new envelope with the current time
    pub fn new(event_type: TaskEventType, task: TaskSnapshot) -> Self {
        Self::with_timestamp(event_type, task, Utc::now())
    }

    pub fn with_timestamp(
        event_type: TaskEventType,
        task: TaskSnapshot,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            event_type,
            task,
            timestamp,
        }
    }
}

/// ISO-8601 in UTC with millisecond precision, e.g. `2024-05-01T10:00:00.000Z`
pub fn iso_millis(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn serialize_timestamp<S: Serializer>(ts: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&iso_millis(ts))
}

/// Parse an RFC 3339 timestamp into UTC
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|ts| ts.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::CreateTask;
    use serde_json::json;

    #[test]
    fn test_event_type_parse_accepts_both_forms() {
        assert_eq!(TaskEventType::parse("task_created"), TaskEventType::Created);
        assert_eq!(TaskEventType::parse("created"), TaskEventType::Created);
        assert_eq!(TaskEventType::parse("updated"), TaskEventType::Updated);
        assert_eq!(TaskEventType::parse("task_deleted"), TaskEventType::Deleted);
        assert_eq!(
            TaskEventType::parse("task_archived"),
            TaskEventType::Unknown("task_archived".into())
        );
    }

    #[test]
    fn test_event_type_wire_names() {
        assert_eq!(TaskEventType::Created.as_str(), "task_created");
        assert_eq!(TaskEventType::Unknown("x".into()).to_string(), "x");
        assert!(!TaskEventType::Unknown("x".into()).is_known());
        assert_eq!(serde_json::to_value(TaskEventType::Deleted).unwrap(), "task_deleted");
    }

    #[test]
    fn test_snapshot_from_task_keeps_extra_fields() {
        let mut input = CreateTask {
            title: "Buy milk".into(),
            user_id: Some(3),
            ..Default::default()
        };
        input.extra.insert("priority".into(), json!("high"));
        let task = Task::new(7, input);

        let snapshot = TaskSnapshot::from(&task);
        assert_eq!(snapshot.id, 7);
        assert_eq!(snapshot.title, "Buy milk");
        assert_eq!(snapshot.user_id, Some(3));
        assert_eq!(snapshot.attributes["priority"], "high");
        assert_eq!(snapshot.attributes["completed"], false);
    }

    #[test]
    fn test_envelope_serializes_iso_millis() {
        let ts = parse_timestamp("2024-05-01T10:00:00.123456Z").unwrap();
        let envelope =
            TaskEventEnvelope::with_timestamp(TaskEventType::Created, TaskSnapshot::new(1, "t"), ts);
        let value = serde_json::to_value(&envelope).unwrap();

        assert_eq!(value["eventType"], "task_created");
        assert_eq!(value["timestamp"], "2024-05-01T10:00:00.123Z");
        assert_eq!(value["task"]["id"], 1);
    }
}
