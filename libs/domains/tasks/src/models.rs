use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use validator::Validate;

/// Task entity
///
/// Fields the service does not know about are kept in `extra` and travel
/// with the task into published events.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    /// Unique identifier, assigned by the repository
    pub id: i64,
    /// Task title
    pub title: String,
    /// Task description
    #[serde(default)]
    pub description: String,
    /// Whether the task is completed
    #[serde(default)]
    pub completed: bool,
    /// Owner; `None` for tasks created without one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<i64>,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
    /// Last update timestamp
    pub updated_at: DateTime<Utc>,
    /// Caller-supplied fields outside the known set
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// DTO for creating a new task
#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateTask {
    #[validate(length(min = 1, max = 255))]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub user_id: Option<i64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// DTO for updating an existing task; absent fields are left untouched
#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateTask {
    #[validate(length(min = 1, max = 255))]
    pub title: Option<String>,
    pub description: Option<String>,
    pub completed: Option<bool>,
    pub user_id: Option<i64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Field names owned by the service; callers cannot set them through `extra`
const MANAGED_FIELDS: [&str; 7] = [
    "id",
    "title",
    "description",
    "completed",
    "userId",
    "createdAt",
    "updatedAt",
];

fn strip_managed(mut extra: Map<String, Value>) -> Map<String, Value> {
    for field in MANAGED_FIELDS {
        extra.remove(field);
    }
    extra
}

impl Task {
    /// Build a task from a create request
    pub fn new(id: i64, input: CreateTask) -> Self {
        let now = Utc::now();
        Self {
            id,
            title: input.title,
            description: input.description,
            completed: false,
            user_id: input.user_id,
            created_at: now,
            updated_at: now,
            extra: strip_managed(input.extra),
        }
    }

    /// Merge an update into the task and refresh `updated_at`
    pub fn apply_update(&mut self, update: UpdateTask) {
        if let Some(title) = update.title {
            self.title = title;
        }
        if let Some(description) = update.description {
            self.description = description;
        }
        if let Some(completed) = update.completed {
            self.completed = completed;
        }
        if let Some(user_id) = update.user_id {
            self.user_id = Some(user_id);
        }
        self.extra.extend(strip_managed(update.extra));
        self.updated_at = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_task_serializes_camel_case_with_extra_fields() {
        let mut input = CreateTask {
            title: "Buy milk".into(),
            user_id: Some(3),
            ..Default::default()
        };
        input.extra.insert("priority".into(), json!("high"));

        let task = Task::new(7, input);
        let value = serde_json::to_value(&task).unwrap();

        assert_eq!(value["id"], 7);
        assert_eq!(value["userId"], 3);
        assert_eq!(value["priority"], "high");
        assert!(value.get("createdAt").is_some());
        assert!(value.get("extra").is_none());
    }

    #[test]
    fn test_create_task_collects_unknown_fields() {
        let input: CreateTask =
            serde_json::from_value(json!({"title": "x", "userId": 4, "tags": ["a"]})).unwrap();
        assert_eq!(input.user_id, Some(4));
        assert_eq!(input.extra["tags"], json!(["a"]));
    }

    #[test]
    fn test_managed_fields_cannot_be_overridden() {
        let input: CreateTask =
            serde_json::from_value(json!({"title": "x", "id": 99, "createdAt": "never"})).unwrap();
        let task = Task::new(1, input);
        assert!(task.extra.is_empty());

        let value = serde_json::to_value(&task).unwrap();
        assert_eq!(value["id"], 1);
    }

    #[test]
    fn test_create_task_validation() {
        let input = CreateTask::default();
        assert!(input.validate().is_err());

        let input = CreateTask {
            title: "ok".into(),
            ..Default::default()
        };
        assert!(input.validate().is_ok());
    }

    #[test]
    fn test_apply_update_merges() {
        let mut task = Task::new(
            1,
            CreateTask {
                title: "old".into(),
                description: "keep".into(),
                ..Default::default()
            },
        );
        let created = task.updated_at;

        let mut update = UpdateTask {
            title: Some("new".into()),
            completed: Some(true),
            ..Default::default()
        };
        update.extra.insert("label".into(), json!("urgent"));
        task.apply_update(update);

        assert_eq!(task.title, "new");
        assert_eq!(task.description, "keep");
        assert!(task.completed);
        assert_eq!(task.extra["label"], "urgent");
        assert!(task.updated_at >= created);
    }
}
