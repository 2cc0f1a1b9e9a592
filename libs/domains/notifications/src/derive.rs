//! Notification text for a task event.

use domain_tasks::TaskEventType;

/// Human-readable message for an event about a task titled `title`.
pub fn derive_message(event_type: &TaskEventType, title: &str) -> String {
    match event_type {
        TaskEventType::Created => format!("New task created: \"{title}\""),
        TaskEventType::Updated => format!("Task updated: \"{title}\""),
        TaskEventType::Deleted => format!("Task deleted: \"{title}\""),
        TaskEventType::Unknown(raw) => format!("Task event occurred: {raw}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_event_types() {
        assert_eq!(
            derive_message(&TaskEventType::Created, "Buy milk"),
            "New task created: \"Buy milk\""
        );
        assert_eq!(
            derive_message(&TaskEventType::Updated, "Buy milk"),
            "Task updated: \"Buy milk\""
        );
        assert_eq!(
            derive_message(&TaskEventType::Deleted, "Buy milk"),
            "Task deleted: \"Buy milk\""
        );
    }

    #[test]
    fn test_short_forms_derive_the_same_text() {
        assert_eq!(
            derive_message(&TaskEventType::parse("created"), "X"),
            derive_message(&TaskEventType::parse("task_created"), "X")
        );
    }

    #[test]
    fn test_unknown_falls_through_and_ignores_title() {
        let event = TaskEventType::parse("task_archived");
        assert_eq!(derive_message(&event, "X"), "Task event occurred: task_archived");
        assert_eq!(derive_message(&event, ""), "Task event occurred: task_archived");
    }

    #[test]
    fn test_empty_title() {
        assert_eq!(
            derive_message(&TaskEventType::Created, ""),
            "New task created: \"\""
        );
    }
}
