use std::sync::Arc;
use tracing::{info, instrument, warn};
use validator::Validate;

use crate::error::{TaskError, TaskResult};
use crate::events::{TaskEventType, TaskSnapshot};
use crate::models::{CreateTask, Task, UpdateTask};
use crate::publisher::{EventPublisher, PublishResult};
use crate::repository::TaskRepository;

/// Service layer for Task business logic
///
/// Every mutation publishes a task event after the change is applied. The
/// publish outcome is logged; it never turns a successful mutation into an error.
pub struct TaskService<R: TaskRepository, P: EventPublisher> {
    repository: Arc<R>,
    publisher: Arc<P>,
}

impl<R: TaskRepository, P: EventPublisher> Clone for TaskService<R, P> {
    fn clone(&self) -> Self {
        Self {
            repository: self.repository.clone(),
            publisher: self.publisher.clone(),
        }
    }
}

impl<R: TaskRepository, P: EventPublisher> TaskService<R, P> {
    pub fn new(repository: R, publisher: Arc<P>) -> Self {
        Self {
            repository: Arc::new(repository),
            publisher,
        }
    }

    async fn announce(&self, event_type: TaskEventType, task: &Task) -> PublishResult {
        let result = self
            .publisher
            .publish(event_type.clone(), TaskSnapshot::from(task))
            .await;

        match &result {
            PublishResult::Published { stream_id } => {
                info!(event_type = %event_type, task_id = task.id, stream_id = %stream_id, "Task event published");
            }
            PublishResult::Failed { reason } => {
                warn!(event_type = %event_type, task_id = task.id, reason = %reason, "Task event lost");
            }
        }
        result
    }

    /// Create a new task with validation
    #[instrument(skip(self, input), fields(task_title = %input.title))]
    pub async fn create_task(&self, input: CreateTask) -> TaskResult<Task> {
        input.validate()?;

        let task = self.repository.create(input).await?;
        self.announce(TaskEventType::Created, &task).await;
        Ok(task)
    }

    /// Get a task by ID
    #[instrument(skip(self), fields(task_id = %id))]
    pub async fn get_task(&self, id: i64) -> TaskResult<Task> {
        self.repository
            .get_by_id(id)
            .await?
            .ok_or(TaskError::NotFound(id))
    }

    /// List all tasks
    pub async fn list_tasks(&self) -> TaskResult<Vec<Task>> {
        self.repository.list().await
    }

    /// Update a task
    #[instrument(skip(self, input), fields(task_id = %id))]
    pub async fn update_task(&self, id: i64, input: UpdateTask) -> TaskResult<Task> {
        input.validate()?;

        let task = self
            .repository
            .update(id, input)
            .await?
            .ok_or(TaskError::NotFound(id))?;
        self.announce(TaskEventType::Updated, &task).await;
        Ok(task)
    }

    /// Delete a task, returning its last state
    #[instrument(skip(self), fields(task_id = %id))]
    pub async fn delete_task(&self, id: i64) -> TaskResult<Task> {
        let task = self
            .repository
            .delete(id)
            .await?
            .ok_or(TaskError::NotFound(id))?;
        self.announce(TaskEventType::Deleted, &task).await;
        Ok(task)
    }

    /// Count all tasks
    pub async fn count_tasks(&self) -> TaskResult<usize> {
        self.repository.count().await
    }

    /// Release the publisher's broker connection
    pub async fn shutdown(&self) {
        self.publisher.disconnect().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec;
    use crate::memory::InMemoryTaskRepository;
    use crate::publisher::{MockEventPublisher, TaskEventPublisher};
    use crate::repository::MockTaskRepository;
    use mockall::predicate::*;
    use stream_worker::MemoryBroker;
    use test_utils::TestDataBuilder;

    fn create_input(title: &str, user_id: i64) -> CreateTask {
        CreateTask {
            title: title.into(),
            user_id: Some(user_id),
            ..Default::default()
        }
    }

    fn published() -> PublishResult {
        PublishResult::Published {
            stream_id: "1-0".into(),
        }
    }

    #[tokio::test]
    async fn test_create_task_publishes_created() {
        let mut publisher = MockEventPublisher::new();
        publisher
            .expect_publish()
            .withf(|event_type, task| {
                *event_type == TaskEventType::Created && task.id == 1 && task.title == "Buy milk"
            })
            .times(1)
            .returning(|_, _| published());

        let service = TaskService::new(InMemoryTaskRepository::new(), Arc::new(publisher));
        let task = service.create_task(create_input("Buy milk", 3)).await.unwrap();

        assert_eq!(task.id, 1);
        assert_eq!(task.user_id, Some(3));
    }

    #[tokio::test]
    async fn test_create_task_validation_error_publishes_nothing() {
        let mut publisher = MockEventPublisher::new();
        publisher.expect_publish().times(0);

        let service = TaskService::new(InMemoryTaskRepository::new(), Arc::new(publisher));
        let result = service.create_task(CreateTask::default()).await;

        assert!(matches!(result, Err(TaskError::Validation(_))));
    }

    #[tokio::test]
    async fn test_failed_publish_does_not_fail_mutation() {
        let mut publisher = MockEventPublisher::new();
        publisher.expect_publish().returning(|_, _| PublishResult::Failed {
            reason: "broker down".into(),
        });

        let service = TaskService::new(InMemoryTaskRepository::new(), Arc::new(publisher));
        let task = service.create_task(create_input("x", 1)).await.unwrap();

        assert_eq!(service.get_task(task.id).await.unwrap().title, "x");
    }

    #[tokio::test]
    async fn test_update_task_publishes_merged_state() {
        let mut publisher = MockEventPublisher::new();
        publisher
            .expect_publish()
            .with(eq(TaskEventType::Created), always())
            .returning(|_, _| published());
        publisher
            .expect_publish()
            .withf(|event_type, task| {
                *event_type == TaskEventType::Updated
                    && task.title == "new"
                    && task.attributes["description"] == "kept"
            })
            .times(1)
            .returning(|_, _| published());

        let service = TaskService::new(InMemoryTaskRepository::new(), Arc::new(publisher));
        let task = service
            .create_task(CreateTask {
                title: "old".into(),
                description: "kept".into(),
                ..Default::default()
            })
            .await
            .unwrap();

        let updated = service
            .update_task(
                task.id,
                UpdateTask {
                    title: Some("new".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.description, "kept");
    }

    #[tokio::test]
    async fn test_missing_task_is_not_found_and_not_published() {
        let mut publisher = MockEventPublisher::new();
        publisher.expect_publish().times(0);

        let service = TaskService::new(InMemoryTaskRepository::new(), Arc::new(publisher));

        assert!(matches!(service.get_task(42).await, Err(TaskError::NotFound(42))));
        assert!(matches!(
            service.update_task(42, UpdateTask::default()).await,
            Err(TaskError::NotFound(42))
        ));
        assert!(matches!(service.delete_task(42).await, Err(TaskError::NotFound(42))));
    }

    #[tokio::test]
    async fn test_repository_error_propagates() {
        let mut repository = MockTaskRepository::new();
        repository
            .expect_create()
            .returning(|_| Err(TaskError::Internal("disk full".into())));
        let mut publisher = MockEventPublisher::new();
        publisher.expect_publish().times(0);

        let service = TaskService::new(repository, Arc::new(publisher));
        let result = service.create_task(create_input("x", 1)).await;

        assert!(matches!(result, Err(TaskError::Internal(_))));
    }

    #[tokio::test]
    async fn test_shutdown_disconnects_publisher() {
        let mut publisher = MockEventPublisher::new();
        publisher.expect_disconnect().times(1).returning(|| ());

        let service = TaskService::new(InMemoryTaskRepository::new(), Arc::new(publisher));
        service.shutdown().await;
    }

    #[tokio::test]
    async fn test_lifecycle_events_reach_the_stream_in_order() {
        let builder = TestDataBuilder::from_test_name("test_lifecycle_events_reach_the_stream_in_order");
        let broker = MemoryBroker::new("task-events");
        let publisher = Arc::new(TaskEventPublisher::new(broker.sink()));
        let service = TaskService::new(InMemoryTaskRepository::new(), publisher);

        let task = service
            .create_task(create_input(&builder.title("main"), builder.user_id()))
            .await
            .unwrap();
        service
            .update_task(
                task.id,
                UpdateTask {
                    completed: Some(true),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        service.delete_task(task.id).await.unwrap();

        let kinds: Vec<_> = broker
            .entries()
            .iter()
            .map(|m| codec::decode(m.key(), m.value()).unwrap())
            .map(|envelope| (envelope.event_type, envelope.task.id))
            .collect();

        assert_eq!(
            kinds,
            vec![
                (TaskEventType::Created, task.id),
                (TaskEventType::Updated, task.id),
                (TaskEventType::Deleted, task.id),
            ]
        );
    }
}
