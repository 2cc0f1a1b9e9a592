use async_trait::async_trait;

use crate::error::TaskResult;
use crate::models::{CreateTask, Task, UpdateTask};

/// Repository trait for Task persistence
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TaskRepository: Send + Sync {
    /// Create a new task with the next id
    async fn create(&self, input: CreateTask) -> TaskResult<Task>;

    /// Get a task by ID
    async fn get_by_id(&self, id: i64) -> TaskResult<Option<Task>>;

    /// List all tasks in creation order
    async fn list(&self) -> TaskResult<Vec<Task>>;

    /// Merge an update into an existing task; `None` if it does not exist
    async fn update(&self, id: i64, input: UpdateTask) -> TaskResult<Option<Task>>;

    /// Remove a task, returning it; `None` if it does not exist
    async fn delete(&self, id: i64) -> TaskResult<Option<Task>>;

    /// Count all tasks
    async fn count(&self) -> TaskResult<usize>;
}
