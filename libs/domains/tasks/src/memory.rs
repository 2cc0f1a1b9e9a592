//! In-memory task store.

use async_trait::async_trait;
use std::sync::atomic::{AtomicI64, Ordering};
use tokio::sync::RwLock;

use crate::error::TaskResult;
use crate::models::{CreateTask, Task, UpdateTask};
use crate::repository::TaskRepository;

/// List-backed repository.
///
/// Ids come from a counter that never goes backwards, so a deleted task's id
/// is never handed out again.
#[derive(Default)]
pub struct InMemoryTaskRepository {
    tasks: RwLock<Vec<Task>>,
    last_id: AtomicI64,
}

impl InMemoryTaskRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TaskRepository for InMemoryTaskRepository {
    async fn create(&self, input: CreateTask) -> TaskResult<Task> {
        let id = self.last_id.fetch_add(1, Ordering::SeqCst) + 1;
        let task = Task::new(id, input);
        self.tasks.write().await.push(task.clone());
        Ok(task)
    }

    async fn get_by_id(&self, id: i64) -> TaskResult<Option<Task>> {
        Ok(self.tasks.read().await.iter().find(|t| t.id == id).cloned())
    }

    async fn list(&self) -> TaskResult<Vec<Task>> {
        Ok(self.tasks.read().await.clone())
    }

    async fn update(&self, id: i64, input: UpdateTask) -> TaskResult<Option<Task>> {
        let mut tasks = self.tasks.write().await;
        Ok(tasks.iter_mut().find(|t| t.id == id).map(|task| {
            task.apply_update(input);
            task.clone()
        }))
    }

    async fn delete(&self, id: i64) -> TaskResult<Option<Task>> {
        let mut tasks = self.tasks.write().await;
        let position = tasks.iter().position(|t| t.id == id);
        Ok(position.map(|idx| tasks.remove(idx)))
    }

    async fn count(&self) -> TaskResult<usize> {
        Ok(self.tasks.read().await.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input(title: &str) -> CreateTask {
        CreateTask {
            title: title.into(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_create_assigns_increasing_ids() {
        let repo = InMemoryTaskRepository::new();
        let a = repo.create(input("a")).await.unwrap();
        let b = repo.create(input("b")).await.unwrap();
        assert_eq!((a.id, b.id), (1, 2));
        assert_eq!(repo.count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_ids_not_reused_after_delete() {
        let repo = InMemoryTaskRepository::new();
        repo.create(input("a")).await.unwrap();
        let b = repo.create(input("b")).await.unwrap();
        repo.delete(b.id).await.unwrap();

        let c = repo.create(input("c")).await.unwrap();
        assert_eq!(c.id, 3);
    }

    #[tokio::test]
    async fn test_update_and_delete_missing() {
        let repo = InMemoryTaskRepository::new();
        assert!(repo.update(9, UpdateTask::default()).await.unwrap().is_none());
        assert!(repo.delete(9).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_delete_returns_removed_task() {
        let repo = InMemoryTaskRepository::new();
        let task = repo.create(input("a")).await.unwrap();

        let removed = repo.delete(task.id).await.unwrap().unwrap();
        assert_eq!(removed.title, "a");
        assert!(repo.get_by_id(task.id).await.unwrap().is_none());
        assert!(repo.list().await.unwrap().is_empty());
    }
}
