//! Tasks Domain
//!
//! Task CRUD plus publication of `task_created` / `task_updated` /
//! `task_deleted` events to the `task-events` stream.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────┐
//! │   Service   │  ← Validation, mutation, then publish
//! └──┬───────┬──┘
//!    │       │
//! ┌──▼───┐ ┌─▼─────────┐
//! │ Repo │ │ Publisher │  ← EventPublisher over a MessageSink
//! └──────┘ └─┬─────────┘
//!            │
//!      ┌─────▼─────┐
//!      │   Codec   │  ← Envelope ⇄ (routing key, JSON)
//!      └───────────┘
//! ```
//!
//! # Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use core_config::{BrokerConfig, FromEnv};
//! use domain_tasks::{InMemoryTaskRepository, TaskEventPublisher, TaskService};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let broker = BrokerConfig::from_env()?;
//! let publisher = Arc::new(TaskEventPublisher::from_config(&broker)?);
//! let service = TaskService::new(InMemoryTaskRepository::new(), publisher);
//! # Ok(())
//! # }
//! ```

pub mod codec;
pub mod error;
pub mod events;
pub mod memory;
pub mod models;
pub mod publisher;
pub mod repository;
pub mod service;
pub mod streams;

// Re-export commonly used types
pub use codec::{DecodeError, EncodedEvent, decode, encode};
pub use error::{TaskError, TaskResult};
pub use events::{TaskEventEnvelope, TaskEventType, TaskSnapshot};
pub use memory::InMemoryTaskRepository;
pub use models::{CreateTask, Task, UpdateTask};
pub use publisher::{EventPublisher, PublishResult, TaskEventPublisher};
pub use repository::TaskRepository;
pub use service::TaskService;
pub use streams::TaskEventStream;
