//! Notifications Domain
//!
//! Consumes task events from the `task-events` stream and keeps one
//! notification record per processed event, queryable per user.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐
//! │  Redis Stream   │  ← task-events, group notification-group
//! └────────┬────────┘
//!          │
//! ┌────────▼────────┐
//! │  StreamWorker   │  ← Sequential, acks every entry
//! └────────┬────────┘
//!          │
//! ┌────────▼────────┐
//! │   Processor     │  ← decode → derive_message → insert
//! └────────┬────────┘
//!          │
//! ┌────────▼────────┐
//! │   Repository    │  ← SeaORM (SQLite / PostgreSQL)
//! └────────┬────────┘
//!          │
//! ┌────────▼────────┐
//! │ NotificationSvc │  ← list / mark read
//! └─────────────────┘
//! ```
//!
//! # Usage
//!
//! ```rust,ignore
//! use domain_notifications::{NotificationPipeline, OwnerPolicy, SqlNotificationRepository, StorageConfig};
//! use domain_tasks::TaskEventStream;
//! use stream_worker::{StreamConsumer, WorkerConfig};
//!
//! let repository = Arc::new(SqlNotificationRepository::connect(StorageConfig::default()).await?);
//! let config = WorkerConfig::from_stream_def::<TaskEventStream>();
//! let source = Arc::new(StreamConsumer::new("redis://localhost:6379", config.clone())?);
//!
//! NotificationPipeline::new(source, repository, config, OwnerPolicy::default())
//!     .run_until(shutdown_signal())
//!     .await?;
//! ```

pub mod config;
pub mod derive;
pub mod entity;
pub mod error;
pub mod lifecycle;
pub mod models;
pub mod processor;
pub mod repository;
pub mod service;
pub mod sql;

// Re-export commonly used types
pub use config::{OwnerPolicy, StorageConfig};
pub use derive::derive_message;
pub use error::{NotificationError, NotificationResult};
pub use lifecycle::{DEFAULT_DRAIN_TIMEOUT, LifecycleState, NotificationPipeline};
pub use models::{Notification, PageRequest};
pub use processor::NotificationProcessor;
pub use repository::NotificationRepository;
pub use service::NotificationService;
pub use sql::SqlNotificationRepository;
