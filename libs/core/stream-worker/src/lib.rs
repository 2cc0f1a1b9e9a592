//! Stream Worker Framework
//!
//! Redis Streams plumbing for publishing domain events and consuming them
//! through a consumer group.
//!
//! ## Features
//!
//! - **Producer**: `StreamProducer` appends keyed entries with a lazily opened, shared connection
//! - **Consumer groups**: `StreamConsumer` creates the group at the start of the stream
//! - **Sequential worker**: `StreamWorker<S, H>` handles messages one at a time, in order
//! - **Crash recovery**: unacknowledged entries are re-read from the pending list on start
//! - **In-memory broker**: `MemoryBroker` for tests and local runs
//! - **Prometheus metrics**: optional exporter
//!
//! ## Example
//!
//! ```ignore
//! use stream_worker::{MessageSource, StreamConsumer, StreamDef, StreamWorker, WorkerConfig};
//!
//! let config = WorkerConfig::from_stream_def::<TaskEventStream>()
//!     .with_consumer_id("notifications-worker");
//! let consumer = Arc::new(StreamConsumer::new(&redis_url, config.clone())?);
//! consumer.subscribe().await?;
//!
//! let worker = StreamWorker::new(consumer, Arc::new(handler), config);
//! worker.run(shutdown_rx).await?;
//! ```

mod config;
mod consumer;
mod error;
pub mod memory;
mod message;
pub mod metrics;
mod producer;
mod registry;
mod source;
mod worker;

// Re-export main types
pub use config::WorkerConfig;
pub use consumer::StreamConsumer;
pub use error::StreamError;
pub use memory::{MemoryBroker, MemorySink, MemorySource};
pub use message::StreamMessage;
pub use metrics::{init_metrics, StreamMetrics};
pub use producer::StreamProducer;
pub use registry::{MessageKey, StreamDef};
pub use source::{MessageSink, MessageSource};
pub use worker::{MessageHandler, StreamWorker};
