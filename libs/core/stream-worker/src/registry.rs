//! Stream registry types and definitions.
//!
//! - `StreamDef` trait for domain-specific stream definitions
//! - `MessageKey` enum for the field names of a stream entry

use strum::{AsRefStr, Display, EnumString};

/// Field names used in stream entries.
///
/// Every entry carries a routing `key` and a serialized `value`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[derive(Display, AsRefStr, EnumString)]
#[strum(serialize_all = "snake_case")]
pub enum MessageKey {
    /// Routing key (for domain events, the event type).
    Key,
    /// Serialized payload (JSON).
    Value,
}

/// Stream definition trait.
///
/// Each domain implements this trait to pin the stream and consumer group it
/// publishes to or consumes from, so producers and workers cannot drift apart.
///
/// # Example
///
/// ```rust,ignore
/// use stream_worker::StreamDef;
///
/// pub struct TaskEventStream;
///
/// impl StreamDef for TaskEventStream {
///     const STREAM_NAME: &'static str = "task-events";
///     const CONSUMER_GROUP: &'static str = "notification-group";
/// }
/// ```
pub trait StreamDef: Send + Sync {
    /// The stream name (e.g., "task-events").
    const STREAM_NAME: &'static str;

    /// The consumer group name for this stream.
    const CONSUMER_GROUP: &'static str;

    /// Maximum stream length before auto-trim (MAXLEN ~).
    /// Default: 100,000 entries.
    const MAX_LENGTH: i64 = 100_000;

    /// Get the stream name.
    fn stream_name() -> &'static str {
        Self::STREAM_NAME
    }

    /// Get the consumer group name.
    fn consumer_group() -> &'static str {
        Self::CONSUMER_GROUP
    }
}
