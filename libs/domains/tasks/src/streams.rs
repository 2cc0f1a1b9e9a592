//! Stream definitions for the tasks domain.

use stream_worker::StreamDef;

/// Task lifecycle events stream.
///
/// The tasks service publishes here; the notifications worker consumes it
/// as `notification-group`.
pub struct TaskEventStream;

impl StreamDef for TaskEventStream {
    const STREAM_NAME: &'static str = "task-events";

    const CONSUMER_GROUP: &'static str = "notification-group";

    const MAX_LENGTH: i64 = 100_000;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_event_stream_def() {
        assert_eq!(TaskEventStream::stream_name(), "task-events");
        assert_eq!(TaskEventStream::consumer_group(), "notification-group");
    }
}
