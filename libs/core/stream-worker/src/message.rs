//! Raw stream entry as read from a consumer group.

use crate::registry::MessageKey;
use chrono::{DateTime, Utc};

/// A stream entry with its metadata.
///
/// Fields are kept as raw text; decoding is the handler's job so that a
/// malformed entry still reaches the worker and can be acknowledged.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamMessage {
    /// Stream entry ID (e.g., "1234567890123-0")
    pub stream_id: String,

    /// Field/value pairs in the order they were written
    pub fields: Vec<(String, String)>,

    /// When the entry was appended (parsed from the stream ID)
    pub timestamp: DateTime<Utc>,

    /// True when read back from the pending list rather than delivered fresh
    pub redelivered: bool,

    /// Some field was not valid UTF-8 and was converted lossily
    pub lossy: bool,
}

impl StreamMessage {
    pub fn new(stream_id: impl Into<String>, fields: Vec<(String, String)>) -> Self {
        let stream_id = stream_id.into();
        let timestamp = Self::parse_timestamp(&stream_id);
        Self {
            stream_id,
            fields,
            timestamp,
            redelivered: false,
            lossy: false,
        }
    }

    /// Build a message from binary field pairs as they come off the wire.
    ///
    /// Invalid UTF-8 does not fail the entry: the text is replaced lossily and
    /// the message is flagged so a handler can treat it as poison.
    pub fn from_bytes(stream_id: impl Into<String>, raw: Vec<(Vec<u8>, Vec<u8>)>) -> Self {
        let mut lossy = false;
        let mut text = |bytes: Vec<u8>| {
            String::from_utf8(bytes).unwrap_or_else(|e| {
                lossy = true;
                String::from_utf8_lossy(e.as_bytes()).into_owned()
            })
        };
        let fields = raw
            .into_iter()
            .map(|(name, value)| (text(name), text(value)))
            .collect();

        let mut message = Self::new(stream_id, fields);
        message.lossy = lossy;
        message
    }

    pub fn redelivered(mut self) -> Self {
        self.redelivered = true;
        self
    }

    /// Stream IDs are "timestamp_ms-sequence"
    fn parse_timestamp(stream_id: &str) -> DateTime<Utc> {
        stream_id
            .split('-')
            .next()
            .and_then(|ts| ts.parse::<i64>().ok())
            .and_then(DateTime::from_timestamp_millis)
            .unwrap_or_else(Utc::now)
    }

    /// Look up a field by name; the first occurrence wins.
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// Routing key
    pub fn key(&self) -> Option<&str> {
        self.field(MessageKey::Key.as_ref())
    }

    /// Serialized payload
    pub fn value(&self) -> Option<&str> {
        self.field(MessageKey::Value.as_ref())
    }
}
