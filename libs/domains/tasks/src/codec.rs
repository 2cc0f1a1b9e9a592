//! Wire codec for task events.
//!
//! An entry carries the event type as its routing key and the JSON envelope
//! `{eventType, task, timestamp}` as its value. Decoding treats both as
//! untrusted input and never panics.

use crate::events::{TaskEventEnvelope, TaskEventType, TaskSnapshot, parse_timestamp};
use chrono::Utc;
use serde_json::Value;
use thiserror::Error;

/// Why a raw entry could not become an envelope
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DecodeError {
    #[error("message has no payload")]
    MissingPayload,

    #[error("malformed payload: {0}")]
    Malformed(String),

    #[error("payload has no task")]
    MissingTask,

    #[error("task id is missing or null")]
    MissingTaskId,

    #[error("no event type in routing key or payload")]
    MissingEventType,
}

/// An envelope ready to append: routing key plus serialized value
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedEvent {
    pub key: String,
    pub payload: String,
}

/// Serialize an envelope. The output depends only on the envelope, so a
/// fixed timestamp gives byte-identical results.
pub fn encode(envelope: &TaskEventEnvelope) -> Result<EncodedEvent, serde_json::Error> {
    Ok(EncodedEvent {
        key: envelope.event_type.as_str().to_string(),
        payload: serde_json::to_string(envelope)?,
    })
}

/// Parse a raw entry.
///
/// A non-empty routing key is the event type; the payload's `eventType` is
/// only consulted when the key is absent. A missing or unparseable
/// `timestamp` falls back to the time of decoding.
pub fn decode(raw_key: Option<&str>, raw_value: Option<&str>) -> Result<TaskEventEnvelope, DecodeError> {
    let raw_value = raw_value
        .filter(|v| !v.trim().is_empty())
        .ok_or(DecodeError::MissingPayload)?;

    let mut body: Value =
        serde_json::from_str(raw_value).map_err(|e| DecodeError::Malformed(e.to_string()))?;
    let object = body
        .as_object_mut()
        .ok_or_else(|| DecodeError::Malformed("payload is not a JSON object".into()))?;

    let task = match object.remove("task") {
        None | Some(Value::Null) => return Err(DecodeError::MissingTask),
        Some(task @ Value::Object(_)) => task,
        Some(_) => return Err(DecodeError::Malformed("task is not an object".into())),
    };
    if task.get("id").is_none_or(Value::is_null) {
        return Err(DecodeError::MissingTaskId);
    }
    let task: TaskSnapshot =
        serde_json::from_value(task).map_err(|e| DecodeError::Malformed(e.to_string()))?;

    let event_type = raw_key
        .map(str::trim)
        .filter(|k| !k.is_empty())
        .map(str::to_string)
        .or_else(|| {
            object
                .get("eventType")
                .and_then(Value::as_str)
                .map(str::to_string)
        })
        .map(TaskEventType::from)
        .ok_or(DecodeError::MissingEventType)?;

    let timestamp = object
        .get("timestamp")
        .and_then(Value::as_str)
        .and_then(parse_timestamp)
        .unwrap_or_else(Utc::now);

    Ok(TaskEventEnvelope::with_timestamp(event_type, task, timestamp))
}
