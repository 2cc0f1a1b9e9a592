//! In-process stream with consumer-group semantics.
//!
//! Used by tests and local runs without Redis. Models the parts of Redis
//! Streams the worker relies on: append-only entries, groups created at the
//! beginning of the stream, a per-group pending list and acknowledgement.

use crate::error::StreamError;
use crate::message::StreamMessage;
use crate::registry::MessageKey;
use crate::source::{MessageSink, MessageSource};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::Notify;

#[derive(Debug, Clone)]
struct Entry {
    id: String,
    fields: Vec<(String, String)>,
}

#[derive(Debug, Default)]
struct GroupState {
    /// Index of the next entry never delivered to the group
    cursor: usize,
    /// Indexes delivered but not acknowledged
    pending: BTreeSet<usize>,
}

#[derive(Debug, Default)]
struct State {
    entries: Vec<Entry>,
    groups: HashMap<String, GroupState>,
    seq: u64,
    failing_sends: usize,
    send_delay: Option<Duration>,
}

impl State {
    fn append(&mut self, fields: Vec<(String, String)>) -> String {
        self.seq += 1;
        let id = format!("{}-{}", Utc::now().timestamp_millis(), self.seq);
        self.entries.push(Entry {
            id: id.clone(),
            fields,
        });
        id
    }
}

/// Shared in-memory stream. Clone it to hand the same stream to several sinks and sources.
#[derive(Clone, Debug)]
pub struct MemoryBroker {
    stream_name: String,
    state: Arc<Mutex<State>>,
    notify: Arc<Notify>,
}

impl MemoryBroker {
    pub fn new(stream_name: impl Into<String>) -> Self {
        Self {
            stream_name: stream_name.into(),
            state: Arc::new(Mutex::new(State::default())),
            notify: Arc::new(Notify::new()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        // A panic while holding the lock leaves plain data behind; keep going
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Write side
    pub fn sink(&self) -> MemorySink {
        MemorySink {
            broker: self.clone(),
            connected: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Read side for `group`
    pub fn source(&self, group: impl Into<String>) -> MemorySource {
        MemorySource {
            broker: self.clone(),
            group: group.into(),
            connected: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Append an entry with arbitrary fields, bypassing any sink.
    pub fn push_raw(&self, fields: &[(&str, &str)]) -> String {
        let fields = fields
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        let id = self.lock().append(fields);
        self.notify.notify_waiters();
        id
    }

    /// Make the next `count` sends fail as if the broker refused them.
    pub fn fail_next_sends(&self, count: usize) {
        self.lock().failing_sends = count;
    }

    /// Delay every send, to exercise caller-side timeouts.
    pub fn set_send_delay(&self, delay: Option<Duration>) {
        self.lock().send_delay = delay;
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn pending_count(&self, group: &str) -> usize {
        self.lock()
            .groups
            .get(group)
            .map(|g| g.pending.len())
            .unwrap_or(0)
    }

    /// Entries not yet delivered to `group`.
    pub fn lag(&self, group: &str) -> usize {
        let state = self.lock();
        let cursor = state.groups.get(group).map(|g| g.cursor).unwrap_or(0);
        state.entries.len().saturating_sub(cursor)
    }

    /// Snapshot of every entry, in append order.
    pub fn entries(&self) -> Vec<StreamMessage> {
        self.lock()
            .entries
            .iter()
            .map(|e| StreamMessage::new(e.id.clone(), e.fields.clone()))
            .collect()
    }
}

/// Write handle on a `MemoryBroker`.
#[derive(Clone, Debug)]
pub struct MemorySink {
    broker: MemoryBroker,
    connected: Arc<AtomicBool>,
}

impl MemorySink {
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MessageSink for MemorySink {
    async fn connect(&self) -> Result<(), StreamError> {
        self.connected.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn send(&self, key: &str, value: &str) -> Result<String, StreamError> {
        self.connect().await?;

        let delay = self.broker.lock().send_delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let id = {
            let mut state = self.broker.lock();
            if state.failing_sends > 0 {
                state.failing_sends -= 1;
                return Err(StreamError::processing("broker rejected the entry"));
            }
            state.append(vec![
                (MessageKey::Key.to_string(), key.to_string()),
                (MessageKey::Value.to_string(), value.to_string()),
            ])
        };
        self.broker.notify.notify_waiters();
        Ok(id)
    }

    async fn disconnect(&self) -> Result<(), StreamError> {
        self.connected.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn stream_name(&self) -> &str {
        &self.broker.stream_name
    }
}

/// Read handle on a `MemoryBroker` for one consumer group.
#[derive(Clone, Debug)]
pub struct MemorySource {
    broker: MemoryBroker,
    group: String,
    connected: Arc<AtomicBool>,
}

impl MemorySource {
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    fn ensure_connected(&self) -> Result<(), StreamError> {
        if self.is_connected() {
            Ok(())
        } else {
            Err(StreamError::NotConnected(self.broker.stream_name.clone()))
        }
    }

    fn no_group(&self) -> StreamError {
        StreamError::NoGroup {
            stream: self.broker.stream_name.clone(),
            group: self.group.clone(),
        }
    }

    /// Move up to `count` undelivered entries into the pending list. Never awaits.
    fn take_new(&self, count: usize) -> Result<Vec<StreamMessage>, StreamError> {
        let mut state = self.broker.lock();
        let State {
            entries, groups, ..
        } = &mut *state;
        let group = groups.get_mut(&self.group).ok_or_else(|| self.no_group())?;

        let end = (group.cursor + count).min(entries.len());
        let batch = (group.cursor..end)
            .map(|idx| {
                group.pending.insert(idx);
                let entry = &entries[idx];
                StreamMessage::new(entry.id.clone(), entry.fields.clone())
            })
            .collect();
        group.cursor = end;
        Ok(batch)
    }
}

#[async_trait]
impl MessageSource for MemorySource {
    async fn subscribe(&self) -> Result<(), StreamError> {
        self.connected.store(true, Ordering::SeqCst);
        self.broker
            .lock()
            .groups
            .entry(self.group.clone())
            .or_default();
        Ok(())
    }

    async fn read_pending(&self, count: usize) -> Result<Vec<StreamMessage>, StreamError> {
        self.ensure_connected()?;
        let state = self.broker.lock();
        let group = state.groups.get(&self.group).ok_or_else(|| self.no_group())?;

        Ok(group
            .pending
            .iter()
            .take(count)
            .map(|&idx| {
                let entry = &state.entries[idx];
                StreamMessage::new(entry.id.clone(), entry.fields.clone()).redelivered()
            })
            .collect())
    }

    async fn read_new(
        &self,
        count: usize,
        block: Duration,
    ) -> Result<Vec<StreamMessage>, StreamError> {
        self.ensure_connected()?;
        let deadline = tokio::time::Instant::now() + block;

        loop {
            // Register interest before checking so an append in between is not missed
            let notified = self.broker.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            let batch = self.take_new(count)?;
            if !batch.is_empty() {
                return Ok(batch);
            }

            if tokio::time::timeout_at(deadline, notified).await.is_err() {
                return Ok(Vec::new());
            }
        }
    }

    async fn ack(&self, stream_id: &str) -> Result<(), StreamError> {
        self.ensure_connected()?;
        let mut state = self.broker.lock();
        let State {
            entries, groups, ..
        } = &mut *state;
        let group = groups.get_mut(&self.group).ok_or_else(|| self.no_group())?;

        if let Some(idx) = entries.iter().position(|e| e.id == stream_id) {
            group.pending.remove(&idx);
        }
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), StreamError> {
        self.connected.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn stream_name(&self) -> &str {
        &self.broker.stream_name
    }

    fn consumer_group(&self) -> &str {
        &self.group
    }
}
