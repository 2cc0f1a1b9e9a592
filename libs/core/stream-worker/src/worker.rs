//! Message handler trait and the sequential `StreamWorker` loop.

use crate::config::WorkerConfig;
use crate::error::StreamError;
use crate::message::StreamMessage;
use crate::metrics::{Outcome, StreamMetrics};
use crate::source::MessageSource;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

/// Trait for message handlers.
///
/// The returned error decides how the worker logs the message; every message
/// is acknowledged either way, so a handler must not rely on redelivery.
///
/// - `StreamError::Decode` marks a poison message.
/// - `StreamError::Rejected` marks a valid message that was deliberately skipped.
/// - Any other error is a processing failure.
///
/// # Example
///
/// ```rust,ignore
/// struct AuditHandler;
///
/// #[async_trait]
/// impl MessageHandler for AuditHandler {
///     async fn handle(&self, message: &StreamMessage) -> Result<(), StreamError> {
///         let key = message.key().ok_or_else(|| StreamError::decode("missing key"))?;
///         audit_log(key).await.map_err(|e| StreamError::processing(e.to_string()))
///     }
///
///     fn name(&self) -> &'static str {
///         "AuditHandler"
///     }
/// }
/// ```
#[async_trait]
pub trait MessageHandler: Send + Sync {
    async fn handle(&self, message: &StreamMessage) -> Result<(), StreamError>;

    /// Handler name for logging and metric labels.
    fn name(&self) -> &'static str;
}

/// Sequential consumer-group worker.
///
/// Messages are handled one at a time in stream order. A shutdown request is
/// honoured between messages, never in the middle of one. Messages already
/// read but not yet handled stay in the pending list and are recovered on the
/// next start when `recover_pending` is enabled.
pub struct StreamWorker<S, H>
where
    S: MessageSource,
    H: MessageHandler,
{
    source: Arc<S>,
    handler: Arc<H>,
    config: WorkerConfig,
    metrics: StreamMetrics,
}

const MAX_BACKOFF_SECS: u64 = 30;

impl<S, H> StreamWorker<S, H>
where
    S: MessageSource + 'static,
    H: MessageHandler + 'static,
{
    pub fn new(source: Arc<S>, handler: Arc<H>, config: WorkerConfig) -> Self {
        let metrics = StreamMetrics::new(config.stream_name.clone(), handler.name());
        Self {
            source,
            handler,
            config,
            metrics,
        }
    }

    pub fn source(&self) -> &Arc<S> {
        &self.source
    }

    /// Run the worker loop until `shutdown` flips to `true` (or its sender is dropped).
    ///
    /// The source must already be subscribed; a missing group discovered
    /// mid-run is recreated.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) -> Result<(), StreamError> {
        info!(
            consumer_id = %self.config.consumer_id,
            stream = %self.config.stream_name,
            group = %self.config.consumer_group,
            handler = %self.handler.name(),
            batch_size = self.config.batch_size,
            block_timeout_ms = self.config.block_timeout_ms,
            "Starting stream worker"
        );

        if self.config.recover_pending {
            self.recover_pending(&shutdown).await;
        }

        let mut consecutive_errors: u32 = 0;

        loop {
            if *shutdown.borrow() {
                info!("Received shutdown signal, stopping worker");
                break;
            }

            let read = tokio::select! {
                biased;
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        info!("Received shutdown signal, stopping worker");
                        break;
                    }
                    continue;
                }
                read = self.source.read_new(self.config.batch_size, self.config.block_timeout()) => read,
            };

            match read {
                Ok(batch) => {
                    if consecutive_errors > 0 {
                        info!(consecutive_errors, "Stream connection recovered");
                        consecutive_errors = 0;
                    }
                    if batch.is_empty() {
                        debug!("BLOCK timeout - no messages, continuing");
                        continue;
                    }
                    for message in &batch {
                        if *shutdown.borrow() {
                            debug!(
                                stream_id = %message.stream_id,
                                "Leaving message pending for the next start"
                            );
                            break;
                        }
                        self.process_message(message).await;
                    }
                }
                Err(e) => {
                    self.metrics.transport_error(e.kind());

                    if e.is_timeout() {
                        // Redis may have delivered entries whose reply never arrived
                        warn!(error = %e, "Stream read timed out");
                    } else {
                        consecutive_errors += 1;

                        if e.is_nogroup_error() {
                            warn!(error = %e, "Consumer group missing, recreating");
                            if let Err(create_err) = self.source.subscribe().await {
                                error!(error = %create_err, "Failed to recreate consumer group");
                            }
                        }

                        let backoff_secs =
                            std::cmp::min(2u64.pow(consecutive_errors.min(5)), MAX_BACKOFF_SECS);
                        if e.is_connection_error() {
                            error!(
                                error = %e,
                                consecutive_errors,
                                backoff_secs,
                                "Lost connection to stream, backing off"
                            );
                        } else {
                            warn!(
                                error = %e,
                                consecutive_errors,
                                backoff_secs,
                                "Stream read failed, backing off"
                            );
                        }

                        tokio::select! {
                            _ = shutdown.changed() => {}
                            _ = tokio::time::sleep(Duration::from_secs(backoff_secs)) => {}
                        }
                    }

                    // A failed read may still have moved entries onto our pending list
                    if self.config.recover_pending {
                        self.recover_pending(&shutdown).await;
                    }
                }
            }
        }

        info!(handler = %self.handler.name(), "Stream worker stopped");
        Ok(())
    }

    /// Handle entries this consumer read earlier but never acknowledged.
    async fn recover_pending(&self, shutdown: &watch::Receiver<bool>) {
        loop {
            if *shutdown.borrow() {
                return;
            }

            let batch = match self.source.read_pending(self.config.batch_size).await {
                Ok(batch) => batch,
                Err(e) => {
                    warn!(error = %e, "Failed to read pending messages, skipping recovery");
                    return;
                }
            };

            if batch.is_empty() {
                return;
            }

            warn!(count = batch.len(), "Recovering pending messages");

            for message in &batch {
                if *shutdown.borrow() {
                    return;
                }
                if !self.process_message(message).await {
                    // The entry would come back on the next pending read
                    warn!("Stopping pending recovery after failed acknowledgement");
                    return;
                }
            }
        }
    }

    /// Handle and acknowledge one message. Returns whether the ack succeeded.
    async fn process_message(&self, message: &StreamMessage) -> bool {
        let start = Instant::now();
        self.metrics.message_received(message.redelivered);

        let outcome = match self.handler.handle(message).await {
            Ok(()) => {
                debug!(stream_id = %message.stream_id, "Message handled");
                Outcome::Handled
            }
            Err(StreamError::Decode(reason)) => {
                warn!(
                    stream_id = %message.stream_id,
                    reason = %reason,
                    "Skipping poison message"
                );
                Outcome::Poison
            }
            Err(StreamError::Rejected(reason)) => {
                info!(
                    stream_id = %message.stream_id,
                    reason = %reason,
                    "Message skipped"
                );
                Outcome::Rejected
            }
            Err(e) => {
                error!(
                    stream_id = %message.stream_id,
                    error = %e,
                    handler = %self.handler.name(),
                    "Message handling failed, skipping"
                );
                Outcome::Failed
            }
        };

        self.metrics.message_finished(outcome, start.elapsed());

        match self.source.ack(&message.stream_id).await {
            Ok(()) => true,
            Err(e) => {
                self.metrics.transport_error("ack");
                warn!(
                    stream_id = %message.stream_id,
                    error = %e,
                    "Failed to acknowledge message"
                );
                false
            }
        }
    }
}
