//! Start-up and graceful shutdown of the notification pipeline.
//!
//! ```text
//! Uninitialized → Initializing → Running → Draining → Stopped
//! ```
//!
//! Storage is initialized before the consumer group is joined, and a failure
//! in either step is fatal. Shutdown stops new reads, waits for the in-flight
//! message within the drain window, then closes the broker connection and
//! finally the storage handle.

use crate::config::OwnerPolicy;
use crate::error::{NotificationError, NotificationResult};
use crate::processor::NotificationProcessor;
use crate::repository::NotificationRepository;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use stream_worker::{MessageSource, StreamError, StreamWorker, WorkerConfig};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

/// Default drain window
pub const DEFAULT_DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Uninitialized,
    Initializing,
    Running,
    Draining,
    Stopped,
}

struct RunningWorker {
    shutdown: watch::Sender<bool>,
    handle: JoinHandle<Result<(), StreamError>>,
}

/// Owns the consumer side of the pipeline: storage, broker source and worker task.
pub struct NotificationPipeline<S, R>
where
    S: MessageSource + 'static,
    R: NotificationRepository + 'static,
{
    source: Arc<S>,
    repository: Arc<R>,
    policy: OwnerPolicy,
    worker_config: WorkerConfig,
    drain_timeout: Duration,
    state: LifecycleState,
    worker: Option<RunningWorker>,
}

impl<S, R> NotificationPipeline<S, R>
where
    S: MessageSource + 'static,
    R: NotificationRepository + 'static,
{
    pub fn new(
        source: Arc<S>,
        repository: Arc<R>,
        worker_config: WorkerConfig,
        policy: OwnerPolicy,
    ) -> Self {
        Self {
            source,
            repository,
            policy,
            worker_config,
            drain_timeout: DEFAULT_DRAIN_TIMEOUT,
            state: LifecycleState::Uninitialized,
            worker: None,
        }
    }

    pub fn with_drain_timeout(mut self, drain_timeout: Duration) -> Self {
        self.drain_timeout = drain_timeout;
        self
    }

    pub fn state(&self) -> LifecycleState {
        self.state
    }

    /// Storage handle shared with the query service
    pub fn repository(&self) -> &Arc<R> {
        &self.repository
    }

    fn transition(&mut self, next: LifecycleState) {
        info!(from = ?self.state, to = ?next, "Pipeline state change");
        self.state = next;
    }

    /// Initialize storage, join the consumer group and spawn the worker.
    pub async fn start(&mut self) -> NotificationResult<()> {
        if self.state != LifecycleState::Uninitialized {
            return Err(NotificationError::InvalidState(format!(
                "cannot start from {:?}",
                self.state
            )));
        }
        self.transition(LifecycleState::Initializing);

        if let Err(e) = self.repository.init().await {
            error!(error = %e, "Notification storage failed to initialize");
            self.transition(LifecycleState::Stopped);
            return Err(e);
        }

        if let Err(e) = self.source.subscribe().await {
            error!(
                error = %e,
                stream = %self.source.stream_name(),
                group = %self.source.consumer_group(),
                "Failed to subscribe to task events"
            );
            self.release().await;
            self.transition(LifecycleState::Stopped);
            return Err(e.into());
        }

        let processor = Arc::new(NotificationProcessor::new(
            Arc::clone(&self.repository),
            self.policy,
        ));
        let worker = StreamWorker::new(
            Arc::clone(&self.source),
            processor,
            self.worker_config.clone(),
        );
        let (shutdown, shutdown_rx) = watch::channel(false);
        let handle = tokio::spawn(async move { worker.run(shutdown_rx).await });

        self.worker = Some(RunningWorker { shutdown, handle });
        self.transition(LifecycleState::Running);
        Ok(())
    }

    /// Drain and release everything. Errors are logged, never returned.
    ///
    /// Calling it again once stopped does nothing.
    pub async fn shutdown(&mut self) {
        match self.state {
            LifecycleState::Stopped => return,
            LifecycleState::Uninitialized => {
                self.transition(LifecycleState::Stopped);
                return;
            }
            _ => {}
        }

        self.transition(LifecycleState::Draining);

        if let Some(RunningWorker {
            shutdown,
            mut handle,
        }) = self.worker.take()
        {
            let _ = shutdown.send(true);

            match tokio::time::timeout(self.drain_timeout, &mut handle).await {
                Ok(Ok(Ok(()))) => info!("Worker drained"),
                Ok(Ok(Err(e))) => warn!(error = %e, "Worker stopped with an error"),
                Ok(Err(e)) => error!(error = %e, "Worker task failed"),
                Err(_) => {
                    warn!(
                        drain_timeout_ms = self.drain_timeout.as_millis() as u64,
                        "Drain window expired, aborting worker"
                    );
                    handle.abort();
                    // Let the cancelled insert unwind before storage is closed
                    let _ = handle.await;
                }
            }
        }

        self.release().await;
        self.transition(LifecycleState::Stopped);
    }

    /// Broker first, then storage.
    async fn release(&self) {
        if let Err(e) = self.source.disconnect().await {
            warn!(error = %e, "Failed to close broker connection");
        }
        if let Err(e) = self.repository.close().await {
            warn!(error = %e, "Failed to close notification storage");
        }
    }

    /// Start, run until `signal` resolves, then shut down.
    ///
    /// A worker that exits on its own also triggers shutdown and is reported
    /// as an error.
    pub async fn run_until<F>(mut self, signal: F) -> NotificationResult<()>
    where
        F: Future<Output = ()>,
    {
        self.start().await?;

        tokio::pin!(signal);
        let early_exit = match self.worker.as_mut() {
            Some(worker) => tokio::select! {
                _ = &mut signal => None,
                exit = &mut worker.handle => Some(exit),
            },
            None => None,
        };

        let Some(exit) = early_exit else {
            self.shutdown().await;
            return Ok(());
        };

        // The join handle is spent; nothing left to drain
        self.worker = None;
        let reason = match exit {
            Ok(Ok(())) => "worker exited before shutdown was requested".to_string(),
            Ok(Err(e)) => format!("worker failed: {e}"),
            Err(e) => format!("worker task failed: {e}"),
        };
        error!(reason = %reason, "Notification worker stopped unexpectedly");
        self.shutdown().await;
        Err(NotificationError::Internal(reason))
    }
}
