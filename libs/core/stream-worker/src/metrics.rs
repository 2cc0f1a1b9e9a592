//! Prometheus metrics for stream producers and workers

use crate::error::StreamError;
use metrics::{counter, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;
use once_cell::sync::OnceCell;
use std::net::SocketAddr;
use std::time::Duration;
use tracing::info;

static RECORDER_INSTALLED: OnceCell<()> = OnceCell::new();

/// Install the Prometheus recorder.
///
/// With `listen` set, metrics are served over HTTP at that address (any path).
/// Without it the recorder is installed but nothing is exported, which keeps
/// the counters cheap no-ops for local runs. Subsequent calls are no-ops.
///
/// Must be called from within a Tokio runtime when `listen` is set.
pub fn init_metrics(listen: Option<SocketAddr>) -> Result<(), StreamError> {
    RECORDER_INSTALLED
        .get_or_try_init(|| {
            let builder = PrometheusBuilder::new();
            match listen {
                Some(addr) => {
                    builder
                        .with_http_listener(addr)
                        .install()
                        .map_err(|e| StreamError::Config(e.to_string()))?;
                    info!(%addr, "Prometheus exporter listening");
                }
                None => {
                    builder
                        .install_recorder()
                        .map_err(|e| StreamError::Config(e.to_string()))?;
                    info!("Prometheus recorder installed without exporter");
                }
            }
            Ok(())
        })
        .map(|_| ())
}

/// How a message left the worker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Handled,
    Poison,
    Rejected,
    Failed,
}

impl Outcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Handled => "handled",
            Outcome::Poison => "poison",
            Outcome::Rejected => "rejected",
            Outcome::Failed => "failed",
        }
    }
}

/// Stream metrics helper
#[derive(Clone)]
pub struct StreamMetrics {
    /// Stream name for labeling
    stream_name: String,
    /// Handler or producer name for labeling
    component: String,
}

impl StreamMetrics {
    pub fn new(stream_name: impl Into<String>, component: impl Into<String>) -> Self {
        Self {
            stream_name: stream_name.into(),
            component: component.into(),
        }
    }

    /// Record a message being received
    pub fn message_received(&self, redelivered: bool) {
        counter!(
            "stream_worker_messages_received_total",
            "stream" => self.stream_name.clone(),
            "handler" => self.component.clone(),
            "redelivered" => redelivered.to_string()
        )
        .increment(1);
    }

    /// Record the end of a message's handling
    pub fn message_finished(&self, outcome: Outcome, duration: Duration) {
        counter!(
            "stream_worker_messages_total",
            "stream" => self.stream_name.clone(),
            "handler" => self.component.clone(),
            "outcome" => outcome.as_str()
        )
        .increment(1);

        histogram!(
            "stream_worker_handle_duration_seconds",
            "stream" => self.stream_name.clone(),
            "handler" => self.component.clone()
        )
        .record(duration.as_secs_f64());
    }

    /// Record a failed read or acknowledgement
    pub fn transport_error(&self, kind: &'static str) {
        counter!(
            "stream_worker_transport_errors_total",
            "stream" => self.stream_name.clone(),
            "handler" => self.component.clone(),
            "kind" => kind
        )
        .increment(1);
    }

    /// Record a publish attempt
    pub fn published(&self, success: bool) {
        counter!(
            "stream_producer_messages_total",
            "stream" => self.stream_name.clone(),
            "producer" => self.component.clone(),
            "status" => if success { "published" } else { "failed" }
        )
        .increment(1);
    }
}
