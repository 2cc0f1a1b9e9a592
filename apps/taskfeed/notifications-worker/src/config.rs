//! Consumer settings for the worker process.

use core_config::{ConfigError, FromEnv, env_or_default, env_parse_or};
use domain_tasks::TaskEventStream;
use std::net::SocketAddr;
use std::time::Duration;
use stream_worker::WorkerConfig;

#[derive(Clone, Debug)]
pub struct ConsumerConfig {
    /// Stable across restarts so the pending list is re-read after a crash
    pub consumer_id: String,
    pub block_timeout_ms: u64,
    pub drain_timeout: Duration,
    /// Prometheus exporter port; no exporter when unset
    pub metrics_port: Option<u16>,
}

impl ConsumerConfig {
    pub const DEFAULT_CONSUMER_ID: &'static str = "notifications-worker";
    pub const DEFAULT_BLOCK_MS: u64 = 1_000;
    pub const DEFAULT_DRAIN_TIMEOUT_SECS: u64 = 10;

    /// Worker settings for the `task-events` stream
    pub fn worker_config(&self) -> WorkerConfig {
        WorkerConfig::from_stream_def::<TaskEventStream>()
            .with_consumer_id(self.consumer_id.clone())
            .with_block_timeout_ms(self.block_timeout_ms)
    }

    pub fn metrics_addr(&self) -> Option<SocketAddr> {
        self.metrics_port
            .map(|port| SocketAddr::from(([0, 0, 0, 0], port)))
    }
}

impl FromEnv for ConsumerConfig {
    /// Reads:
    /// - `CONSUMER_ID` (default `notifications-worker`)
    /// - `CONSUMER_BLOCK_MS` (default 1000)
    /// - `DRAIN_TIMEOUT_SECS` (default 10)
    /// - `METRICS_PORT` (optional)
    fn from_env() -> Result<Self, ConfigError> {
        let metrics_port = match std::env::var("METRICS_PORT") {
            Ok(_) => Some(env_parse_or("METRICS_PORT", 0u16)?),
            Err(_) => None,
        };

        Ok(Self {
            consumer_id: env_or_default("CONSUMER_ID", Self::DEFAULT_CONSUMER_ID),
            block_timeout_ms: env_parse_or("CONSUMER_BLOCK_MS", Self::DEFAULT_BLOCK_MS)?,
            drain_timeout: Duration::from_secs(env_parse_or(
                "DRAIN_TIMEOUT_SECS",
                Self::DEFAULT_DRAIN_TIMEOUT_SECS,
            )?),
            metrics_port,
        })
    }
}
