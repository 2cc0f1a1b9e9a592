//! Notifications Worker Service
//!
//! Turns task lifecycle events into per-user notification records.
//!
//! ## Architecture
//!
//! ```text
//! Redis Stream (task-events)
//!   ↓ (Consumer Group: notification-group)
//! StreamWorker<StreamConsumer, NotificationProcessor>
//!   ↓ (decode → derive message → insert)
//! SqlNotificationRepository
//!   ↓
//! SQLite / PostgreSQL
//! ```
//!
//! ## Features
//!
//! - Storage is ready before the consumer group is joined
//! - Poison messages and storage failures are logged and skipped
//! - Pending entries from a crashed run are recovered on start
//! - SIGINT / SIGTERM drain the in-flight message within a bounded window
//! - Optional Prometheus exporter

pub mod config;

use config::ConsumerConfig;
use core_config::{BrokerConfig, Environment, FromEnv};
use domain_notifications::{
    NotificationPipeline, OwnerPolicy, SqlNotificationRepository, StorageConfig,
};
use eyre::{Result, WrapErr};
use std::sync::Arc;
use stream_worker::{StreamConsumer, init_metrics};
use tokio::signal;
use tracing::{error, info};

/// Run the notifications worker
///
/// # Errors
///
/// Returns an error if:
/// - Configuration is invalid or incomplete
/// - Notification storage cannot be opened or initialized
/// - The consumer group cannot be joined
/// - The worker stops before shutdown was requested
pub async fn run() -> Result<()> {
    core_config::tracing::install_color_eyre();

    // Initialize tracing (env-aware: JSON for prod, pretty for dev)
    let environment = Environment::from_env();
    core_config::tracing::init_tracing(&environment);

    info!(
        name = env!("CARGO_PKG_NAME"),
        version = env!("CARGO_PKG_VERSION"),
        environment = ?environment,
        "Starting notifications worker"
    );

    let consumer = ConsumerConfig::from_env().wrap_err("Failed to load consumer configuration")?;
    init_metrics(consumer.metrics_addr()).wrap_err("Failed to initialize metrics")?;

    let broker = BrokerConfig::from_env().wrap_err("Failed to load broker configuration")?;
    let storage = StorageConfig::from_env().wrap_err("Failed to load storage configuration")?;
    let policy = OwnerPolicy::from_env().wrap_err("Failed to load owner policy")?;

    let worker_config = consumer.worker_config();
    info!(
        stream = %worker_config.stream_name,
        consumer_group = %worker_config.consumer_group,
        consumer_id = %worker_config.consumer_id,
        block_timeout_ms = worker_config.block_timeout_ms,
        drain_timeout_secs = consumer.drain_timeout.as_secs(),
        owner_policy = ?policy,
        "Worker configuration loaded"
    );

    let source = StreamConsumer::new(&broker.url, worker_config.clone())
        .wrap_err("Invalid broker URL")?
        .with_connect_timeout(broker.connect_timeout);

    let repository = SqlNotificationRepository::connect(storage)
        .await
        .wrap_err("Failed to open notification storage")?;

    NotificationPipeline::new(
        Arc::new(source),
        Arc::new(repository),
        worker_config,
        policy,
    )
    .with_drain_timeout(consumer.drain_timeout)
    .run_until(shutdown_signal())
    .await
    .wrap_err("Notification pipeline failed")?;

    info!("Notifications worker stopped");
    Ok(())
}

/// Wait for a shutdown signal (SIGINT or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating shutdown...");
        },
        _ = terminate => {
            info!("Received SIGTERM, initiating shutdown...");
        },
    }
}
