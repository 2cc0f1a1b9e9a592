//! Notifications Worker Service - Entry Point
//!
//! Background worker that consumes task events from the Redis stream.

#[tokio::main]
async fn main() -> eyre::Result<()> {
    taskfeed_notifications_worker::run().await
}
