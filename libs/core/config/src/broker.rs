use crate::{env_parse_or, ConfigError, FromEnv};
use std::time::Duration;

/// Message broker (Redis Streams) configuration shared by publishers and consumers.
#[derive(Clone, Debug)]
pub struct BrokerConfig {
    pub url: String,
    pub connect_timeout: Duration,
    pub send_timeout: Duration,
}

impl BrokerConfig {
    pub const DEFAULT_TIMEOUT_MS: u64 = 5_000;

    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            connect_timeout: Duration::from_millis(Self::DEFAULT_TIMEOUT_MS),
            send_timeout: Duration::from_millis(Self::DEFAULT_TIMEOUT_MS),
        }
    }
}

impl FromEnv for BrokerConfig {
    /// Reads:
    /// - `REDIS_URL` or `REDIS_HOST` (required)
    /// - `BROKER_CONNECT_TIMEOUT_MS` (default 5000)
    /// - `BROKER_SEND_TIMEOUT_MS` (default 5000)
    fn from_env() -> Result<Self, ConfigError> {
        let url = std::env::var("REDIS_URL")
            .or_else(|_| std::env::var("REDIS_HOST"))
            .map_err(|_| ConfigError::MissingEnvVar("REDIS_URL or REDIS_HOST".to_string()))?;

        let connect_ms = env_parse_or("BROKER_CONNECT_TIMEOUT_MS", Self::DEFAULT_TIMEOUT_MS)?;
        let send_ms = env_parse_or("BROKER_SEND_TIMEOUT_MS", Self::DEFAULT_TIMEOUT_MS)?;

        Ok(Self {
            url,
            connect_timeout: Duration::from_millis(connect_ms),
            send_timeout: Duration::from_millis(send_ms),
        })
    }
}
