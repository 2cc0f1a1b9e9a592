//! Storage and attribution settings.

use core_config::{ConfigError, FromEnv, env_or_default, env_parse_or};
use sea_orm::ConnectOptions;
use std::time::Duration;

/// Notification storage configuration.
#[derive(Clone, Debug)]
pub struct StorageConfig {
    /// SeaORM connection URL (`sqlite://...` or `postgres://...`)
    pub url: String,

    /// Maximum number of pooled connections
    pub max_connections: u32,

    /// Connection timeout in seconds
    pub connect_timeout_secs: u64,

    /// Enable SQL statement logging
    pub sqlx_logging: bool,
}

impl StorageConfig {
    pub const DEFAULT_URL: &'static str = "sqlite://notifications.db?mode=rwc";
    pub const DEFAULT_MAX_CONNECTIONS: u32 = 5;

    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            max_connections: Self::DEFAULT_MAX_CONNECTIONS,
            connect_timeout_secs: 8,
            sqlx_logging: false,
        }
    }

    /// A private in-memory SQLite database.
    ///
    /// Pinned to a single connection: every SQLite memory connection is its own database.
    pub fn in_memory() -> Self {
        Self {
            max_connections: 1,
            ..Self::new("sqlite::memory:")
        }
    }

    pub fn with_max_connections(mut self, max_connections: u32) -> Self {
        self.max_connections = max_connections.max(1);
        self
    }

    /// Convert this config into SeaORM ConnectOptions
    pub fn into_connect_options(self) -> ConnectOptions {
        let mut opt = ConnectOptions::new(&self.url);
        opt.max_connections(self.max_connections)
            .min_connections(1)
            .connect_timeout(Duration::from_secs(self.connect_timeout_secs))
            .acquire_timeout(Duration::from_secs(self.connect_timeout_secs))
            .sqlx_logging(self.sqlx_logging);
        opt
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self::new(Self::DEFAULT_URL)
    }
}

impl FromEnv for StorageConfig {
    /// Reads:
    /// - `NOTIFICATIONS_DATABASE_URL` (default `sqlite://notifications.db?mode=rwc`)
    /// - `NOTIFICATIONS_DB_MAX_CONNECTIONS` (default 5)
    fn from_env() -> Result<Self, ConfigError> {
        let url = env_or_default("NOTIFICATIONS_DATABASE_URL", Self::DEFAULT_URL);
        let max_connections =
            env_parse_or("NOTIFICATIONS_DB_MAX_CONNECTIONS", Self::DEFAULT_MAX_CONNECTIONS)?;

        Ok(Self::new(url).with_max_connections(max_connections))
    }
}

/// Who owns a notification when the task snapshot carries no `userId`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OwnerPolicy {
    /// Attribute ownerless events to this user.
    DefaultUser(i64),
    /// Drop ownerless events.
    Skip,
}

impl OwnerPolicy {
    pub const DEFAULT_USER_ID: i64 = 1;

    /// The owning user, or `None` when the event should be dropped.
    pub fn resolve(&self, user_id: Option<i64>) -> Option<i64> {
        match (user_id, self) {
            (Some(id), _) => Some(id),
            (None, OwnerPolicy::DefaultUser(id)) => Some(*id),
            (None, OwnerPolicy::Skip) => None,
        }
    }
}

impl Default for OwnerPolicy {
    fn default() -> Self {
        OwnerPolicy::DefaultUser(Self::DEFAULT_USER_ID)
    }
}

impl FromEnv for OwnerPolicy {
    /// Reads `NOTIFICATIONS_DEFAULT_USER_ID` (default 1; `none` selects `Skip`)
    fn from_env() -> Result<Self, ConfigError> {
        let raw = env_or_default("NOTIFICATIONS_DEFAULT_USER_ID", "1");
        let raw = raw.trim();

        if raw.eq_ignore_ascii_case("none") {
            return Ok(OwnerPolicy::Skip);
        }

        raw.parse()
            .map(OwnerPolicy::DefaultUser)
            .map_err(|e: std::num::ParseIntError| ConfigError::ParseError {
                key: "NOTIFICATIONS_DEFAULT_USER_ID".to_string(),
                details: e.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_config_defaults() {
        temp_env::with_vars(
            [
                ("NOTIFICATIONS_DATABASE_URL", None::<&str>),
                ("NOTIFICATIONS_DB_MAX_CONNECTIONS", None),
            ],
            || {
                let config = StorageConfig::from_env().unwrap();
                assert_eq!(config.url, "sqlite://notifications.db?mode=rwc");
                assert_eq!(config.max_connections, 5);
            },
        );
    }

    #[test]
    fn test_storage_config_overrides() {
        temp_env::with_vars(
            [
                ("NOTIFICATIONS_DATABASE_URL", Some("postgres://localhost/notifications")),
                ("NOTIFICATIONS_DB_MAX_CONNECTIONS", Some("0")),
            ],
            || {
                let config = StorageConfig::from_env().unwrap();
                assert_eq!(config.url, "postgres://localhost/notifications");
                assert_eq!(config.max_connections, 1);
            },
        );
    }

    #[test]
    fn test_storage_config_rejects_garbage() {
        temp_env::with_var("NOTIFICATIONS_DB_MAX_CONNECTIONS", Some("many"), || {
            assert!(matches!(
                StorageConfig::from_env(),
                Err(ConfigError::ParseError { .. })
            ));
        });
    }

    #[test]
    fn test_owner_policy_from_env() {
        temp_env::with_var("NOTIFICATIONS_DEFAULT_USER_ID", None::<&str>, || {
            assert_eq!(OwnerPolicy::from_env().unwrap(), OwnerPolicy::DefaultUser(1));
        });
        temp_env::with_var("NOTIFICATIONS_DEFAULT_USER_ID", Some("42"), || {
            assert_eq!(OwnerPolicy::from_env().unwrap(), OwnerPolicy::DefaultUser(42));
        });
        temp_env::with_var("NOTIFICATIONS_DEFAULT_USER_ID", Some("None"), || {
            assert_eq!(OwnerPolicy::from_env().unwrap(), OwnerPolicy::Skip);
        });
        temp_env::with_var("NOTIFICATIONS_DEFAULT_USER_ID", Some("abc"), || {
            assert!(OwnerPolicy::from_env().is_err());
        });
    }

    #[test]
    fn test_owner_policy_resolve() {
        assert_eq!(OwnerPolicy::default().resolve(Some(3)), Some(3));
        assert_eq!(OwnerPolicy::default().resolve(None), Some(1));
        assert_eq!(OwnerPolicy::Skip.resolve(Some(0)), Some(0));
        assert_eq!(OwnerPolicy::Skip.resolve(None), None);
    }
}
