use std::collections::HashMap;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use serde::Deserialize;
use sessionlock_dsn::RedisDsn;
use sessionlock_session::SessionConfig;
use sessionlock_store_redis::RedisConfig;

use crate::error::ConfigError;

/// Top-level configuration, loaded from a TOML file.
#[derive(Debug, Clone, Deserialize)]
pub struct SessionLockConfig {
    /// Redis clients keyed by alias.
    #[serde(default)]
    pub clients: HashMap<String, ClientConfig>,
    /// Session handler configuration. Absent when sessions are not used.
    #[serde(default)]
    pub session: Option<SessionSection>,
    /// Log filter used by [`telemetry::init`](crate::telemetry::init).
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// A single Redis client.
///
/// # Example
///
/// ```toml
/// [clients.default]
/// dsn = "redis://secret@localhost:6379/2"
/// logging = true
///
/// [clients.default.options]
/// connection_timeout = 5
/// pool_size = 10
/// prefix = "app:"
/// persistent = true
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct ClientConfig {
    pub dsn: RedisDsn,
    /// Record every command in the registry's command log.
    #[serde(default)]
    pub logging: bool,
    #[serde(default)]
    pub options: ClientOptions,
}

/// Connection options of a client.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ClientOptions {
    /// Seconds to wait for a pooled connection.
    #[serde(default = "default_connection_timeout")]
    pub connection_timeout: u64,
    #[serde(default = "default_pool_size")]
    pub pool_size: usize,
    /// Prefix applied to every key this client touches.
    #[serde(default)]
    pub prefix: String,
    /// Share one connection pool with every other persistent client whose
    /// DSN has the same persistent id.
    #[serde(default)]
    pub persistent: bool,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            connection_timeout: default_connection_timeout(),
            pool_size: default_pool_size(),
            prefix: String::new(),
            persistent: false,
        }
    }
}

fn default_connection_timeout() -> u64 {
    5
}

fn default_pool_size() -> usize {
    10
}

/// The `[session]` table: the client to store sessions in plus the handler
/// settings.
#[derive(Debug, Clone, Deserialize)]
pub struct SessionSection {
    /// Alias of the client holding session data.
    pub client: String,
    #[serde(flatten)]
    pub handler: SessionConfig,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoggingConfig {
    /// `EnvFilter` directives, e.g. `"info,sessionlock_session=debug"`.
    pub filter: Option<String>,
}

impl ClientConfig {
    /// Store configuration for this client.
    pub fn redis_config(&self) -> RedisConfig {
        let mut config = RedisConfig::new(self.dsn.clone());
        config.key_prefix.clone_from(&self.options.prefix);
        config.pool_size = self.options.pool_size;
        config.connection_timeout = Duration::from_secs(self.options.connection_timeout);
        config
    }
}

impl SessionLockConfig {
    /// Read, parse and validate the configuration file at `path`.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        std::fs::read_to_string(path)?.parse()
    }

    /// Check cross-references that deserialization cannot.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.clients.is_empty() {
            return Err(ConfigError::NoClients);
        }

        for (alias, client) in &self.clients {
            if !client.dsn.is_valid() {
                return Err(ConfigError::InvalidDsn {
                    alias: alias.clone(),
                });
            }
        }

        if let Some(session) = &self.session {
            if !self.clients.contains_key(&session.client) {
                return Err(ConfigError::UnknownClient(session.client.clone()));
            }
            session.handler.validate()?;
        }

        Ok(())
    }
}

impl FromStr for SessionLockConfig {
    type Err = ConfigError;

    /// Parse and validate a TOML document.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let config: Self = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests;
