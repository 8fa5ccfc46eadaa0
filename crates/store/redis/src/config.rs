use std::time::Duration;

use percent_encoding::{NON_ALPHANUMERIC, utf8_percent_encode};
use sessionlock_dsn::{DEFAULT_PORT, RedisDsn};
use sessionlock_store::StoreError;

/// Configuration for the Redis store backend.
#[derive(Debug, Clone)]
pub struct RedisConfig {
    /// Connection target.
    pub dsn: RedisDsn,

    /// Prefix prepended to every key the store touches. Empty means none.
    pub key_prefix: String,

    /// Number of connections in the `deadpool-redis` pool.
    pub pool_size: usize,

    /// Timeout for acquiring a pooled connection.
    pub connection_timeout: Duration,
}

impl RedisConfig {
    /// Configuration with default pool settings for `dsn`.
    pub fn new(dsn: RedisDsn) -> Self {
        Self {
            dsn,
            key_prefix: String::new(),
            pool_size: 10,
            connection_timeout: Duration::from_secs(5),
        }
    }

    /// Render the DSN as a URL understood by the `redis` crate.
    ///
    /// TCP targets become `redis://[:password@]host:port/db`, socket targets
    /// `redis+unix:///path?db=N[&pass=...]`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidConfig`] if the DSN is not valid or still
    /// contains unresolved placeholders.
    pub fn connection_url(&self) -> Result<String, StoreError> {
        if !self.dsn.is_valid() {
            return Err(StoreError::InvalidConfig(format!(
                "redis DSN {} is invalid",
                self.dsn.persistent_id()
            )));
        }
        if self.dsn.has_placeholders() {
            return Err(StoreError::InvalidConfig(format!(
                "redis DSN {} has unresolved placeholders",
                self.dsn.persistent_id()
            )));
        }

        let password = self
            .dsn
            .password()
            .map(|pw| utf8_percent_encode(pw, NON_ALPHANUMERIC).to_string());
        let db = self.dsn.database().unwrap_or(0);

        if let Some(socket) = self.dsn.socket() {
            return Ok(match password {
                Some(pw) => format!("redis+unix://{socket}?db={db}&pass={pw}"),
                None => format!("redis+unix://{socket}?db={db}"),
            });
        }

        let host = self.dsn.host().unwrap_or("127.0.0.1");
        let port = self.dsn.port().unwrap_or(DEFAULT_PORT);
        Ok(match password {
            Some(pw) => format!("redis://:{pw}@{host}:{port}/{db}"),
            None => format!("redis://{host}:{port}/{db}"),
        })
    }
}
