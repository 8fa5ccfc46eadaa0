use std::time::Duration;

use async_trait::async_trait;
use deadpool_redis::{Config, Pool, Runtime};
use redis::{AsyncCommands, Script};
use tracing::debug;

use sessionlock_store::error::StoreError;
use sessionlock_store::script::AtomicScript;
use sessionlock_store::store::{KeyValueStore, SetOptions, expiry_seconds};

use crate::config::RedisConfig;

/// Redis-backed implementation of [`KeyValueStore`].
///
/// Uses a `deadpool-redis` connection pool. Values are stored as plain Redis
/// strings; scripts are sent with `EVALSHA` and reloaded on a cache miss.
pub struct RedisStore {
    pool: Pool,
    key_prefix: String,
    persistent_id: String,
}

impl RedisStore {
    /// Create a new `RedisStore` from the provided configuration.
    ///
    /// Connections are opened lazily on first use.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidConfig`] if the DSN cannot be connected to
    /// and [`StoreError::Connection`] if the pool cannot be created.
    pub fn new(config: &RedisConfig) -> Result<Self, StoreError> {
        let url = config.connection_url()?;
        let cfg = Config::from_url(url);
        let pool = cfg
            .builder()
            .map(|b| {
                b.max_size(config.pool_size)
                    .wait_timeout(Some(config.connection_timeout))
                    .runtime(Runtime::Tokio1)
                    .build()
            })
            .map_err(|e| StoreError::Connection(e.to_string()))?
            .map_err(|e| StoreError::Connection(e.to_string()))?;

        let persistent_id = config.dsn.persistent_id();
        debug!(
            persistent_id = %persistent_id,
            pool_size = config.pool_size,
            "redis store pool created"
        );

        Ok(Self {
            pool,
            key_prefix: config.key_prefix.clone(),
            persistent_id,
        })
    }

    /// A store over the same connection pool with a different key prefix.
    pub fn with_key_prefix(&self, key_prefix: impl Into<String>) -> Self {
        Self {
            pool: self.pool.clone(),
            key_prefix: key_prefix.into(),
            persistent_id: self.persistent_id.clone(),
        }
    }

    /// Identity of the DSN this store connects to.
    pub fn persistent_id(&self) -> &str {
        &self.persistent_id
    }

    /// Build the full Redis key.
    fn redis_key(&self, key: &str) -> String {
        format!("{}{key}", self.key_prefix)
    }

    /// Obtain a connection from the pool.
    async fn conn(&self) -> Result<deadpool_redis::Connection, StoreError> {
        self.pool
            .get()
            .await
            .map_err(|e| StoreError::Connection(e.to_string()))
    }
}

#[async_trait]
impl KeyValueStore for RedisStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        let redis_key = self.redis_key(key);
        let mut conn = self.conn().await?;

        let val: Option<Vec<u8>> = conn
            .get(&redis_key)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;

        Ok(val)
    }

    async fn set(
        &self,
        key: &str,
        value: &[u8],
        options: SetOptions,
    ) -> Result<bool, StoreError> {
        let redis_key = self.redis_key(key);
        let mut conn = self.conn().await?;

        let mut cmd = redis::cmd("SET");
        cmd.arg(&redis_key).arg(value);
        if let Some(ttl) = options.expire {
            let ms = u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX).max(1);
            cmd.arg("PX").arg(ms);
        }
        if options.only_if_not_exists {
            cmd.arg("NX");
        }

        // `OK` when written, nil when NX found an existing key.
        let reply: Option<String> = cmd
            .query_async(&mut conn)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;

        Ok(reply.is_some())
    }

    async fn set_with_expiry(
        &self,
        key: &str,
        value: &[u8],
        ttl: Duration,
    ) -> Result<bool, StoreError> {
        let redis_key = self.redis_key(key);
        let mut conn = self.conn().await?;

        let () = redis::cmd("SETEX")
            .arg(&redis_key)
            .arg(expiry_seconds(ttl))
            .arg(value)
            .query_async(&mut conn)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;

        Ok(true)
    }

    async fn delete(&self, key: &str) -> Result<u64, StoreError> {
        let redis_key = self.redis_key(key);
        let mut conn = self.conn().await?;

        let removed: u64 = conn
            .del(&redis_key)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;

        Ok(removed)
    }

    async fn eval(
        &self,
        script: &AtomicScript,
        keys: &[&str],
        args: &[&str],
    ) -> Result<i64, StoreError> {
        let lua = Script::new(script.source());
        let mut invocation = lua.prepare_invoke();
        for key in keys {
            invocation.key(self.redis_key(key));
        }
        for arg in args {
            invocation.arg(*arg);
        }

        let mut conn = self.conn().await?;
        let result: i64 = invocation
            .invoke_async(&mut conn)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;

        Ok(result)
    }
}
