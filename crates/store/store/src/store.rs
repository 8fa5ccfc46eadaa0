use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::StoreError;
use crate::script::AtomicScript;

/// Options for [`KeyValueStore::set`], mirroring Redis `SET ... [PX ms] [NX]`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SetOptions {
    /// Expiry applied together with the write, at millisecond precision.
    pub expire: Option<Duration>,
    /// Only write when the key does not exist yet.
    pub only_if_not_exists: bool,
}

impl SetOptions {
    /// Plain overwrite without expiry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Expire the key after `ttl`.
    #[must_use]
    pub fn expire(mut self, ttl: Duration) -> Self {
        self.expire = Some(ttl);
        self
    }

    /// Skip the write if the key already exists.
    #[must_use]
    pub fn only_if_not_exists(mut self) -> Self {
        self.only_if_not_exists = true;
        self
    }
}

/// The key-value capability session handling is built on.
///
/// Implementations must be `Send + Sync` and safe for concurrent access from
/// many handlers. Conditional writes and [`eval`](Self::eval) must be atomic
/// with respect to every other operation on the same key.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Get the value for a key. Returns `None` if not found or expired.
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError>;

    /// Write a value according to `options`.
    ///
    /// Returns `false` only when `only_if_not_exists` prevented the write.
    async fn set(
        &self,
        key: &str,
        value: &[u8],
        options: SetOptions,
    ) -> Result<bool, StoreError>;

    /// Write a value that expires after `ttl` (whole seconds, at least one).
    async fn set_with_expiry(
        &self,
        key: &str,
        value: &[u8],
        ttl: Duration,
    ) -> Result<bool, StoreError>;

    /// Delete a key. Returns the number of keys removed.
    async fn delete(&self, key: &str) -> Result<u64, StoreError>;

    /// Run `script` atomically against `keys` with `args`, returning its
    /// integer reply.
    async fn eval(
        &self,
        script: &AtomicScript,
        keys: &[&str],
        args: &[&str],
    ) -> Result<i64, StoreError>;
}

#[async_trait]
impl<T: KeyValueStore + ?Sized> KeyValueStore for Arc<T> {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        (**self).get(key).await
    }

    async fn set(
        &self,
        key: &str,
        value: &[u8],
        options: SetOptions,
    ) -> Result<bool, StoreError> {
        (**self).set(key, value, options).await
    }

    async fn set_with_expiry(
        &self,
        key: &str,
        value: &[u8],
        ttl: Duration,
    ) -> Result<bool, StoreError> {
        (**self).set_with_expiry(key, value, ttl).await
    }

    async fn delete(&self, key: &str) -> Result<u64, StoreError> {
        (**self).delete(key).await
    }

    async fn eval(
        &self,
        script: &AtomicScript,
        keys: &[&str],
        args: &[&str],
    ) -> Result<i64, StoreError> {
        (**self).eval(script, keys, args).await
    }
}

/// Whole seconds for a `SETEX`-style expiry, never below one second.
pub fn expiry_seconds(ttl: Duration) -> u64 {
    ttl.as_secs().max(1)
}
