//! Command logging decorator.
//!
//! [`LoggedStore`] wraps any [`KeyValueStore`], emits a `tracing` event per
//! command and appends a [`CommandRecord`] to a shared [`CommandLog`]. Values
//! and script arguments are never recorded since they carry session payloads
//! and lock tokens.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::error::StoreError;
use crate::script::AtomicScript;
use crate::store::{KeyValueStore, SetOptions, expiry_seconds};

/// One executed command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandRecord {
    /// Command line without values, e.g. `SET session:abc.lock PX 30001 NX`.
    pub command: String,
    pub duration: Duration,
    /// Alias of the client the command ran on.
    pub connection: String,
    /// Error message if the command failed.
    pub error: Option<String>,
}

/// Shared, append-only list of executed commands.
///
/// Cloning is cheap; all clones observe the same records.
#[derive(Debug, Clone, Default)]
pub struct CommandLog {
    records: Arc<Mutex<Vec<CommandRecord>>>,
}

impl CommandLog {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&self, record: CommandRecord) {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(record);
    }

    /// Snapshot of all records in execution order.
    pub fn commands(&self) -> Vec<CommandRecord> {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn command_count(&self) -> usize {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn errored_count(&self) -> usize {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|r| r.error.is_some())
            .count()
    }

    /// Total time spent in commands.
    pub fn total_time(&self) -> Duration {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|r| r.duration)
            .sum()
    }

    pub fn clear(&self) {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

/// A [`KeyValueStore`] that logs every command it forwards.
pub struct LoggedStore<S> {
    inner: S,
    connection: String,
    log: CommandLog,
}

impl<S: KeyValueStore> LoggedStore<S> {
    /// Wrap `inner`, tagging its records with the client alias `connection`.
    pub fn new(inner: S, connection: impl Into<String>, log: CommandLog) -> Self {
        Self {
            inner,
            connection: connection.into(),
            log,
        }
    }

    pub fn log(&self) -> &CommandLog {
        &self.log
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    fn record<T>(&self, command: String, started: Instant, result: &Result<T, StoreError>) {
        let duration = started.elapsed();
        let error = match result {
            Ok(_) => {
                debug!(
                    connection = %self.connection,
                    command = %command,
                    duration_ms = duration.as_secs_f64() * 1000.0,
                    "redis command executed"
                );
                None
            }
            Err(e) => {
                warn!(
                    connection = %self.connection,
                    command = %command,
                    error = %e,
                    "redis command failed"
                );
                Some(e.to_string())
            }
        };
        self.log.push(CommandRecord {
            command,
            duration,
            connection: self.connection.clone(),
            error,
        });
    }
}

fn describe_set(key: &str, options: SetOptions) -> String {
    let mut command = format!("SET {key}");
    if let Some(ttl) = options.expire {
        command.push_str(&format!(" PX {}", ttl.as_millis()));
    }
    if options.only_if_not_exists {
        command.push_str(" NX");
    }
    command
}

#[async_trait]
impl<S: KeyValueStore> KeyValueStore for LoggedStore<S> {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        let started = Instant::now();
        let result = self.inner.get(key).await;
        self.record(format!("GET {key}"), started, &result);
        result
    }

    async fn set(
        &self,
        key: &str,
        value: &[u8],
        options: SetOptions,
    ) -> Result<bool, StoreError> {
        let started = Instant::now();
        let result = self.inner.set(key, value, options).await;
        self.record(describe_set(key, options), started, &result);
        result
    }

    async fn set_with_expiry(
        &self,
        key: &str,
        value: &[u8],
        ttl: Duration,
    ) -> Result<bool, StoreError> {
        let started = Instant::now();
        let result = self.inner.set_with_expiry(key, value, ttl).await;
        self.record(
            format!("SETEX {key} {}", expiry_seconds(ttl)),
            started,
            &result,
        );
        result
    }

    async fn delete(&self, key: &str) -> Result<u64, StoreError> {
        let started = Instant::now();
        let result = self.inner.delete(key).await;
        self.record(format!("DEL {key}"), started, &result);
        result
    }

    async fn eval(
        &self,
        script: &AtomicScript,
        keys: &[&str],
        args: &[&str],
    ) -> Result<i64, StoreError> {
        let started = Instant::now();
        let result = self.inner.eval(script, keys, args).await;
        self.record(
            format!("EVAL {} {} {}", script.name(), keys.len(), keys.join(" ")),
            started,
            &result,
        );
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Store that fails every delete and otherwise behaves as empty.
    struct FlakyStore;

    #[async_trait]
    impl KeyValueStore for FlakyStore {
        async fn get(&self, _key: &str) -> Result<Option<Vec<u8>>, StoreError> {
            Ok(None)
        }

        async fn set(
            &self,
            _key: &str,
            _value: &[u8],
            _options: SetOptions,
        ) -> Result<bool, StoreError> {
            Ok(true)
        }

        async fn set_with_expiry(
            &self,
            _key: &str,
            _value: &[u8],
            _ttl: Duration,
        ) -> Result<bool, StoreError> {
            Ok(true)
        }

        async fn delete(&self, _key: &str) -> Result<u64, StoreError> {
            Err(StoreError::Connection("connection refused".into()))
        }

        async fn eval(
            &self,
            _script: &AtomicScript,
            _keys: &[&str],
            _args: &[&str],
        ) -> Result<i64, StoreError> {
            Ok(0)
        }
    }

    #[tokio::test]
    async fn records_commands_in_order_without_values() {
        let log = CommandLog::new();
        let store = LoggedStore::new(FlakyStore, "default", log.clone());

        store.get("session:abc").await.unwrap();
        store
            .set(
                "session:abc.lock",
                b"token-123",
                SetOptions::new()
                    .expire(Duration::from_millis(30_001))
                    .only_if_not_exists(),
            )
            .await
            .unwrap();
        store
            .set_with_expiry("session:abc", b"payload", Duration::from_secs(10))
            .await
            .unwrap();
        store
            .eval(
                &AtomicScript::COMPARE_AND_DELETE,
                &["session:abc.lock"],
                &["token-123"],
            )
            .await
            .unwrap();

        let commands: Vec<String> = log.commands().into_iter().map(|r| r.command).collect();
        assert_eq!(
            commands,
            vec![
                "GET session:abc",
                "SET session:abc.lock PX 30001 NX",
                "SETEX session:abc 10",
                "EVAL compare_and_delete 1 session:abc.lock",
            ]
        );
        assert!(commands.iter().all(|c| !c.contains("token-123")));
        assert!(log.commands().iter().all(|r| r.connection == "default"));
    }

    #[tokio::test]
    async fn records_errors_and_counts() {
        let log = CommandLog::new();
        let store = LoggedStore::new(FlakyStore, "sessions", log.clone());

        store.get("k").await.unwrap();
        let err = store.delete("k").await.unwrap_err();
        assert!(matches!(err, StoreError::Connection(_)));

        assert_eq!(log.command_count(), 2);
        assert_eq!(log.errored_count(), 1);
        let failed = &log.commands()[1];
        assert_eq!(failed.command, "DEL k");
        assert_eq!(
            failed.error.as_deref(),
            Some("connection error: connection refused")
        );

        log.clear();
        assert_eq!(log.command_count(), 0);
        assert_eq!(log.total_time(), Duration::ZERO);
    }
}
