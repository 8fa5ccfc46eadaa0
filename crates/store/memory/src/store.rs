use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry as MapEntry;
use tokio::time::Instant;
use tracing::trace;

use sessionlock_store::error::StoreError;
use sessionlock_store::script::AtomicScript;
use sessionlock_store::store::{KeyValueStore, SetOptions, expiry_seconds};

/// A single entry in the in-memory store.
#[derive(Debug, Clone)]
struct Entry {
    value: Vec<u8>,
    expires_at: Option<Instant>,
}

impl Entry {
    /// A TTL too large to represent as a deadline means no expiry.
    fn new(value: &[u8], ttl: Option<Duration>) -> Self {
        Self {
            value: value.to_vec(),
            expires_at: ttl.and_then(|d| Instant::now().checked_add(d)),
        }
    }

    /// Returns `true` if this entry has passed its TTL deadline.
    fn is_expired(&self) -> bool {
        self.expires_at
            .is_some_and(|deadline| Instant::now() >= deadline)
    }
}

/// In-memory [`KeyValueStore`] backed by a [`DashMap`].
///
/// Entries are lazily evicted when touched after their TTL has elapsed.
/// Conditional writes and scripts run under the shard lock of the key, which
/// gives them the same atomicity Redis provides. Time comes from
/// [`tokio::time`], so paused-clock tests can drive expiry.
#[derive(Debug, Default)]
pub struct MemoryStore {
    data: DashMap<String, Entry>,
}

impl MemoryStore {
    /// Create a new, empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Remaining lifetime of a live key; `None` if it is missing, expired or
    /// has no expiry.
    pub fn time_to_live(&self, key: &str) -> Option<Duration> {
        let entry = self.data.get(key)?;
        if entry.is_expired() {
            return None;
        }
        entry
            .expires_at
            .map(|deadline| deadline.saturating_duration_since(Instant::now()))
    }

    /// Number of live keys.
    pub fn len(&self) -> usize {
        self.data.iter().filter(|e| !e.is_expired()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn compare_and_delete(&self, keys: &[&str], args: &[&str]) -> Result<i64, StoreError> {
        let (Some(key), Some(expected)) = (keys.first(), args.first()) else {
            return Err(StoreError::Backend(
                "compare_and_delete expects one key and one argument".into(),
            ));
        };

        let removed = self.data.remove_if(*key, |_, entry| {
            !entry.is_expired() && entry.value == expected.as_bytes()
        });
        Ok(i64::from(removed.is_some()))
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        // Lazy TTL eviction: check and remove if expired.
        if let Some(entry) = self.data.get(key) {
            if entry.is_expired() {
                drop(entry);
                self.data.remove_if(key, |_, entry| entry.is_expired());
                return Ok(None);
            }
            return Ok(Some(entry.value.clone()));
        }

        Ok(None)
    }

    async fn set(
        &self,
        key: &str,
        value: &[u8],
        options: SetOptions,
    ) -> Result<bool, StoreError> {
        let entry = Entry::new(value, options.expire);

        match self.data.entry(key.to_owned()) {
            MapEntry::Occupied(mut occupied) => {
                if options.only_if_not_exists && !occupied.get().is_expired() {
                    return Ok(false);
                }
                occupied.insert(entry);
            }
            MapEntry::Vacant(vacant) => {
                vacant.insert(entry);
            }
        }

        Ok(true)
    }

    async fn set_with_expiry(
        &self,
        key: &str,
        value: &[u8],
        ttl: Duration,
    ) -> Result<bool, StoreError> {
        let ttl = Duration::from_secs(expiry_seconds(ttl));
        self.data.insert(key.to_owned(), Entry::new(value, Some(ttl)));
        Ok(true)
    }

    async fn delete(&self, key: &str) -> Result<u64, StoreError> {
        // Remove, but treat expired entries as "not found".
        match self.data.remove(key) {
            Some((_, entry)) => Ok(u64::from(!entry.is_expired())),
            None => Ok(0),
        }
    }

    async fn eval(
        &self,
        script: &AtomicScript,
        keys: &[&str],
        args: &[&str],
    ) -> Result<i64, StoreError> {
        trace!(script = script.name(), "emulating script");
        if script.name() == AtomicScript::COMPARE_AND_DELETE.name() {
            return self.compare_and_delete(keys, args);
        }
        Err(StoreError::UnsupportedScript(script.name().to_owned()))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    use sessionlock_store::testing::run_store_conformance_tests;

    use super::*;

    #[tokio::test]
    async fn conformance() {
        let store = MemoryStore::new();
        run_store_conformance_tests(&store)
            .await
            .expect("store conformance tests should pass");
    }

    #[tokio::test(start_paused = true)]
    async fn px_expiry_frees_the_key() {
        let store = MemoryStore::new();
        let opts = SetOptions::new()
            .expire(Duration::from_millis(2001))
            .only_if_not_exists();

        assert!(store.set("lock", b"a", opts).await.unwrap());
        assert!(!store.set("lock", b"b", opts).await.unwrap());

        tokio::time::advance(Duration::from_millis(2002)).await;

        assert!(store.get("lock").await.unwrap().is_none());
        assert!(
            store.set("lock", b"b", opts).await.unwrap(),
            "should acquire after TTL expiry"
        );
        assert_eq!(store.get("lock").await.unwrap().as_deref(), Some(&b"b"[..]));
    }

    #[tokio::test(start_paused = true)]
    async fn set_with_expiry_uses_whole_seconds() {
        let store = MemoryStore::new();
        store
            .set_with_expiry("session", b"data", Duration::from_secs(10))
            .await
            .unwrap();
        assert_eq!(store.time_to_live("session"), Some(Duration::from_secs(10)));

        tokio::time::advance(Duration::from_secs(11)).await;
        assert!(store.get("session").await.unwrap().is_none());
        assert!(store.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn compare_and_delete_ignores_expired_entry() {
        let store = MemoryStore::new();
        store
            .set(
                "lock",
                b"token",
                SetOptions::new().expire(Duration::from_millis(10)),
            )
            .await
            .unwrap();
        tokio::time::advance(Duration::from_millis(20)).await;

        let result = store
            .eval(&AtomicScript::COMPARE_AND_DELETE, &["lock"], &["token"])
            .await
            .unwrap();
        assert_eq!(result, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn unrepresentable_ttl_never_expires() {
        let store = MemoryStore::new();
        let opts = SetOptions::new()
            .expire(Duration::from_millis(u64::MAX))
            .only_if_not_exists();
        assert!(store.set("lock", b"a", opts).await.unwrap());
        assert!(store.set_with_expiry("k", b"v", Duration::MAX).await.unwrap());

        assert_eq!(store.time_to_live("lock"), None);
        assert_eq!(store.get("k").await.unwrap().as_deref(), Some(&b"v"[..]));
        assert!(!store.set("lock", b"b", opts).await.unwrap());
    }

    #[tokio::test]
    async fn unknown_script_is_rejected() {
        let store = MemoryStore::new();
        let script = AtomicScript::new("touch", "return redis.call('TOUCH', KEYS[1])");
        let err = store.eval(&script, &["k"], &[]).await.unwrap_err();
        assert!(matches!(err, StoreError::UnsupportedScript(name) if name == "touch"));
    }

    #[tokio::test]
    async fn compare_and_delete_requires_key_and_token() {
        let store = MemoryStore::new();
        let err = store
            .eval(&AtomicScript::COMPARE_AND_DELETE, &["k"], &[])
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Backend(_)));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_nx_has_single_winner() {
        let store = Arc::new(MemoryStore::new());
        let winners = Arc::new(AtomicU32::new(0));

        let mut handles = Vec::new();
        for i in 0..16 {
            let store = Arc::clone(&store);
            let winners = Arc::clone(&winners);
            handles.push(tokio::spawn(async move {
                let token = format!("owner-{i}");
                let opts = SetOptions::new()
                    .expire(Duration::from_secs(30))
                    .only_if_not_exists();
                if store.set("contended", token.as_bytes(), opts).await.unwrap() {
                    winners.fetch_add(1, Ordering::SeqCst);
                }
            }));
        }
        for h in handles {
            h.await.expect("task should not panic");
        }

        assert_eq!(winners.load(Ordering::SeqCst), 1, "exactly one NX set wins");
    }
}
