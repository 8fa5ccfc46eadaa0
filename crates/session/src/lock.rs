//! Spin-wait session lock with token-guarded release.
//!
//! Acquisition polls `SET <key> <token> NX PX <ttl>` at a fixed interval
//! until it succeeds or the attempt budget runs out. The lock's own TTL is
//! one millisecond longer than the maximum wait, which bounds how long a
//! crashed holder can block others.
//!
//! Release runs [`AtomicScript::COMPARE_AND_DELETE`] so the key is only
//! deleted while it still holds this owner's token. A release after the lock
//! expired and was re-acquired elsewhere is a no-op.

use std::time::Duration;

use sessionlock_store::{AtomicScript, KeyValueStore, SetOptions, StoreError};
use tracing::{debug, warn};
use uuid::Uuid;

/// Timing of the acquire loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockSettings {
    spin_wait_micros: u64,
    max_wait_secs: u64,
}

impl LockSettings {
    /// `spin_wait_micros` below one is raised to one.
    pub fn new(spin_wait_micros: u64, max_wait_secs: u64) -> Self {
        Self {
            spin_wait_micros: spin_wait_micros.max(1),
            max_wait_secs,
        }
    }

    /// Number of `SET NX` attempts: whole polls per second times the wait
    /// budget.
    ///
    /// A spin interval longer than a second spreads the whole budget over
    /// `max_wait / spin` polls instead. At least one attempt is always made.
    pub fn attempts(&self) -> u64 {
        let per_second = 1_000_000 / self.spin_wait_micros;
        let attempts = if per_second > 0 {
            per_second.saturating_mul(self.max_wait_secs)
        } else {
            self.max_wait_secs.saturating_mul(1_000_000) / self.spin_wait_micros
        };
        attempts.max(1)
    }

    /// Pause between failed attempts.
    pub fn spin_wait(&self) -> Duration {
        Duration::from_micros(self.spin_wait_micros)
    }

    /// Expiry of the lock key: the maximum wait plus one millisecond.
    pub fn lock_ttl(&self) -> Duration {
        Duration::from_millis(self.max_wait_secs.saturating_mul(1000).saturating_add(1))
    }
}

/// A held session lock: the lock key and the token proving ownership.
///
/// The only way to obtain one is a successful [`acquire`](Self::acquire), and
/// [`release`](Self::release) consumes it, so holding a `SessionLock` value is
/// the same as believing the lock is held.
#[derive(Debug, PartialEq, Eq)]
pub struct SessionLock {
    key: String,
    token: String,
}

impl SessionLock {
    /// Try to take the lock at `key`, polling until the attempt budget in
    /// `settings` is spent.
    ///
    /// Returns `Ok(None)` when every attempt found the lock taken.
    pub async fn acquire<S>(
        store: &S,
        key: String,
        settings: &LockSettings,
    ) -> Result<Option<Self>, StoreError>
    where
        S: KeyValueStore + ?Sized,
    {
        let token = Uuid::new_v4().to_string();
        let attempts = settings.attempts();
        let options = SetOptions::new()
            .expire(settings.lock_ttl())
            .only_if_not_exists();

        for attempt in 1..=attempts {
            if store.set(&key, token.as_bytes(), options).await? {
                debug!(attempt, "session lock acquired");
                return Ok(Some(Self { key, token }));
            }
            if attempt < attempts {
                tokio::time::sleep(settings.spin_wait()).await;
            }
        }

        warn!(attempts, "session lock not acquired within the wait budget");
        Ok(None)
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    /// Delete the lock key if it still holds this token.
    ///
    /// Returns `true` if the key was deleted and `false` if the lock had
    /// already expired or belongs to someone else. Either way the lock value
    /// is consumed.
    pub async fn release<S>(self, store: &S) -> Result<bool, StoreError>
    where
        S: KeyValueStore + ?Sized,
    {
        let deleted = store
            .eval(
                &AtomicScript::COMPARE_AND_DELETE,
                &[self.key.as_str()],
                &[self.token.as_str()],
            )
            .await?;

        if deleted == 1 {
            debug!("session lock released");
            Ok(true)
        } else {
            debug!("session lock no longer held by this owner, left untouched");
            Ok(false)
        }
    }
}
