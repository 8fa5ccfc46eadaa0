use serde::Deserialize;

use crate::error::SessionError;
use crate::lock::LockSettings;

/// Lock wait used when none is configured, in seconds.
pub const DEFAULT_LOCK_MAX_WAIT: u64 = 30;

/// Pause between lock attempts when none is configured, in microseconds.
pub const DEFAULT_SPIN_LOCK_WAIT: u64 = 150_000;

/// Session handler settings.
///
/// # Example
///
/// ```toml
/// prefix = "session"
/// ttl = 1440
/// cookie_lifetime = 0
/// locking = true
/// spin_lock_wait = 150000
/// lock_max_wait = 30
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SessionConfig {
    /// Prepended verbatim to session and lock keys. Empty means no prefix.
    #[serde(default = "default_prefix")]
    pub prefix: String,

    /// Session lifetime in seconds (`gc_maxlifetime`). `0` stores without
    /// expiry unless `cookie_lifetime` is larger.
    #[serde(default)]
    pub ttl: u64,

    /// Session cookie lifetime in seconds; used as TTL when larger than `ttl`.
    #[serde(default)]
    pub cookie_lifetime: u64,

    /// Whether reads acquire the per-session lock.
    #[serde(default = "default_locking")]
    pub locking: bool,

    /// Microseconds to wait between lock attempts.
    #[serde(default = "default_spin_lock_wait")]
    pub spin_lock_wait: u64,

    /// Seconds to keep trying for the lock; also bounds the lock's own TTL.
    /// `0` or absent selects [`DEFAULT_LOCK_MAX_WAIT`].
    #[serde(default)]
    pub lock_max_wait: Option<u64>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            prefix: default_prefix(),
            ttl: 0,
            cookie_lifetime: 0,
            locking: default_locking(),
            spin_lock_wait: default_spin_lock_wait(),
            lock_max_wait: None,
        }
    }
}

fn default_prefix() -> String {
    "session".to_owned()
}

fn default_locking() -> bool {
    true
}

fn default_spin_lock_wait() -> u64 {
    DEFAULT_SPIN_LOCK_WAIT
}

impl SessionConfig {
    /// TTL applied to session writes: the larger of `ttl` and
    /// `cookie_lifetime`.
    pub fn effective_ttl(&self) -> u64 {
        self.ttl.max(self.cookie_lifetime)
    }

    /// Resolved lock wait in seconds.
    pub fn lock_max_wait(&self) -> u64 {
        match self.lock_max_wait {
            Some(secs) if secs > 0 => secs,
            _ => DEFAULT_LOCK_MAX_WAIT,
        }
    }

    pub fn lock_settings(&self) -> LockSettings {
        LockSettings::new(self.spin_lock_wait, self.lock_max_wait())
    }

    /// Reject settings the lock loop cannot work with.
    pub fn validate(&self) -> Result<(), SessionError> {
        if self.spin_lock_wait == 0 {
            return Err(SessionError::InvalidConfig(
                "spin_lock_wait must be at least one microsecond".into(),
            ));
        }
        Ok(())
    }
}
