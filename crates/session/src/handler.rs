use std::mem;
use std::time::Duration;

use sessionlock_store::{KeyValueStore, SetOptions};
use tracing::{debug, instrument, warn};

use crate::config::SessionConfig;
use crate::error::SessionError;
use crate::lock::{LockSettings, SessionLock};

/// Lifecycle state of a [`SessionHandler`].
#[derive(Debug, Default, PartialEq, Eq)]
pub enum HandlerState {
    #[default]
    Idle,
    Opened,
    /// The handler holds the session lock.
    Locked(SessionLock),
}

/// Result of [`SessionHandler::read`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadOutcome {
    /// Stored session payload; empty when the session does not exist.
    Data(Vec<u8>),
    /// The session lock stayed taken for the whole wait budget.
    LockUnavailable,
}

impl ReadOutcome {
    pub fn into_data(self) -> Option<Vec<u8>> {
        match self {
            Self::Data(data) => Some(data),
            Self::LockUnavailable => None,
        }
    }

    pub fn is_lock_unavailable(&self) -> bool {
        matches!(self, Self::LockUnavailable)
    }
}

/// Session storage handler for one request.
///
/// Session data lives at `{prefix}{session_id}`, the lock at
/// `{prefix}{session_id}.lock`. A handler is not shared between concurrent
/// requests; mutual exclusion across requests comes from the lock key.
pub struct SessionHandler<S> {
    store: S,
    prefix: String,
    ttl: u64,
    locking: bool,
    lock_settings: LockSettings,
    state: HandlerState,
}

impl<S: KeyValueStore> SessionHandler<S> {
    /// Build a handler over `store`.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::InvalidConfig`] if `config` fails validation.
    pub fn new(store: S, config: &SessionConfig) -> Result<Self, SessionError> {
        config.validate()?;
        Ok(Self {
            store,
            prefix: config.prefix.clone(),
            ttl: config.effective_ttl(),
            locking: config.locking,
            lock_settings: config.lock_settings(),
            state: HandlerState::Idle,
        })
    }

    /// Start a session. Always succeeds.
    pub fn open(&mut self) -> bool {
        if self.state == HandlerState::Idle {
            self.state = HandlerState::Opened;
        }
        true
    }

    /// Load the session payload, acquiring the session lock first when
    /// locking is enabled and not already held.
    ///
    /// A missing session reads as empty data. If the lock cannot be acquired
    /// the payload is not read and [`ReadOutcome::LockUnavailable`] is
    /// returned.
    #[instrument(skip_all, fields(prefix = %self.prefix, locking = self.locking))]
    pub async fn read(&mut self, session_id: &str) -> Result<ReadOutcome, SessionError> {
        if self.locking && !self.is_locked() {
            let lock_key = self.redis_key(&format!("{session_id}.lock"));
            match SessionLock::acquire(&self.store, lock_key, &self.lock_settings).await? {
                Some(lock) => self.state = HandlerState::Locked(lock),
                None => return Ok(ReadOutcome::LockUnavailable),
            }
        } else if self.state == HandlerState::Idle {
            self.state = HandlerState::Opened;
        }

        let data = self.store.get(&self.redis_key(session_id)).await?;
        Ok(ReadOutcome::Data(data.unwrap_or_default()))
    }

    /// Store the session payload, with the handler's TTL when it is non-zero.
    #[instrument(skip_all, fields(prefix = %self.prefix, ttl = self.ttl))]
    pub async fn write(&mut self, session_id: &str, data: &[u8]) -> Result<bool, SessionError> {
        let key = self.redis_key(session_id);
        if self.ttl > 0 {
            self.store
                .set_with_expiry(&key, data, Duration::from_secs(self.ttl))
                .await?;
        } else {
            self.store.set(&key, data, SetOptions::new()).await?;
        }
        debug!(bytes = data.len(), "session written");
        Ok(true)
    }

    /// Delete the session payload and release the lock if held.
    ///
    /// The lock is released even when the delete fails; the delete error is
    /// returned after the release.
    #[instrument(skip_all, fields(prefix = %self.prefix))]
    pub async fn destroy(&mut self, session_id: &str) -> Result<bool, SessionError> {
        let deleted = self.store.delete(&self.redis_key(session_id)).await;
        let closed = self.close().await;
        deleted?;
        closed
    }

    /// End the session, releasing the lock if held.
    ///
    /// The handler forgets the lock before the release runs, so after this
    /// call it is unlocked even if the release itself failed.
    #[instrument(skip_all, fields(prefix = %self.prefix))]
    pub async fn close(&mut self) -> Result<bool, SessionError> {
        if let HandlerState::Locked(lock) = mem::take(&mut self.state) {
            lock.release(&self.store).await?;
        }
        Ok(true)
    }

    /// Expired sessions are removed by the store's own key expiry.
    pub fn gc(&self, _max_lifetime: u64) -> bool {
        true
    }
}

impl<S> SessionHandler<S> {
    /// Override the TTL, in seconds, used by subsequent writes.
    pub fn set_ttl(&mut self, ttl: u64) {
        self.ttl = ttl;
    }

    pub fn ttl(&self) -> u64 {
        self.ttl
    }

    pub fn is_locked(&self) -> bool {
        matches!(self.state, HandlerState::Locked(_))
    }

    /// Token of the held lock, if any.
    pub fn lock_token(&self) -> Option<&str> {
        match &self.state {
            HandlerState::Locked(lock) => Some(lock.token()),
            _ => None,
        }
    }

    pub fn state(&self) -> &HandlerState {
        &self.state
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    fn redis_key(&self, key: &str) -> String {
        if self.prefix.is_empty() {
            key.to_owned()
        } else {
            format!("{}{key}", self.prefix)
        }
    }
}

impl<S> Drop for SessionHandler<S> {
    fn drop(&mut self) {
        if let HandlerState::Locked(lock) = &self.state {
            warn!(
                lock_key = %lock.key(),
                lock_ttl = ?self.lock_settings.lock_ttl(),
                "session handler dropped while holding its lock, the lock will expire on its own"
            );
        }
    }
}
