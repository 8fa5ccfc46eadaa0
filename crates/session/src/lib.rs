//! Session storage with distributed session locking.
//!
//! A [`SessionHandler`] serves one request's session lifecycle
//! (`open` → `read` → `write` → `close`) against any
//! [`KeyValueStore`](sessionlock_store::KeyValueStore). With locking enabled,
//! `read` first acquires a per-session lock by polling `SET NX PX` with a
//! random token, and `close`/`destroy` release it with an atomic
//! compare-and-delete, so a late release can never remove a lock that expired
//! and was taken over by another request.
//!
//! Lock contention is not an error: when the lock cannot be acquired within
//! the configured wait, `read` returns [`ReadOutcome::LockUnavailable`].

pub mod config;
pub mod error;
pub mod handler;
pub mod lock;

pub use config::SessionConfig;
pub use error::SessionError;
pub use handler::{HandlerState, ReadOutcome, SessionHandler};
pub use lock::{LockSettings, SessionLock};
