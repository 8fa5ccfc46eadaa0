//! Key-value store abstraction for sessionlock.
//!
//! [`KeyValueStore`] is the narrow capability the session handler needs from
//! Redis: plain reads and writes, conditional writes with expiry, deletes, and
//! execution of a short server-side script. Backends live in separate crates
//! (`sessionlock-store-memory`, `sessionlock-store-redis`) and are checked
//! against the shared suite in [`testing`].

pub mod error;
pub mod logged;
pub mod script;
pub mod store;
pub mod testing;

pub use error::StoreError;
pub use logged::{CommandLog, CommandRecord, LoggedStore};
pub use script::AtomicScript;
pub use store::{KeyValueStore, SetOptions, expiry_seconds};
