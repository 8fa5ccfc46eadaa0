//! Redis backend for sessionlock.
//!
//! This crate provides a Redis-backed implementation of the
//! [`KeyValueStore`] trait from `sessionlock-store`, built from a parsed
//! [`RedisDsn`].
//!
//! # Features
//!
//! - **DSN driven**: host, port, unix socket, database and password all come
//!   from the DSN; placeholders must be resolved before a store is built.
//! - **Atomic primitives**: `SET NX PX` for conditional writes and Lua scripts
//!   (`EVALSHA` with `EVAL` fallback) for compare-and-delete.
//! - **Connection pooling**: Uses `deadpool-redis` for connection management.
//!
//! # Lock Consistency
//!
//! Mutual exclusion built on this store is only as strong as the Redis
//! deployment: a single instance gives full mutual exclusion, while a lock may
//! be lost during a Sentinel or Cluster failover.
//!
//! # Example
//!
//! ```ignore
//! use sessionlock_dsn::RedisDsn;
//! use sessionlock_store_redis::{RedisConfig, RedisStore};
//!
//! let config = RedisConfig::new(RedisDsn::parse("redis://localhost:6379/1"));
//! let store = RedisStore::new(&config)?;
//! ```
//!
//! [`KeyValueStore`]: sessionlock_store::KeyValueStore
//! [`RedisDsn`]: sessionlock_dsn::RedisDsn

mod config;
mod store;

pub use config::RedisConfig;
pub use store::RedisStore;
