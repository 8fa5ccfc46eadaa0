//! Configuration-driven setup for sessionlock.
//!
//! A TOML file names Redis clients by alias and configures the session
//! handler:
//!
//! ```
//! use sessionlock::SessionLockConfig;
//!
//! let config: SessionLockConfig = r#"
//!     [clients.default]
//!     dsn = "redis://localhost:6379/2"
//!
//!     [session]
//!     client = "default"
//!     ttl = 1440
//! "#
//! .parse()
//! .unwrap();
//!
//! assert_eq!(config.clients["default"].dsn.database(), Some(2));
//! ```
//!
//! [`ClientRegistry::from_config`] turns the file into one store per alias,
//! and [`SessionHandlerFactory`] hands out a fresh
//! [`SessionHandler`](sessionlock_session::SessionHandler) per request.

pub mod config;
pub mod error;
pub mod registry;
pub mod telemetry;

pub use config::{ClientConfig, ClientOptions, LoggingConfig, SessionLockConfig, SessionSection};
pub use error::ConfigError;
pub use registry::{ClientRegistry, SessionHandlerFactory, SharedStore};
