//! Store construction from configuration.

use std::collections::HashMap;
use std::sync::Arc;

use sessionlock_session::{SessionConfig, SessionError, SessionHandler};
use sessionlock_store::{CommandLog, KeyValueStore, LoggedStore};
use sessionlock_store_redis::RedisStore;
use tracing::{debug, info};

use crate::config::{ClientConfig, SessionLockConfig, SessionSection};
use crate::error::ConfigError;

/// A store handle shared between handlers.
pub type SharedStore = Arc<dyn KeyValueStore>;

/// One store per configured client alias.
///
/// Clients marked `persistent` whose DSNs have the same persistent id share
/// a single connection pool; the pool settings of the first such client
/// (in alias order) apply. Clients with `logging` enabled record every
/// command in the registry's [`CommandLog`].
pub struct ClientRegistry {
    clients: HashMap<String, SharedStore>,
    session: Option<SessionSection>,
    command_log: CommandLog,
    pool_count: usize,
}

impl ClientRegistry {
    /// Build every client in `config`.
    ///
    /// Connections are opened lazily, so this succeeds without a reachable
    /// server.
    pub fn from_config(config: &SessionLockConfig) -> Result<Self, ConfigError> {
        config.validate()?;

        let command_log = CommandLog::new();
        let mut persistent_pools: HashMap<String, RedisStore> = HashMap::new();
        let mut clients = HashMap::with_capacity(config.clients.len());
        let mut pool_count = 0;

        let mut aliases: Vec<&String> = config.clients.keys().collect();
        aliases.sort();

        for alias in aliases {
            let client = &config.clients[alias];
            let (store, new_pool) = build_store(alias, client, &mut persistent_pools)?;
            if new_pool {
                pool_count += 1;
            }

            let store: SharedStore = if client.logging {
                Arc::new(LoggedStore::new(store, alias.as_str(), command_log.clone()))
            } else {
                Arc::new(store)
            };

            info!(
                alias = %alias,
                persistent_id = %client.dsn.persistent_id(),
                logging = client.logging,
                "redis client registered"
            );
            clients.insert(alias.clone(), store);
        }

        Ok(Self {
            clients,
            session: config.session.clone(),
            command_log,
            pool_count,
        })
    }

    /// Store registered under `alias`.
    pub fn client(&self, alias: &str) -> Result<SharedStore, ConfigError> {
        self.clients
            .get(alias)
            .cloned()
            .ok_or_else(|| ConfigError::UnknownClient(alias.to_owned()))
    }

    /// Register `store` under `alias`, replacing any existing client.
    pub fn register(&mut self, alias: impl Into<String>, store: SharedStore) {
        self.clients.insert(alias.into(), store);
    }

    /// Configured aliases in sorted order.
    pub fn aliases(&self) -> Vec<&str> {
        let mut aliases: Vec<&str> = self.clients.keys().map(String::as_str).collect();
        aliases.sort_unstable();
        aliases
    }

    /// Commands executed by clients with logging enabled.
    pub fn command_log(&self) -> &CommandLog {
        &self.command_log
    }

    /// Number of distinct connection pools created.
    pub fn pool_count(&self) -> usize {
        self.pool_count
    }

    /// Handler factory for the `[session]` section.
    pub fn session_handlers(&self) -> Result<SessionHandlerFactory, ConfigError> {
        let section = self.session.as_ref().ok_or(ConfigError::MissingSession)?;
        let store = self.client(&section.client)?;
        Ok(SessionHandlerFactory::new(store, section.handler.clone())?)
    }
}

fn build_store(
    alias: &str,
    client: &ClientConfig,
    persistent_pools: &mut HashMap<String, RedisStore>,
) -> Result<(RedisStore, bool), ConfigError> {
    let into_config_error = |source| ConfigError::Store {
        alias: alias.to_owned(),
        source,
    };

    if !client.options.persistent {
        let store = RedisStore::new(&client.redis_config()).map_err(into_config_error)?;
        return Ok((store, true));
    }

    let persistent_id = client.dsn.persistent_id();
    if let Some(shared) = persistent_pools.get(&persistent_id) {
        debug!(alias, persistent_id = %persistent_id, "reusing persistent connection pool");
        return Ok((shared.with_key_prefix(&client.options.prefix), false));
    }

    let store = RedisStore::new(&client.redis_config()).map_err(into_config_error)?;
    persistent_pools.insert(persistent_id, store.with_key_prefix(""));
    Ok((store, true))
}

/// Creates one [`SessionHandler`] per request over a shared store.
#[derive(Clone)]
pub struct SessionHandlerFactory {
    store: SharedStore,
    config: SessionConfig,
}

impl SessionHandlerFactory {
    /// # Errors
    ///
    /// Returns [`SessionError::InvalidConfig`] if `config` fails validation.
    pub fn new(store: SharedStore, config: SessionConfig) -> Result<Self, SessionError> {
        config.validate()?;
        Ok(Self { store, config })
    }

    /// A fresh handler in the idle state.
    pub fn handler(&self) -> Result<SessionHandler<SharedStore>, SessionError> {
        SessionHandler::new(Arc::clone(&self.store), &self.config)
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }
}
