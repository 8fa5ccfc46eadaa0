use sessionlock_session::SessionError;
use sessionlock_store::StoreError;
use thiserror::Error;

/// Errors raised while loading configuration or building clients from it.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read configuration: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("no clients configured")]
    NoClients,

    /// The DSN of client `alias` is not a usable Redis target.
    #[error("client `{alias}` has an invalid DSN")]
    InvalidDsn { alias: String },

    /// A reference to a client alias that is not configured.
    #[error("unknown client `{0}`")]
    UnknownClient(String),

    #[error("no [session] section configured")]
    MissingSession,

    #[error(transparent)]
    Session(#[from] SessionError),

    /// Building the store for client `alias` failed.
    #[error("client `{alias}`: {source}")]
    Store {
        alias: String,
        #[source]
        source: StoreError,
    },
}
