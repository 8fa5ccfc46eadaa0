use thiserror::Error;

/// Errors from key-value store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("connection error: {0}")]
    Connection(String),

    #[error("backend error: {0}")]
    Backend(String),

    #[error("script not supported by this backend: {0}")]
    UnsupportedScript(String),

    #[error("invalid store configuration: {0}")]
    InvalidConfig(String),
}
