use sessionlock_store::StoreError;
use thiserror::Error;

/// Errors from session handler operations.
///
/// Lock contention is reported through
/// [`ReadOutcome`](crate::ReadOutcome), never as an error.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("invalid session configuration: {0}")]
    InvalidConfig(String),
}
