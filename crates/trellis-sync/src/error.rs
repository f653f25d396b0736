//! Error types for the sync module.

use thiserror::Error;

/// Errors that can occur during push or pull.
#[derive(Debug, Error)]
pub enum SyncError {
    /// The server could not be reached or failed mid-request.
    #[error("transport error: {0}")]
    Transport(String),

    /// No response within the per-attempt timeout.
    #[error("timeout: {0}")]
    Timeout(String),

    /// The server has no token for the key.
    #[error("not found on server: {0}")]
    NotFound(String),

    /// The pulled token does not describe the requested entity.
    #[error("unexpected token: {0}")]
    UnexpectedToken(String),

    /// The pulled token was issued before the local one.
    #[error("pulled token for {entity} is older than the local one (issued {pulled}, local {local})")]
    Stale {
        entity: String,
        pulled: i64,
        local: i64,
    },

    /// Local store operation failed.
    #[error("store error: {0}")]
    Store(#[from] trellis_store::StoreError),

    /// Token decoding or verification failed.
    #[error("token error: {0}")]
    Core(#[from] trellis_core::CoreError),
}

impl SyncError {
    /// Whether another attempt may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, SyncError::Transport(_) | SyncError::Timeout(_))
    }
}

/// Result type for sync operations.
pub type Result<T> = std::result::Result<T, SyncError>;
