//! Error types for the store module.

use thiserror::Error;

use trellis_core::CoreError;

/// Errors that can occur during store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A record with this name already exists.
    #[error("already exists: {0}")]
    AlreadyExists(String),

    /// No record with this name.
    #[error("not found: {0}")]
    NotFound(String),

    /// The stored record changed since it was read.
    #[error("conflict on {entity}: expected jti {expected}, found {found}")]
    Conflict {
        entity: String,
        expected: String,
        found: String,
    },

    /// Entity name cannot be used as a path component.
    #[error("invalid name {name:?}: {reason}")]
    InvalidName { name: String, reason: String },

    /// A stored record does not match where it is stored.
    #[error("invalid data: {0}")]
    InvalidData(String),

    /// Context or marker file could not be (de)serialized.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Store was written by a newer layout version.
    #[error("unsupported store layout version {found} (supported: {supported})")]
    UnsupportedLayout { found: u32, supported: u32 },

    /// Claim or key decoding failed.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// Blocking task failed to complete.
    #[error("background task failed: {0}")]
    Task(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
