//! Error types for the permissions module.

use thiserror::Error;

/// Errors that can occur while editing permissions or subjects.
#[derive(Debug, Error)]
pub enum PermsError {
    /// A response permission edit both sets and removes the permission.
    #[error("response permissions cannot be set and removed in the same edit")]
    ResponseConflict,

    /// A subject pattern is malformed.
    #[error("invalid subject {subject:?}: {reason}")]
    InvalidSubject { subject: String, reason: String },
}

/// Result type for permission operations.
pub type Result<T> = std::result::Result<T, PermsError>;
