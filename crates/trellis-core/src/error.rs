//! Error types for Trellis Core.

use thiserror::Error;

use crate::keys::Role;

/// Core errors that can occur while handling keys, claims, and tokens.
#[derive(Debug, Error)]
pub enum CoreError {
    /// A key of one role was supplied where another role is required.
    #[error("key mismatch: expected {expected} key, got {found} key")]
    KeyMismatch { expected: Role, found: Role },

    /// An explicitly referenced key could not be found.
    #[error("key not found: {0}")]
    KeyNotFound(String),

    /// Only a public key is available where a private key is required.
    #[error("no signing key: private key for {0} is not available")]
    NoSigningKey(String),

    /// Token signature does not verify against its issuer.
    #[error("invalid signature")]
    SignatureInvalid,

    /// Token was signed by a different key than expected.
    #[error("issuer mismatch: expected {expected}, got {found}")]
    IssuerMismatch { expected: String, found: String },

    /// Claim violates a structural rule.
    #[error("validation failed: {0}")]
    ValidationFailed(String),

    /// Key text is malformed (bad alphabet, length, prefix, or checksum).
    #[error("invalid key: {0}")]
    InvalidKey(String),

    /// Token text is not a well-formed token.
    #[error("malformed token: {0}")]
    MalformedToken(String),

    #[error("encoding error: {0}")]
    EncodingError(String),

    #[error("decoding error: {0}")]
    DecodingError(String),
}

impl From<trellis_perms::PermsError> for CoreError {
    fn from(e: trellis_perms::PermsError) -> Self {
        CoreError::ValidationFailed(e.to_string())
    }
}

/// Result type for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;
