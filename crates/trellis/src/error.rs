//! Error types for trust-chain actions.

use thiserror::Error;

use trellis_core::CoreError;
use trellis_perms::PermsError;
use trellis_store::StoreError;
use trellis_sync::SyncError;

/// Errors that can occur during Trellis actions.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Sync(#[from] SyncError),

    #[error(transparent)]
    Permission(#[from] PermsError),

    /// No operator or account given and none selected.
    #[error("no {0} selected")]
    NoSelection(&'static str),

    /// An argument could not be parsed.
    #[error("invalid {what}: {reason}")]
    InvalidArgument { what: &'static str, reason: String },

    /// A blocking task panicked or was cancelled.
    #[error("task failed: {0}")]
    Task(String),
}

/// Result type for Trellis actions.
pub type Result<T> = std::result::Result<T, Error>;

/// Coarse classification of an [`Error`], for callers that branch on the
/// kind of failure rather than its source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    KeyMismatch,
    KeyNotFound,
    NoSigningKey,
    AlreadyExists,
    NotFound,
    SignatureInvalid,
    IssuerMismatch,
    ValidationFailed,
    /// The stored record changed since it was read.
    Conflict,
    Io,
    Sync,
}

impl Error {
    pub(crate) fn invalid(what: &'static str, reason: impl Into<String>) -> Self {
        Error::InvalidArgument {
            what,
            reason: reason.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Core(e) => core_kind(e),
            Error::Store(e) => store_kind(e),
            Error::Sync(e) => sync_kind(e),
            Error::Permission(_) | Error::NoSelection(_) | Error::InvalidArgument { .. } => {
                ErrorKind::ValidationFailed
            }
            Error::Task(_) => ErrorKind::Io,
        }
    }
}

fn core_kind(e: &CoreError) -> ErrorKind {
    match e {
        CoreError::KeyMismatch { .. } => ErrorKind::KeyMismatch,
        CoreError::KeyNotFound(_) => ErrorKind::KeyNotFound,
        CoreError::NoSigningKey(_) => ErrorKind::NoSigningKey,
        CoreError::SignatureInvalid => ErrorKind::SignatureInvalid,
        CoreError::IssuerMismatch { .. } => ErrorKind::IssuerMismatch,
        CoreError::ValidationFailed(_)
        | CoreError::InvalidKey(_)
        | CoreError::MalformedToken(_)
        | CoreError::EncodingError(_)
        | CoreError::DecodingError(_) => ErrorKind::ValidationFailed,
    }
}

fn store_kind(e: &StoreError) -> ErrorKind {
    match e {
        StoreError::AlreadyExists(_) => ErrorKind::AlreadyExists,
        StoreError::NotFound(_) => ErrorKind::NotFound,
        StoreError::Conflict { .. } => ErrorKind::Conflict,
        StoreError::InvalidName { .. } | StoreError::InvalidData(_) => ErrorKind::ValidationFailed,
        StoreError::Core(e) => core_kind(e),
        StoreError::Serialization(_)
        | StoreError::UnsupportedLayout { .. }
        | StoreError::Task(_)
        | StoreError::Io(_) => ErrorKind::Io,
    }
}

fn sync_kind(e: &SyncError) -> ErrorKind {
    match e {
        SyncError::NotFound(_) => ErrorKind::NotFound,
        SyncError::Store(e) => store_kind(e),
        SyncError::Core(e) => core_kind(e),
        SyncError::Stale { .. } => ErrorKind::Conflict,
        SyncError::Transport(_) | SyncError::Timeout(_) | SyncError::UnexpectedToken(_) => {
            ErrorKind::Sync
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use trellis_core::Role;

    #[test]
    fn test_kind_sees_through_wrapping() {
        let nested = Error::Store(StoreError::Core(CoreError::KeyMismatch {
            expected: Role::Account,
            found: Role::User,
        }));
        assert_eq!(nested.kind(), ErrorKind::KeyMismatch);

        let sync = Error::Sync(SyncError::Store(StoreError::AlreadyExists("A".into())));
        assert_eq!(sync.kind(), ErrorKind::AlreadyExists);

        let stale = Error::Sync(SyncError::Stale {
            entity: "O/A".into(),
            pulled: 5,
            local: 10,
        });
        assert_eq!(stale.kind(), ErrorKind::Conflict);
    }

    #[test]
    fn test_display_is_source_message() {
        let err = Error::from(CoreError::SignatureInvalid);
        assert_eq!(err.to_string(), CoreError::SignatureInvalid.to_string());
        assert_eq!(Error::NoSelection("account").to_string(), "no account selected");
    }
}
