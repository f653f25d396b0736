//! # Trellis Permissions
//!
//! Permission and revocation state carried inside signed claims.
//!
//! ## Overview
//!
//! This crate has no knowledge of keys or signatures. It models the
//! mutable parts of a claim draft that are edited before signing:
//!
//! - **PermissionSet**: allow/deny subject patterns for publish and
//!   subscribe, plus an optional response permission
//! - **RevocationList**: per-target cutoff timestamps with an
//!   inclusive "issued at or before" check
//! - **Subject patterns**: dot-separated tokens with `*` and `>` wildcards
//!
//! ## Canonical Form
//!
//! Every list is kept sorted and deduplicated after each mutation, so a
//! claim that is re-signed without semantic changes encodes to the same
//! bytes.
//!
//! ## Usage
//!
//! ```rust
//! use trellis_perms::{Direction, Mode, PermissionSet, RevocationList};
//!
//! let mut perms = PermissionSet::default();
//! perms.add(Direction::PubSub, Mode::Allow, ["orders.>", "billing.*"]);
//! assert!(perms.allows(Direction::Sub, "orders.>"));
//!
//! let mut revocations = RevocationList::new();
//! revocations.revoke_all(1000);
//! assert!(revocations.is_revoked_at("ANY", 999));
//! assert!(!revocations.is_revoked_at("ANY", 1001));
//! ```

pub mod error;
pub mod permission;
pub mod revocation;
pub mod subject;

pub use error::{PermsError, Result};
pub use permission::{
    Direction, Mode, Permission, PermissionSet, ResponseEdit, ResponsePermission, StringList,
};
pub use revocation::{RevocationList, ALL_TARGETS};
pub use subject::{is_contained_in, validate_subject};
