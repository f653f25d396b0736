//! Time-indexed revocation lists.
//!
//! A revocation list maps a target public key (or `*` for every target) to
//! a cutoff in Unix seconds. Any token for that target issued at or before
//! the cutoff is considered revoked. Tokens issued later are unaffected,
//! which is how a re-issued credential becomes valid again.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Target key that applies a revocation to every target.
pub const ALL_TARGETS: &str = "*";

/// Mapping of revoked target to its cutoff (Unix seconds).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RevocationList(BTreeMap<String, i64>);

impl RevocationList {
    /// Create an empty revocation list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Revoke `target` for everything issued at or before `cutoff`.
    ///
    /// An existing entry is overwritten unconditionally, even if the new
    /// cutoff is earlier. Returns the previous cutoff.
    pub fn revoke(&mut self, target: impl Into<String>, cutoff: i64) -> Option<i64> {
        self.0.insert(target.into(), cutoff)
    }

    /// Revoke every target issued at or before `cutoff`.
    pub fn revoke_all(&mut self, cutoff: i64) -> Option<i64> {
        self.revoke(ALL_TARGETS, cutoff)
    }

    /// Check whether a token for `target` issued at `issued_at` is revoked.
    ///
    /// The specific entry and the `*` entry are checked independently;
    /// satisfying either cutoff is enough.
    pub fn is_revoked_at(&self, target: &str, issued_at: i64) -> bool {
        let covered = |key: &str| self.0.get(key).is_some_and(|&cutoff| issued_at <= cutoff);
        covered(target) || covered(ALL_TARGETS)
    }

    /// Remove the entry for `target`. Clearing an absent target is a no-op.
    pub fn clear(&mut self, target: &str) -> Option<i64> {
        self.0.remove(target)
    }

    /// The cutoff recorded for `target`, ignoring `*`.
    pub fn cutoff(&self, target: &str) -> Option<i64> {
        self.0.get(target).copied()
    }

    /// Iterate over `(target, cutoff)` in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, i64)> {
        self.0.iter().map(|(k, v)| (k.as_str(), *v))
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the list is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}
