//! Publish/subscribe permission sets.
//!
//! A user claim carries four independent pattern lists: allow and deny for
//! both publish and subscribe. Patterns are stored verbatim; the message bus
//! interprets them, not this crate.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{PermsError, Result};

/// A sorted, deduplicated list of strings.
///
/// Used for subject patterns, tags, and source networks. Every mutation
/// leaves the list in canonical (sorted) order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "Vec<String>", into = "Vec<String>")]
pub struct StringList(Vec<String>);

impl StringList {
    /// Create an empty list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add items, skipping those already present.
    ///
    /// Returns the number of items actually inserted.
    pub fn add<I, S>(&mut self, items: I) -> usize
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut added = 0;
        for item in items {
            let item = item.into();
            if let Err(pos) = self.0.binary_search(&item) {
                self.0.insert(pos, item);
                added += 1;
            }
        }
        added
    }

    /// Remove items. Absent items are ignored.
    ///
    /// Returns the number of items actually removed.
    pub fn remove<I, S>(&mut self, items: I) -> usize
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut removed = 0;
        for item in items {
            if let Ok(pos) = self.0.binary_search_by(|probe| probe.as_str().cmp(item.as_ref())) {
                self.0.remove(pos);
                removed += 1;
            }
        }
        removed
    }

    /// Check membership.
    pub fn contains(&self, item: &str) -> bool {
        self.0
            .binary_search_by(|probe| probe.as_str().cmp(item))
            .is_ok()
    }

    /// Iterate in canonical order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the list is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Borrow the entries as a slice.
    pub fn as_slice(&self) -> &[String] {
        &self.0
    }
}

impl From<Vec<String>> for StringList {
    fn from(mut items: Vec<String>) -> Self {
        items.sort();
        items.dedup();
        Self(items)
    }
}

impl From<StringList> for Vec<String> {
    fn from(list: StringList) -> Self {
        list.0
    }
}

impl<S: Into<String>> FromIterator<S> for StringList {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut list = Self::new();
        list.add(iter);
        list
    }
}

/// Which side of a connection a permission applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    /// Publishing to subjects.
    Pub,
    /// Subscribing to subjects.
    Sub,
    /// Shorthand for both; expands into two independent edits.
    PubSub,
}

impl Direction {
    /// The concrete directions this value stands for.
    pub fn expand(self) -> &'static [Direction] {
        match self {
            Direction::Pub => &[Direction::Pub],
            Direction::Sub => &[Direction::Sub],
            Direction::PubSub => &[Direction::Pub, Direction::Sub],
        }
    }
}

/// Whether a pattern is granted or refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Mode {
    Allow,
    Deny,
}

/// Allow and deny lists for one direction.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Permission {
    #[serde(default, skip_serializing_if = "StringList::is_empty")]
    pub allow: StringList,

    #[serde(default, skip_serializing_if = "StringList::is_empty")]
    pub deny: StringList,
}

impl Permission {
    /// The list for a mode.
    pub fn list(&self, mode: Mode) -> &StringList {
        match mode {
            Mode::Allow => &self.allow,
            Mode::Deny => &self.deny,
        }
    }

    fn list_mut(&mut self, mode: Mode) -> &mut StringList {
        match mode {
            Mode::Allow => &mut self.allow,
            Mode::Deny => &mut self.deny,
        }
    }

    /// Whether both lists are empty.
    pub fn is_empty(&self) -> bool {
        self.allow.is_empty() && self.deny.is_empty()
    }
}

/// Permission to publish to reply subjects of received requests.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponsePermission {
    /// Maximum number of responses per request (0 = unlimited).
    pub max_msgs: u32,

    /// How long the permission lasts after a request arrives, in
    /// milliseconds (0 = unbounded).
    pub expires_ms: u64,
}

impl ResponsePermission {
    /// Create a response permission.
    pub fn new(max_msgs: u32, ttl: Option<Duration>) -> Self {
        Self {
            max_msgs,
            expires_ms: ttl.map(|d| d.as_millis() as u64).unwrap_or(0),
        }
    }

    /// The TTL, if bounded.
    pub fn ttl(&self) -> Option<Duration> {
        (self.expires_ms > 0).then(|| Duration::from_millis(self.expires_ms))
    }
}

/// A requested change to the response permission.
///
/// Collected from the caller before the draft is touched; `validate`
/// rejects contradictory requests.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResponseEdit {
    /// Replace the response permission with this value.
    pub set: Option<ResponsePermission>,
    /// Clear the response permission.
    pub remove: bool,
}

impl ResponseEdit {
    /// An edit that sets the permission.
    pub fn set(max_msgs: u32, ttl: Option<Duration>) -> Self {
        Self {
            set: Some(ResponsePermission::new(max_msgs, ttl)),
            remove: false,
        }
    }

    /// An edit that clears the permission.
    pub fn remove() -> Self {
        Self {
            set: None,
            remove: true,
        }
    }

    /// Reject an edit that both sets and removes.
    pub fn validate(&self) -> Result<()> {
        if self.set.is_some() && self.remove {
            return Err(PermsError::ResponseConflict);
        }
        Ok(())
    }

    /// Whether this edit changes anything.
    pub fn is_noop(&self) -> bool {
        self.set.is_none() && !self.remove
    }
}

/// The full publish/subscribe permission model of a user.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionSet {
    #[serde(rename = "pub", default, skip_serializing_if = "Permission::is_empty")]
    pub publish: Permission,

    #[serde(rename = "sub", default, skip_serializing_if = "Permission::is_empty")]
    pub subscribe: Permission,

    #[serde(rename = "resp", default, skip_serializing_if = "Option::is_none")]
    pub response: Option<ResponsePermission>,
}

impl PermissionSet {
    /// Create an empty permission set.
    pub fn new() -> Self {
        Self::default()
    }

    fn permission_mut(&mut self, direction: Direction) -> &mut Permission {
        match direction {
            Direction::Sub => &mut self.subscribe,
            Direction::Pub | Direction::PubSub => &mut self.publish,
        }
    }

    /// The permission for a single direction.
    ///
    /// `PubSub` yields the publish side; use [`Direction::expand`] to visit both.
    pub fn permission(&self, direction: Direction) -> &Permission {
        match direction {
            Direction::Sub => &self.subscribe,
            Direction::Pub | Direction::PubSub => &self.publish,
        }
    }

    /// Add patterns. Re-adding an existing pattern is a no-op.
    ///
    /// Returns the number of (direction, pattern) entries inserted.
    pub fn add<I, S>(&mut self, direction: Direction, mode: Mode, patterns: I) -> usize
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let patterns: Vec<String> = patterns.into_iter().map(Into::into).collect();
        direction
            .expand()
            .iter()
            .map(|d| {
                self.permission_mut(*d)
                    .list_mut(mode)
                    .add(patterns.iter().cloned())
            })
            .sum()
    }

    /// Remove patterns. Absent patterns are ignored.
    pub fn remove<I, S>(&mut self, direction: Direction, mode: Mode, patterns: I) -> usize
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let patterns: Vec<S> = patterns.into_iter().collect();
        direction
            .expand()
            .iter()
            .map(|d| self.permission_mut(*d).list_mut(mode).remove(&patterns))
            .sum()
    }

    /// Whether `pattern` is in the allow list of every direction named.
    pub fn allows(&self, direction: Direction, pattern: &str) -> bool {
        direction
            .expand()
            .iter()
            .all(|d| self.permission(*d).allow.contains(pattern))
    }

    /// Whether `pattern` is in the deny list of every direction named.
    pub fn denies(&self, direction: Direction, pattern: &str) -> bool {
        direction
            .expand()
            .iter()
            .all(|d| self.permission(*d).deny.contains(pattern))
    }

    /// Overwrite the response permission.
    pub fn set_response(&mut self, max_msgs: u32, ttl: Option<Duration>) {
        self.response = Some(ResponsePermission::new(max_msgs, ttl));
    }

    /// Clear the response permission.
    pub fn remove_response(&mut self) -> Option<ResponsePermission> {
        self.response.take()
    }

    /// Apply a response edit after validating it.
    ///
    /// Returns `true` if the response permission changed.
    pub fn apply_response(&mut self, edit: &ResponseEdit) -> Result<bool> {
        edit.validate()?;
        if edit.remove {
            return Ok(self.remove_response().is_some());
        }
        match edit.set {
            Some(resp) => {
                let changed = self.response != Some(resp);
                self.response = Some(resp);
                Ok(changed)
            }
            None => Ok(false),
        }
    }

    /// Whether no permission of any kind is set.
    pub fn is_empty(&self) -> bool {
        self.publish.is_empty() && self.subscribe.is_empty() && self.response.is_none()
    }
}

impl<S: AsRef<str>> PartialEq<[S]> for StringList {
    fn eq(&self, other: &[S]) -> bool {
        self.0.len() == other.len() && self.0.iter().zip(other).all(|(a, b)| a == b.as_ref())
    }
}
