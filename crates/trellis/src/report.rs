//! Itemized outcome of an action.
//!
//! A signed claim is the primary result of most actions. Everything that
//! happens after the claim is stored (writing a seed, a creds bundle,
//! updating the selection) is recorded here instead of failing the action,
//! so the caller can tell exactly which side effects completed.

use std::fmt;

use tracing::{error, info, warn};

use trellis_core::SignedClaim;

/// One line of a [`Report`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReportItem {
    Ok(String),
    Warning(String),
    Error(String),
}

impl ReportItem {
    pub fn message(&self) -> &str {
        match self {
            ReportItem::Ok(m) | ReportItem::Warning(m) | ReportItem::Error(m) => m,
        }
    }
}

impl fmt::Display for ReportItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReportItem::Ok(m) => write!(f, "[ OK ] {m}"),
            ReportItem::Warning(m) => write!(f, "[WARN] {m}"),
            ReportItem::Error(m) => write!(f, "[ERR ] {m}"),
        }
    }
}

/// Ordered list of report items. Each item is also emitted as a tracing
/// event at the matching level.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Report {
    items: Vec<ReportItem>,
}

impl Report {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ok(&mut self, message: impl Into<String>) {
        let message = message.into();
        info!("{message}");
        self.items.push(ReportItem::Ok(message));
    }

    pub fn warn(&mut self, message: impl Into<String>) {
        let message = message.into();
        warn!("{message}");
        self.items.push(ReportItem::Warning(message));
    }

    pub fn error(&mut self, message: impl Into<String>) {
        let message = message.into();
        error!("{message}");
        self.items.push(ReportItem::Error(message));
    }

    /// Record `Ok(ok)` on success, `Error` with the failure otherwise.
    pub(crate) fn record<T, E: fmt::Display>(
        &mut self,
        result: std::result::Result<T, E>,
        ok: impl FnOnce(&T) -> String,
        failed: &str,
    ) -> Option<T> {
        match result {
            Ok(value) => {
                self.ok(ok(&value));
                Some(value)
            }
            Err(e) => {
                self.error(format!("{failed}: {e}"));
                None
            }
        }
    }

    /// Append all items of `other`.
    pub fn extend(&mut self, other: Report) {
        self.items.extend(other.items);
    }

    pub fn items(&self) -> &[ReportItem] {
        &self.items
    }

    pub fn has_errors(&self) -> bool {
        self.items.iter().any(|i| matches!(i, ReportItem::Error(_)))
    }

    pub fn has_warnings(&self) -> bool {
        self.items.iter().any(|i| matches!(i, ReportItem::Warning(_)))
    }

    pub fn errors(&self) -> impl Iterator<Item = &str> {
        self.items.iter().filter_map(|i| match i {
            ReportItem::Error(m) => Some(m.as_str()),
            _ => None,
        })
    }

    pub fn warnings(&self) -> impl Iterator<Item = &str> {
        self.items.iter().filter_map(|i| match i {
            ReportItem::Warning(m) => Some(m.as_str()),
            _ => None,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for item in &self.items {
            writeln!(f, "{item}")?;
        }
        Ok(())
    }
}

/// A signed and stored claim together with the report of its side effects.
#[derive(Debug, Clone)]
pub struct Applied {
    pub signed: SignedClaim,
    pub report: Report,
}

impl Applied {
    pub(crate) fn new(signed: SignedClaim, report: Report) -> Self {
        Self { signed, report }
    }
}
