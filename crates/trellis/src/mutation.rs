//! Complete descriptions of claim edits.
//!
//! The caller collects every requested change into one of these values
//! before anything is loaded or signed. Actions validate the value, apply
//! it to a draft of the stored claim, and sign the draft; a failure at any
//! step leaves the stored claim untouched.

use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, NaiveDate, TimeZone, Utc};

use trellis_core::{Claim, CoreError, Export, ExportKind, PublicKey, ResponseType, Role};
use trellis_perms::{
    validate_subject, Direction, Mode, PermissionSet, ResponseEdit, StringList, ALL_TARGETS,
};

use crate::error::{Error, Result};

// ─────────────────────────────────────────────────────────────────────────────
// Time
// ─────────────────────────────────────────────────────────────────────────────

/// A point in time given by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeSpec {
    /// Absolute Unix seconds.
    At(i64),
    /// Seconds after the invocation's current time.
    FromNow(i64),
}

impl TimeSpec {
    /// Resolve to Unix seconds.
    pub fn resolve(self, now: i64) -> i64 {
        match self {
            TimeSpec::At(at) => at,
            TimeSpec::FromNow(offset) => now.saturating_add(offset),
        }
    }
}

impl FromStr for TimeSpec {
    type Err = Error;

    /// Accepts Unix seconds (`1700000000`), an offset from now (`30m`,
    /// `12h`, `7d`, `2w`, `3M`, `1y`), an RFC 3339 timestamp, or a
    /// `YYYY-MM-DD` date (midnight UTC).
    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.is_empty() {
            return Err(Error::invalid("time", "empty"));
        }
        if let Ok(at) = s.parse::<i64>() {
            return Ok(TimeSpec::At(at));
        }
        if let Some(offset) = parse_offset(s) {
            return Ok(TimeSpec::FromNow(offset));
        }
        if let Ok(at) = DateTime::parse_from_rfc3339(s) {
            return Ok(TimeSpec::At(at.timestamp()));
        }
        if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
            let midnight = date
                .and_hms_opt(0, 0, 0)
                .ok_or_else(|| Error::invalid("time", s))?;
            return Ok(TimeSpec::At(Utc.from_utc_datetime(&midnight).timestamp()));
        }
        Err(Error::invalid(
            "time",
            format!("{s:?} is not a date, Unix time, or offset like 30d"),
        ))
    }
}

fn parse_offset(s: &str) -> Option<i64> {
    let unit = s.chars().last()?;
    let count: i64 = s[..s.len() - unit.len_utf8()].parse().ok()?;
    let scale = match unit {
        's' => 1,
        'm' => 60,
        'h' => 3_600,
        'd' => 86_400,
        'w' => 7 * 86_400,
        'M' => 30 * 86_400,
        'y' => 365 * 86_400,
        _ => return None,
    };
    count.checked_mul(scale)
}

/// Parse a response time limit: `500ms`, `30s`, `5m`, `1h`; a bare number
/// is seconds.
pub fn parse_ttl(s: &str) -> Result<Duration> {
    let s = s.trim();
    let (digits, unit) = match s.find(|c: char| !c.is_ascii_digit()) {
        Some(i) => s.split_at(i),
        None => (s, "s"),
    };
    let count: u64 = digits
        .parse()
        .map_err(|_| Error::invalid("ttl", format!("{s:?} has no count")))?;
    let scale = match unit {
        "ms" => return Ok(Duration::from_millis(count)),
        "s" => 1,
        "m" => 60,
        "h" => 3_600,
        _ => return Err(Error::invalid("ttl", format!("unknown unit {unit:?}"))),
    };
    count
        .checked_mul(scale)
        .map(Duration::from_secs)
        .ok_or_else(|| Error::invalid("ttl", format!("{s:?} is too large")))
}

/// A requested change to an optional value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Field<T> {
    Keep,
    Clear,
    Set(T),
}

impl<T> Default for Field<T> {
    fn default() -> Self {
        Field::Keep
    }
}

impl<T> Field<T> {
    fn apply_to<U>(&self, slot: &mut Option<U>, f: impl FnOnce(&T) -> U) {
        match self {
            Field::Keep => {}
            Field::Clear => *slot = None,
            Field::Set(value) => *slot = Some(f(value)),
        }
    }

    pub fn is_keep(&self) -> bool {
        matches!(self, Field::Keep)
    }
}

/// Changes to a claim's validity window.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TimeRange {
    pub not_before: Field<TimeSpec>,
    pub expires: Field<TimeSpec>,
}

impl TimeRange {
    pub fn apply(&self, claim: &mut Claim, now: i64) {
        self.not_before.apply_to(&mut claim.nbf, |t| t.resolve(now));
        self.expires.apply_to(&mut claim.exp, |t| t.resolve(now));
    }
}

/// Items to add to and remove from a sorted list. Removals apply first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListEdit {
    pub add: Vec<String>,
    pub remove: Vec<String>,
}

impl ListEdit {
    pub fn add<I, S>(items: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            add: items.into_iter().map(Into::into).collect(),
            remove: Vec::new(),
        }
    }

    pub fn apply(&self, list: &mut StringList) {
        list.remove(self.remove.iter().map(String::as_str));
        list.add(self.add.iter().map(String::as_str));
    }

    pub fn is_empty(&self) -> bool {
        self.add.is_empty() && self.remove.is_empty()
    }

    fn validate(&self, what: &'static str) -> Result<()> {
        if self.add.iter().any(|item| item.trim().is_empty()) {
            return Err(Error::invalid(what, "blank entry"));
        }
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Entity Edits
// ─────────────────────────────────────────────────────────────────────────────

/// Changes to an operator claim.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OperatorEdit {
    pub account_server_url: Field<String>,
    pub service_urls: ListEdit,
    pub tags: ListEdit,
    pub time: TimeRange,
}

impl OperatorEdit {
    pub fn validate(&self) -> Result<()> {
        if let Field::Set(url) = &self.account_server_url {
            if url.trim().is_empty() {
                return Err(Error::invalid("account server url", "blank"));
            }
        }
        self.service_urls.validate("service url")?;
        self.tags.validate("tag")
    }

    pub fn apply(&self, claim: &mut Claim, now: i64) -> Result<()> {
        self.validate()?;
        let body = claim.as_operator_mut()?;
        self.account_server_url
            .apply_to(&mut body.account_server_url, Clone::clone);
        self.service_urls.apply(&mut body.operator_service_urls);
        self.tags.apply(&mut claim.tags);
        self.time.apply(claim, now);
        Ok(())
    }
}

/// Changes to an account claim.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AccountEdit {
    pub description: Field<String>,
    pub tags: ListEdit,
    pub time: TimeRange,
}

impl AccountEdit {
    pub fn validate(&self) -> Result<()> {
        self.tags.validate("tag")
    }

    pub fn apply(&self, claim: &mut Claim, now: i64) -> Result<()> {
        self.validate()?;
        let body = claim.as_account_mut()?;
        self.description.apply_to(&mut body.description, Clone::clone);
        self.tags.apply(&mut claim.tags);
        self.time.apply(claim, now);
        Ok(())
    }
}

/// Add or remove subject patterns in one permission list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PermissionEdit {
    pub direction: Direction,
    pub mode: Mode,
    pub patterns: Vec<String>,
    pub remove: bool,
}

impl PermissionEdit {
    pub fn allow<I, S>(direction: Direction, patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::add(direction, Mode::Allow, patterns)
    }

    pub fn deny<I, S>(direction: Direction, patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::add(direction, Mode::Deny, patterns)
    }

    pub fn add<I, S>(direction: Direction, mode: Mode, patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            direction,
            mode,
            patterns: patterns.into_iter().map(Into::into).collect(),
            remove: false,
        }
    }

    pub fn remove<I, S>(direction: Direction, mode: Mode, patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            remove: true,
            ..Self::add(direction, mode, patterns)
        }
    }

    fn apply(&self, permissions: &mut PermissionSet) {
        let patterns = self.patterns.iter().map(String::as_str);
        if self.remove {
            permissions.remove(self.direction, self.mode, patterns);
        } else {
            permissions.add(self.direction, self.mode, patterns);
        }
    }
}

/// Changes to a user claim.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserEdit {
    /// Applied in order.
    pub permissions: Vec<PermissionEdit>,
    /// Patterns removed from every allow and deny list.
    pub remove_everywhere: Vec<String>,
    pub response: ResponseEdit,
    pub src: ListEdit,
    pub bearer_token: Option<bool>,
    pub tags: ListEdit,
    pub time: TimeRange,
}

impl UserEdit {
    pub fn validate(&self) -> Result<()> {
        self.response.validate()?;
        for edit in &self.permissions {
            if edit.patterns.iter().any(|p| p.trim().is_empty()) {
                return Err(Error::invalid("permission", "blank subject"));
            }
        }
        self.src.validate("source network")?;
        self.tags.validate("tag")
    }

    pub fn apply(&self, claim: &mut Claim, now: i64) -> Result<()> {
        self.validate()?;
        let body = claim.as_user_mut()?;
        for edit in &self.permissions {
            edit.apply(&mut body.permissions);
        }
        if !self.remove_everywhere.is_empty() {
            for mode in [Mode::Allow, Mode::Deny] {
                body.permissions.remove(
                    Direction::PubSub,
                    mode,
                    self.remove_everywhere.iter().map(String::as_str),
                );
            }
        }
        body.permissions.apply_response(&self.response)?;
        self.src.apply(&mut body.src);
        if let Some(bearer) = self.bearer_token {
            body.bearer_token = bearer;
        }
        self.tags.apply(&mut claim.tags);
        self.time.apply(claim, now);
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Exports
// ─────────────────────────────────────────────────────────────────────────────

/// Changes to one export, identified by its exact subject and kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportEdit {
    pub subject: String,
    pub kind: ExportKind,
    pub name: Option<String>,
    pub token_required: Option<bool>,
    pub response_type: Field<ResponseType>,
    pub description: Field<String>,
}

impl ExportEdit {
    pub fn new(subject: impl Into<String>, kind: ExportKind) -> Self {
        Self {
            subject: subject.into(),
            kind,
            name: None,
            token_required: None,
            response_type: Field::Keep,
            description: Field::Keep,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.kind == ExportKind::Stream && matches!(self.response_type, Field::Set(_)) {
            return Err(CoreError::ValidationFailed(
                "response types apply to service exports only".into(),
            )
            .into());
        }
        Ok(())
    }

    pub fn apply(&self, claim: &mut Claim) -> Result<()> {
        self.validate()?;
        let account = claim.as_account_mut()?;
        let export = account
            .export_mut(&self.subject, self.kind)
            .ok_or_else(|| {
                CoreError::ValidationFailed(format!(
                    "no {} export {:?}",
                    self.kind, self.subject
                ))
            })?;
        apply_export(self, export);
        Ok(())
    }
}

fn apply_export(edit: &ExportEdit, export: &mut Export) {
    if let Some(name) = &edit.name {
        export.name = name.clone();
    }
    if let Some(required) = edit.token_required {
        export.token_required = required;
    }
    edit.response_type.apply_to(&mut export.response_type, |t| *t);
    edit.description.apply_to(&mut export.description, Clone::clone);
}

/// A new export to add to an account.
pub fn check_new_export(export: &Export) -> Result<()> {
    validate_subject(&export.subject)?;
    if export.kind == ExportKind::Stream && export.response_type.is_some() {
        return Err(CoreError::ValidationFailed(
            "response types apply to service exports only".into(),
        )
        .into());
    }
    Ok(())
}

// ─────────────────────────────────────────────────────────────────────────────
// Revocations
// ─────────────────────────────────────────────────────────────────────────────

/// Revoke activation tokens of an export for one account or all of them.
///
/// `subject` may name the export exactly or any subject it contains.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RevokeActivation {
    pub subject: String,
    pub kind: ExportKind,
    /// An account public key or `*`.
    pub target: String,
    /// The cutoff; the current time when absent.
    pub at: Option<TimeSpec>,
}

impl RevokeActivation {
    pub fn new(subject: impl Into<String>, kind: ExportKind, target: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            kind,
            target: target.into(),
            at: None,
        }
    }

    pub fn at(mut self, at: TimeSpec) -> Self {
        self.at = Some(at);
        self
    }

    pub fn validate(&self) -> Result<()> {
        validate_subject(&self.subject)?;
        check_target(&self.target, Role::Account)
    }
}

/// Revoke user tokens of an account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RevokeUser {
    /// A user name in the account, a user public key, or `*`.
    pub target: String,
    /// The cutoff; the current time when absent.
    pub at: Option<TimeSpec>,
}

impl RevokeUser {
    pub fn new(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            at: None,
        }
    }

    pub fn at(mut self, at: TimeSpec) -> Self {
        self.at = Some(at);
        self
    }
}

/// Check a revocation target: `*` or a public key of `role`.
pub fn check_target(target: &str, role: Role) -> Result<()> {
    if target == ALL_TARGETS {
        return Ok(());
    }
    PublicKey::decode_as(target, role)?;
    Ok(())
}
