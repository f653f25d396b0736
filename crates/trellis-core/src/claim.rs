//! Claims: the signed records of the trust hierarchy.
//!
//! ## Structure
//!
//! Every claim shares a common envelope (`jti`, `iat`, `iss`, `name`, `sub`,
//! validity window, tags) and carries a typed [`ClaimBody`]. The body is a
//! closed union; edits go through the `as_*_mut` accessors, which fail with
//! `ValidationFailed` when the claim is of another kind.
//!
//! ## Drafts
//!
//! A [`ClaimBuilder`] is an unsigned draft. It is created for a subject key
//! (so `sub` is the entity's own key by construction), mutated, and then
//! consumed by [`ClaimBuilder::sign`], which returns a [`SignedClaim`].

use serde::{Deserialize, Serialize};

use trellis_perms::{is_contained_in, PermissionSet, RevocationList, StringList};

use crate::canonical::canonical_bytes;
use crate::error::{CoreError, Result};
use crate::keys::{KeyPair, PublicKey, Role};
use crate::time::Validity;
use crate::token::SignedClaim;
use crate::types::ClaimId;
use crate::validation::validate_claim;

/// Discriminant of a [`ClaimBody`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClaimKind {
    Operator,
    Account,
    User,
    Activation,
}

impl ClaimKind {
    /// The role of the key in `sub`.
    pub const fn subject_role(self) -> Role {
        match self {
            ClaimKind::Operator => Role::Operator,
            ClaimKind::Account | ClaimKind::Activation => Role::Account,
            ClaimKind::User => Role::User,
        }
    }

    /// The role of the key that must sign this kind of claim.
    pub const fn issuer_role(self) -> Role {
        match self {
            ClaimKind::Operator | ClaimKind::Account => Role::Operator,
            ClaimKind::User | ClaimKind::Activation => Role::Account,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            ClaimKind::Operator => "operator",
            ClaimKind::Account => "account",
            ClaimKind::User => "user",
            ClaimKind::Activation => "activation",
        }
    }
}

impl std::fmt::Display for ClaimKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Type-specific payload of a claim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClaimBody {
    Operator(OperatorClaim),
    Account(AccountClaim),
    User(UserClaim),
    Activation(ActivationClaim),
}

impl ClaimBody {
    pub fn kind(&self) -> ClaimKind {
        match self {
            ClaimBody::Operator(_) => ClaimKind::Operator,
            ClaimBody::Account(_) => ClaimKind::Account,
            ClaimBody::User(_) => ClaimKind::User,
            ClaimBody::Activation(_) => ClaimKind::Activation,
        }
    }
}

/// Operator payload.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperatorClaim {
    /// Where account tokens are pushed and pulled.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account_server_url: Option<String>,

    /// Message-bus URLs clients of this operator connect to.
    #[serde(default, skip_serializing_if = "StringList::is_empty")]
    pub operator_service_urls: StringList,
}

/// Whether an export carries a stream or a request/reply service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExportKind {
    Stream,
    Service,
}

impl std::fmt::Display for ExportKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExportKind::Stream => f.write_str("stream"),
            ExportKind::Service => f.write_str("service"),
        }
    }
}

/// How many responses a service export may send per request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseType {
    Singleton,
    Bounded { max_msgs: u32 },
}

/// A subject an account makes available to other accounts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Export {
    #[serde(default)]
    pub name: String,

    pub subject: String,

    pub kind: ExportKind,

    /// Importers need an activation token.
    #[serde(default)]
    pub token_required: bool,

    /// Services only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_type: Option<ResponseType>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Revoked activation targets (account keys or `*`).
    #[serde(default, skip_serializing_if = "RevocationList::is_empty")]
    pub revocations: RevocationList,
}

impl Export {
    /// Create a public export with no response type.
    pub fn new(name: impl Into<String>, subject: impl Into<String>, kind: ExportKind) -> Self {
        Self {
            name: name.into(),
            subject: subject.into(),
            kind,
            token_required: false,
            response_type: None,
            description: None,
            revocations: RevocationList::new(),
        }
    }

    /// Create a stream export named after its subject.
    pub fn stream(subject: impl Into<String>) -> Self {
        let subject = subject.into();
        Self::new(subject.clone(), subject, ExportKind::Stream)
    }

    /// Create a service export named after its subject.
    pub fn service(subject: impl Into<String>) -> Self {
        let subject = subject.into();
        Self::new(subject.clone(), subject, ExportKind::Service)
    }

    /// Whether an activation for `target` issued at `issued_at` is revoked.
    pub fn is_revoked_at(&self, target: &str, issued_at: i64) -> bool {
        self.revocations.is_revoked_at(target, issued_at)
    }

    /// Revoke activations for `target`. See [`RevocationList::revoke`].
    pub fn revoke(&mut self, target: impl Into<String>, cutoff: i64) -> Option<i64> {
        self.revocations.revoke(target, cutoff)
    }

    pub fn clear_revocation(&mut self, target: &str) -> Option<i64> {
        self.revocations.clear(target)
    }

    /// Whether `subject` falls under this export.
    pub fn covers(&self, subject: &str) -> bool {
        is_contained_in(subject, &self.subject)
    }
}

/// Account payload.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountClaim {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub exports: Vec<Export>,

    /// Revoked users (user keys or `*`).
    #[serde(default, skip_serializing_if = "RevocationList::is_empty")]
    pub revocations: RevocationList,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl AccountClaim {
    /// Add an export. Fails if an export of the same kind already uses the
    /// subject.
    pub fn add_export(&mut self, export: Export) -> Result<()> {
        if self.export(&export.subject, export.kind).is_some() {
            return Err(CoreError::ValidationFailed(format!(
                "{} export {:?} already exists",
                export.kind, export.subject
            )));
        }
        self.exports.push(export);
        Ok(())
    }

    /// The export with exactly this subject and kind.
    pub fn export(&self, subject: &str, kind: ExportKind) -> Option<&Export> {
        self.exports
            .iter()
            .find(|e| e.kind == kind && e.subject == subject)
    }

    pub fn export_mut(&mut self, subject: &str, kind: ExportKind) -> Option<&mut Export> {
        self.exports
            .iter_mut()
            .find(|e| e.kind == kind && e.subject == subject)
    }

    /// The export of `kind` that covers `subject`.
    ///
    /// An exact subject match wins; otherwise the first export whose
    /// pattern contains `subject` is returned.
    pub fn covering_export(&self, subject: &str, kind: ExportKind) -> Result<&Export> {
        let index = self.covering_index(subject, kind)?;
        Ok(&self.exports[index])
    }

    /// Mutable form of [`covering_export`](Self::covering_export).
    pub fn covering_export_mut(&mut self, subject: &str, kind: ExportKind) -> Result<&mut Export> {
        let index = self.covering_index(subject, kind)?;
        Ok(&mut self.exports[index])
    }

    fn covering_index(&self, subject: &str, kind: ExportKind) -> Result<usize> {
        self.exports
            .iter()
            .position(|e| e.kind == kind && e.subject == subject)
            .or_else(|| {
                self.exports
                    .iter()
                    .position(|e| e.kind == kind && e.covers(subject))
            })
            .ok_or_else(|| {
                CoreError::ValidationFailed(format!("no {kind} export matches {subject:?}"))
            })
    }

    /// Remove and return the export with this subject and kind.
    pub fn remove_export(&mut self, subject: &str, kind: ExportKind) -> Result<Export> {
        let index = self
            .exports
            .iter()
            .position(|e| e.kind == kind && e.subject == subject)
            .ok_or_else(|| {
                CoreError::ValidationFailed(format!("no {kind} export {subject:?}"))
            })?;
        Ok(self.exports.remove(index))
    }

    /// Revoke a user (or `*`). See [`RevocationList::revoke`].
    pub fn revoke_user(&mut self, user: impl Into<String>, cutoff: i64) -> Option<i64> {
        self.revocations.revoke(user, cutoff)
    }

    pub fn clear_user_revocation(&mut self, user: &str) -> Option<i64> {
        self.revocations.clear(user)
    }

    /// Whether a user token issued at `issued_at` is revoked.
    pub fn is_user_revoked(&self, user: &str, issued_at: i64) -> bool {
        self.revocations.is_revoked_at(user, issued_at)
    }
}

/// User payload.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserClaim {
    #[serde(default)]
    pub permissions: PermissionSet,

    /// Allowed source networks (CIDR strings).
    #[serde(default, skip_serializing_if = "StringList::is_empty")]
    pub src: StringList,

    /// The token alone authenticates; no signature challenge.
    #[serde(default)]
    pub bearer_token: bool,
}

/// Grant for a target account to import a token-required export.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivationClaim {
    pub subject: String,
    pub kind: ExportKind,
}

/// A claim: common envelope plus typed body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claim {
    /// Content id. Zero until signed.
    pub jti: ClaimId,

    /// Issued at, Unix seconds.
    pub iat: i64,

    /// Signer's public key.
    pub iss: PublicKey,

    pub name: String,

    /// The entity's own public key.
    pub sub: PublicKey,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nbf: Option<i64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exp: Option<i64>,

    #[serde(default, skip_serializing_if = "StringList::is_empty")]
    pub tags: StringList,

    pub body: ClaimBody,
}

macro_rules! body_accessors {
    ($variant:ident, $ty:ty, $get:ident, $get_mut:ident) => {
        pub fn $get(&self) -> Result<&$ty> {
            match &self.body {
                ClaimBody::$variant(inner) => Ok(inner),
                other => Err(kind_mismatch(ClaimKind::$variant, other.kind())),
            }
        }

        pub fn $get_mut(&mut self) -> Result<&mut $ty> {
            match &mut self.body {
                ClaimBody::$variant(inner) => Ok(inner),
                other => Err(kind_mismatch(ClaimKind::$variant, other.kind())),
            }
        }
    };
}

fn kind_mismatch(expected: ClaimKind, found: ClaimKind) -> CoreError {
    CoreError::ValidationFailed(format!("expected {expected} claim, found {found} claim"))
}

impl Claim {
    pub fn kind(&self) -> ClaimKind {
        self.body.kind()
    }

    body_accessors!(Operator, OperatorClaim, as_operator, as_operator_mut);
    body_accessors!(Account, AccountClaim, as_account, as_account_mut);
    body_accessors!(User, UserClaim, as_user, as_user_mut);
    body_accessors!(Activation, ActivationClaim, as_activation, as_activation_mut);

    /// Check structural rules.
    pub fn validate(&self) -> Result<()> {
        validate_claim(self)
    }

    /// Where `now` falls in the validity window.
    pub fn validity_at(&self, now: i64) -> Validity {
        Validity::at(self.nbf, self.exp, now)
    }

    pub fn is_active_at(&self, now: i64) -> bool {
        self.validity_at(now).is_active()
    }

    /// Canonical bytes with `jti` zeroed, the input to the content id.
    pub(crate) fn id_bytes(&self) -> Result<Vec<u8>> {
        if self.jti.is_zero() {
            return canonical_bytes(self);
        }
        let mut unsigned = self.clone();
        unsigned.jti = ClaimId::ZERO;
        canonical_bytes(&unsigned)
    }

    /// Recompute the content id.
    pub fn compute_id(&self) -> Result<ClaimId> {
        Ok(ClaimId::hash(&self.id_bytes()?))
    }
}

/// An unsigned claim draft.
#[derive(Debug, Clone)]
pub struct ClaimBuilder {
    claim: Claim,
}

impl ClaimBuilder {
    fn new(sub: PublicKey, name: impl Into<String>, body: ClaimBody) -> Self {
        Self {
            claim: Claim {
                jti: ClaimId::ZERO,
                iat: 0,
                // Replaced at signing.
                iss: sub,
                name: name.into(),
                sub,
                nbf: None,
                exp: None,
                tags: StringList::new(),
                body,
            },
        }
    }

    /// Draft an operator claim for `sub`.
    pub fn operator(sub: PublicKey, name: impl Into<String>) -> Self {
        Self::new(sub, name, ClaimBody::Operator(OperatorClaim::default()))
    }

    /// Draft an account claim for `sub`.
    pub fn account(sub: PublicKey, name: impl Into<String>) -> Self {
        Self::new(sub, name, ClaimBody::Account(AccountClaim::default()))
    }

    /// Draft a user claim for `sub`.
    pub fn user(sub: PublicKey, name: impl Into<String>) -> Self {
        Self::new(sub, name, ClaimBody::User(UserClaim::default()))
    }

    /// Draft an activation granting `target` access to `subject`.
    pub fn activation(
        target: PublicKey,
        name: impl Into<String>,
        subject: impl Into<String>,
        kind: ExportKind,
    ) -> Self {
        let body = ClaimBody::Activation(ActivationClaim {
            subject: subject.into(),
            kind,
        });
        Self::new(target, name, body)
    }

    /// Start a new draft from an existing claim, for editing and re-signing.
    pub fn from_claim(mut claim: Claim) -> Self {
        claim.jti = ClaimId::ZERO;
        Self { claim }
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.claim.name = name.into();
        self
    }

    pub fn not_before(mut self, nbf: Option<i64>) -> Self {
        self.claim.nbf = nbf;
        self
    }

    pub fn expires(mut self, exp: Option<i64>) -> Self {
        self.claim.exp = exp;
        self
    }

    pub fn tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.claim.tags.add(tags);
        self
    }

    /// The draft.
    pub fn claim(&self) -> &Claim {
        &self.claim
    }

    /// Mutable access to the draft for edits.
    pub fn claim_mut(&mut self) -> &mut Claim {
        &mut self.claim
    }

    /// Sign the draft with `signer` at time `now` (Unix seconds).
    ///
    /// Nothing is signed unless every check passes:
    /// the signer has a private key, it is of the issuer role for this
    /// claim kind (operators must sign their own claim), and the draft is
    /// structurally valid.
    pub fn sign(self, signer: &KeyPair, now: i64) -> Result<SignedClaim> {
        let mut claim = self.claim;
        let kind = claim.kind();

        if !signer.has_private() {
            return Err(CoreError::NoSigningKey(signer.public_key().encode()));
        }
        if signer.role() != kind.issuer_role() {
            return Err(CoreError::KeyMismatch {
                expected: kind.issuer_role(),
                found: signer.role(),
            });
        }
        if kind == ClaimKind::Operator && signer.public_key() != claim.sub {
            return Err(CoreError::ValidationFailed(
                "operator claims must be self-signed".into(),
            ));
        }
        validate_claim(&claim)?;

        claim.iss = signer.public_key();
        claim.iat = now;
        claim.jti = ClaimId::ZERO;
        claim.jti = claim.compute_id()?;

        SignedClaim::encode(claim, signer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use trellis_perms::{Direction, Mode};

    fn operator() -> KeyPair {
        KeyPair::generate(Role::Operator)
    }

    #[test]
    fn test_operator_self_signs() {
        let op = operator();
        let signed = ClaimBuilder::operator(op.public_key(), "O")
            .sign(&op, 1000)
            .unwrap();

        assert_eq!(signed.claim().iss, op.public_key());
        assert_eq!(signed.claim().sub, op.public_key());
        assert_eq!(signed.claim().iat, 1000);
        assert!(!signed.claim().jti.is_zero());
    }

    #[test]
    fn test_operator_signed_by_other_operator_rejected() {
        let op = operator();
        let other = operator();
        let err = ClaimBuilder::operator(op.public_key(), "O")
            .sign(&other, 0)
            .unwrap_err();
        assert!(matches!(err, CoreError::ValidationFailed(_)));
    }

    #[test]
    fn test_wrong_issuer_role() {
        let account = KeyPair::generate(Role::Account);
        let other_account = KeyPair::generate(Role::Account);
        let err = ClaimBuilder::account(account.public_key(), "A")
            .sign(&other_account, 0)
            .unwrap_err();
        assert!(matches!(
            err,
            CoreError::KeyMismatch {
                expected: Role::Operator,
                found: Role::Account
            }
        ));
    }

    #[test]
    fn test_public_only_signer() {
        let op = operator();
        let public_only = KeyPair::from_public(op.public_key());
        let account = KeyPair::generate(Role::Account);
        let err = ClaimBuilder::account(account.public_key(), "A")
            .sign(&public_only, 0)
            .unwrap_err();
        assert!(matches!(err, CoreError::NoSigningKey(_)));
    }

    #[test]
    fn test_subject_role_must_match_kind() {
        let op = operator();
        let user_key = KeyPair::generate(Role::User);
        let err = ClaimBuilder::account(user_key.public_key(), "A")
            .sign(&op, 0)
            .unwrap_err();
        assert!(matches!(err, CoreError::ValidationFailed(_)));
    }

    #[test]
    fn test_body_accessor_mismatch() {
        let op = operator();
        let mut draft = ClaimBuilder::operator(op.public_key(), "O");
        assert!(matches!(
            draft.claim_mut().as_account_mut(),
            Err(CoreError::ValidationFailed(_))
        ));
        assert!(draft.claim_mut().as_operator_mut().is_ok());
    }

    #[test]
    fn test_duplicate_export_rejected() {
        let mut account = AccountClaim::default();
        account.add_export(Export::stream("foo.>")).unwrap();
        account.add_export(Export::service("foo.>")).unwrap();
        assert!(account.add_export(Export::stream("foo.>")).is_err());
        assert_eq!(account.exports.len(), 2);
    }

    #[test]
    fn test_covering_export_prefers_exact_match() {
        let mut account = AccountClaim::default();
        account.add_export(Export::stream("foo.>")).unwrap();
        account.add_export(Export::stream("foo.bar")).unwrap();

        let exact = account
            .covering_export_mut("foo.bar", ExportKind::Stream)
            .unwrap();
        assert_eq!(exact.subject, "foo.bar");

        let wide = account
            .covering_export_mut("foo.baz", ExportKind::Stream)
            .unwrap();
        assert_eq!(wide.subject, "foo.>");

        assert!(account
            .covering_export_mut("foo.bar", ExportKind::Service)
            .is_err());
    }

    #[test]
    fn test_covering_export_shared_lookup() {
        let mut account = AccountClaim::default();
        account.add_export(Export::service("svc.>")).unwrap();
        account.add_export(Export::service("svc.echo")).unwrap();
        account.add_export(Export::stream("svc.echo")).unwrap();

        let found = account.covering_export("svc.echo", ExportKind::Service).unwrap();
        assert_eq!(found.subject, "svc.echo");
        assert_eq!(found.kind, ExportKind::Service);
        assert_eq!(
            account.covering_export("svc.time", ExportKind::Service).unwrap().subject,
            "svc.>"
        );
        assert!(matches!(
            account.covering_export("svc.time", ExportKind::Stream),
            Err(CoreError::ValidationFailed(_))
        ));

        let read = account.covering_export("svc.time", ExportKind::Service).unwrap().subject.clone();
        let written = account.covering_export_mut("svc.time", ExportKind::Service).unwrap().subject.clone();
        assert_eq!(read, written);
    }

    #[test]
    fn test_export_revocation() {
        let mut export = Export::stream("foo.>");
        export.revoke("ACCT1", 1000);
        assert!(export.is_revoked_at("ACCT1", 999));
        assert!(!export.is_revoked_at("ACCT1", 1001));
        export.clear_revocation("ACCT1");
        assert!(!export.is_revoked_at("ACCT1", 0));
    }

    #[test]
    fn test_jti_ignores_previous_jti() {
        let op = operator();
        let account = KeyPair::generate(Role::Account);
        let mut draft = ClaimBuilder::account(account.public_key(), "A");
        draft
            .claim_mut()
            .as_account_mut()
            .unwrap()
            .add_export(Export::stream("foo.>"))
            .unwrap();

        let first = draft.clone().sign(&op, 10).unwrap();
        let second = ClaimBuilder::from_claim(first.claim().clone())
            .sign(&op, 10)
            .unwrap();
        assert_eq!(first.claim().jti, second.claim().jti);

        let third = ClaimBuilder::from_claim(first.claim().clone())
            .sign(&op, 11)
            .unwrap();
        assert_ne!(first.claim().jti, third.claim().jti);
    }

    #[test]
    fn test_user_permissions_survive_signing() {
        let account = KeyPair::generate(Role::Account);
        let user = KeyPair::generate(Role::User);
        let mut draft = ClaimBuilder::user(user.public_key(), "U").tags(["b", "a", "b"]);
        draft
            .claim_mut()
            .as_user_mut()
            .unwrap()
            .permissions
            .add(Direction::PubSub, Mode::Allow, ["orders.>"]);

        let signed = draft.sign(&account, 5).unwrap();
        let decoded = SignedClaim::decode(signed.token()).unwrap();
        let perms = &decoded.claim().as_user().unwrap().permissions;
        assert!(perms.allows(Direction::Pub, "orders.>"));
        assert!(perms.allows(Direction::Sub, "orders.>"));
        assert_eq!(decoded.claim().tags.as_slice(), ["a", "b"]);
    }

    #[test]
    fn test_validity_window() {
        let op = operator();
        let signed = ClaimBuilder::operator(op.public_key(), "O")
            .not_before(Some(100))
            .expires(Some(200))
            .sign(&op, 50)
            .unwrap();
        assert!(!signed.claim().is_active_at(99));
        assert!(signed.claim().is_active_at(150));
        assert_eq!(signed.claim().validity_at(201), Validity::Expired);
    }
}
