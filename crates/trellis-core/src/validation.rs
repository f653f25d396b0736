//! Structural validation of claims.
//!
//! These checks run on drafts before signing and again on decoded tokens
//! when a chain is verified. They are pure: no clock, no storage.

use std::collections::HashSet;

use trellis_perms::validate_subject;

use crate::claim::{Claim, ClaimBody, ClaimKind, ExportKind};
use crate::error::{CoreError, Result};
use crate::keys::PublicKey;

/// Check the structural rules of a claim.
///
/// - name is not blank
/// - `sub` has the subject role of the claim kind
/// - `nbf` is before `exp` when both are set
/// - account exports have valid subjects, are unique per kind, and only
///   services carry a response type
/// - activation subjects are valid
pub fn validate_claim(claim: &Claim) -> Result<()> {
    if claim.name.trim().is_empty() {
        return Err(CoreError::ValidationFailed("name cannot be empty".into()));
    }

    let kind = claim.kind();
    if claim.sub.role() != kind.subject_role() {
        return Err(CoreError::ValidationFailed(format!(
            "{kind} claim subject must be an {} key, got {} key",
            kind.subject_role(),
            claim.sub.role()
        )));
    }

    if let (Some(nbf), Some(exp)) = (claim.nbf, claim.exp) {
        if nbf >= exp {
            return Err(CoreError::ValidationFailed(format!(
                "not-before ({nbf}) must be earlier than expiry ({exp})"
            )));
        }
    }

    match &claim.body {
        ClaimBody::Operator(op) => {
            if let Some(url) = &op.account_server_url {
                if url.trim().is_empty() {
                    return Err(CoreError::ValidationFailed(
                        "account server url cannot be blank".into(),
                    ));
                }
            }
        }
        ClaimBody::Account(account) => {
            let mut seen = HashSet::new();
            for export in &account.exports {
                validate_subject(&export.subject)?;
                if !seen.insert((export.kind, export.subject.as_str())) {
                    return Err(CoreError::ValidationFailed(format!(
                        "duplicate {} export {:?}",
                        export.kind, export.subject
                    )));
                }
                if export.kind == ExportKind::Stream && export.response_type.is_some() {
                    return Err(CoreError::ValidationFailed(format!(
                        "stream export {:?} cannot have a response type",
                        export.subject
                    )));
                }
            }
        }
        ClaimBody::User(_) => {}
        ClaimBody::Activation(activation) => {
            validate_subject(&activation.subject)?;
        }
    }

    Ok(())
}

/// Check that a signed claim is in its place in the chain.
///
/// On top of [`validate_claim`]: `iss` has the issuer role of the claim
/// kind, and operator claims are self-signed.
pub fn validate_signed(claim: &Claim) -> Result<()> {
    validate_claim(claim)?;

    let kind = claim.kind();
    claim.iss.expect_role(kind.issuer_role())?;
    if kind == ClaimKind::Operator && claim.iss != claim.sub {
        return Err(CoreError::ValidationFailed(
            "operator claims must be self-signed".into(),
        ));
    }
    Ok(())
}

/// Fail with `IssuerMismatch` unless `claim` was issued by `expected`.
pub fn check_issuer(claim: &Claim, expected: &PublicKey) -> Result<()> {
    if claim.iss != *expected {
        return Err(CoreError::IssuerMismatch {
            expected: expected.encode(),
            found: claim.iss.encode(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::claim::{ClaimBuilder, Export, ResponseType};
    use crate::keys::{KeyPair, Role};

    fn account_draft() -> ClaimBuilder {
        ClaimBuilder::account(KeyPair::generate(Role::Account).public_key(), "A")
    }

    #[test]
    fn test_blank_name() {
        let draft = account_draft().name("  ");
        assert!(validate_claim(draft.claim()).is_err());
    }

    #[test]
    fn test_window_order() {
        let draft = account_draft().not_before(Some(10)).expires(Some(10));
        assert!(validate_claim(draft.claim()).is_err());

        let draft = account_draft().not_before(Some(10)).expires(Some(11));
        assert!(validate_claim(draft.claim()).is_ok());
    }

    #[test]
    fn test_stream_with_response_type() {
        let mut draft = account_draft();
        let mut export = Export::stream("foo.>");
        export.response_type = Some(ResponseType::Singleton);
        draft.claim_mut().as_account_mut().unwrap().exports.push(export);
        assert!(validate_claim(draft.claim()).is_err());
    }

    #[test]
    fn test_service_with_response_type() {
        let mut draft = account_draft();
        let mut export = Export::service("help");
        export.response_type = Some(ResponseType::Bounded { max_msgs: 3 });
        draft
            .claim_mut()
            .as_account_mut()
            .unwrap()
            .add_export(export)
            .unwrap();
        assert!(validate_claim(draft.claim()).is_ok());
    }

    #[test]
    fn test_invalid_export_subject() {
        let mut draft = account_draft();
        draft
            .claim_mut()
            .as_account_mut()
            .unwrap()
            .exports
            .push(Export::stream("foo..bar"));
        assert!(matches!(
            validate_claim(draft.claim()),
            Err(CoreError::ValidationFailed(_))
        ));
    }

    #[test]
    fn test_duplicates_pushed_directly() {
        let mut draft = account_draft();
        let account = draft.claim_mut().as_account_mut().unwrap();
        account.exports.push(Export::stream("foo"));
        account.exports.push(Export::stream("foo"));
        assert!(validate_claim(draft.claim()).is_err());
    }

    #[test]
    fn test_validate_signed_roles() {
        let op = KeyPair::generate(Role::Operator);
        let signed = account_draft().sign(&op, 0).unwrap();
        assert!(validate_signed(signed.claim()).is_ok());

        let mut forged = signed.claim().clone();
        forged.iss = KeyPair::generate(Role::Account).public_key();
        assert!(matches!(
            validate_signed(&forged),
            Err(CoreError::KeyMismatch { .. })
        ));
    }
}
