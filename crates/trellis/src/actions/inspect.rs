//! Describing and validating stored claims.

use serde::Serialize;
use tracing::debug;

use trellis_core::{validate_signed, verify, Claim, SignedClaim, Validity};
use trellis_store::{EntityRef, Store, StoreError};

use crate::context::Context;
use crate::error::Result;
use crate::report::Report;

/// A decoded claim for display.
#[derive(Debug, Clone, Serialize)]
pub struct Description {
    /// Where the claim is stored, if it came from the store.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entity: Option<String>,
    pub validity: Validity,
    pub claim: Claim,
    pub token: String,
}

impl Description {
    fn new(entity: Option<&EntityRef>, signed: &SignedClaim, now: i64) -> Self {
        Self {
            entity: entity.map(ToString::to_string),
            validity: signed.claim().validity_at(now),
            claim: signed.claim().clone(),
            token: signed.token().to_string(),
        }
    }

    /// Pretty-printed JSON.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| StoreError::Serialization(e).into())
    }
}

/// Describe a stored claim.
pub async fn describe<S: Store>(ctx: &Context<S>, entity: &EntityRef) -> Result<Description> {
    let signed = ctx.load_claim(entity).await?;
    Ok(Description::new(Some(entity), &signed, ctx.now()))
}

/// Describe any token, such as an activation. Only the signature is
/// checked.
pub fn describe_token(token: &str, now: i64) -> Result<Description> {
    let signed = SignedClaim::decode(token.trim())?;
    Ok(Description::new(None, &signed, now))
}

/// Check the whole tree of an operator (the selected one when `None`).
///
/// Every account must be signed by the operator and every user by its
/// account. Chain and structure failures are errors; expired, not yet
/// valid, and revoked claims are warnings. Only a missing operator fails
/// the call itself.
pub async fn validate<S: Store>(ctx: &Context<S>, operator: Option<&str>) -> Result<Report> {
    let operator = match operator {
        Some(name) => EntityRef::operator(name),
        None => ctx.operator()?,
    };
    let now = ctx.now();
    let mut report = Report::new();

    let op = ctx.load_claim(&operator).await?;
    check(&mut report, &operator, &op, now);

    for name in ctx.store().list(Some(&operator)).await? {
        let entity = EntityRef::account(operator.name(), &name);
        let Some(account) = load_verified(ctx, &mut report, &entity, &op).await else {
            continue;
        };
        check(&mut report, &entity, &account, now);
        let Ok(body) = account.claim().as_account() else {
            continue;
        };

        for user in ctx.store().list(Some(&entity)).await? {
            let user_entity = EntityRef::user(operator.name(), &name, &user);
            let Some(signed) = load_verified(ctx, &mut report, &user_entity, &account).await
            else {
                continue;
            };
            check(&mut report, &user_entity, &signed, now);
            if body.is_user_revoked(&signed.subject().encode(), signed.claim().iat) {
                report.warn(format!("{user_entity}: revoked by its account"));
            }
        }
    }

    debug!(%operator, errors = report.has_errors(), "validated tree");
    Ok(report)
}

/// Load a claim and verify it was issued by `parent`'s subject.
async fn load_verified<S: Store>(
    ctx: &Context<S>,
    report: &mut Report,
    entity: &EntityRef,
    parent: &SignedClaim,
) -> Option<SignedClaim> {
    let signed = match ctx.load_claim(entity).await {
        Ok(signed) => signed,
        Err(e) => {
            report.error(format!("{entity}: {e}"));
            return None;
        }
    };
    match verify(signed.token(), &parent.subject()) {
        Ok(signed) => Some(signed),
        Err(e) => {
            report.error(format!("{entity}: {e}"));
            None
        }
    }
}

fn check(report: &mut Report, entity: &EntityRef, signed: &SignedClaim, now: i64) {
    if let Err(e) = validate_signed(signed.claim()) {
        report.error(format!("{entity}: {e}"));
        return;
    }
    match signed.claim().validity_at(now) {
        Validity::Active => report.ok(format!("{entity}: valid")),
        Validity::Expired => report.warn(format!("{entity}: expired")),
        Validity::NotYetValid => report.warn(format!("{entity}: not yet valid")),
    }
}
