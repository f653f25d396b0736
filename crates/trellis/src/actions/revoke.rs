//! Revocation of activation tokens and user tokens.
//!
//! A revocation sets a cutoff: tokens issued at or before it are invalid.
//! Revoking a target again overwrites its cutoff, even with an earlier
//! one; that case is reported as a warning because it re-validates tokens
//! issued between the two cutoffs.

use tracing::{info, warn};

use trellis_core::{ExportKind, PublicKey, Role};
use trellis_perms::ALL_TARGETS;
use trellis_store::{EntityRef, Store};

use crate::actions::edit_claim;
use crate::context::Context;
use crate::error::{Error, Result};
use crate::mutation::{check_target, RevokeActivation, RevokeUser};
use crate::report::{Applied, Report};

/// Revoke activations of an export of the named (or selected) account.
///
/// The export is the one whose subject equals `req.subject`, or else the
/// first export of the same kind whose pattern contains it.
pub async fn revoke_activation<S: Store>(
    ctx: &Context<S>,
    account: Option<&str>,
    req: &RevokeActivation,
) -> Result<Applied> {
    req.validate()?;
    let entity = ctx.account(account)?;
    let now = ctx.now();
    let cutoff = req.at.map_or(now, |at| at.resolve(now));

    let mut previous = None;
    let mut export_subject = String::new();
    let mut public = false;
    let signed = edit_claim(ctx, &entity, |claim| {
        let export = claim
            .as_account_mut()?
            .covering_export_mut(&req.subject, req.kind)?;
        previous = export.revoke(req.target.clone(), cutoff);
        export_subject = export.subject.clone();
        public = !export.token_required;
        Ok(())
    })
    .await?;
    info!(%entity, export = %export_subject, target = %req.target, cutoff, "revoked activation");

    let mut report = Report::new();
    report.ok(format!(
        "revoked activations for {} on {} export {export_subject:?} issued at or before {cutoff}",
        req.target, req.kind
    ));
    note_backwards(&mut report, &req.target, previous, cutoff);
    if public {
        report.warn(format!(
            "{} export {export_subject:?} is public; activation revocations do not restrict it",
            req.kind
        ));
    }
    Ok(Applied::new(signed, report))
}

/// Remove an activation revocation from an export.
pub async fn clear_activation_revocation<S: Store>(
    ctx: &Context<S>,
    account: Option<&str>,
    subject: &str,
    kind: ExportKind,
    target: &str,
) -> Result<Applied> {
    check_target(target, Role::Account)?;
    let entity = ctx.account(account)?;

    let stored = ctx.load_claim(&entity).await?;
    let export = stored.claim().as_account()?.covering_export(subject, kind)?;
    let mut report = Report::new();
    if export.revocations.cutoff(target).is_none() {
        report.warn(format!(
            "{target} was not revoked on {kind} export {:?}",
            export.subject
        ));
        return Ok(Applied::new(stored, report));
    }

    let mut previous = None;
    let signed = edit_claim(ctx, &entity, |claim| {
        let export = claim
            .as_account_mut()?
            .covering_export_mut(subject, kind)?;
        previous = export.clear_revocation(target);
        Ok(())
    })
    .await?;

    if let Some(cutoff) = previous {
        info!(%entity, %subject, %target, "cleared activation revocation");
        report.ok(format!(
            "cleared revocation of {target} on {kind} export {subject:?} (was {cutoff})"
        ));
    }
    Ok(Applied::new(signed, report))
}

/// Revoke user tokens of the named (or selected) account.
pub async fn revoke_user<S: Store>(
    ctx: &Context<S>,
    account: Option<&str>,
    req: &RevokeUser,
) -> Result<Applied> {
    let entity = ctx.account(account)?;
    let target = user_target(ctx, &entity, &req.target).await?;
    let now = ctx.now();
    let cutoff = req.at.map_or(now, |at| at.resolve(now));

    let mut previous = None;
    let signed = edit_claim(ctx, &entity, |claim| {
        previous = claim
            .as_account_mut()?
            .revoke_user(target.clone(), cutoff);
        Ok(())
    })
    .await?;
    info!(%entity, %target, cutoff, "revoked user");

    let mut report = Report::new();
    report.ok(format!(
        "revoked user tokens of {target} issued at or before {cutoff}"
    ));
    note_backwards(&mut report, &target, previous, cutoff);
    Ok(Applied::new(signed, report))
}

/// Remove a user revocation.
pub async fn clear_user_revocation<S: Store>(
    ctx: &Context<S>,
    account: Option<&str>,
    target: &str,
) -> Result<Applied> {
    let entity = ctx.account(account)?;
    let target = user_target(ctx, &entity, target).await?;

    let stored = ctx.load_claim(&entity).await?;
    let mut report = Report::new();
    if stored.claim().as_account()?.revocations.cutoff(&target).is_none() {
        report.warn(format!("{target} was not revoked"));
        return Ok(Applied::new(stored, report));
    }

    let mut previous = None;
    let signed = edit_claim(ctx, &entity, |claim| {
        previous = claim.as_account_mut()?.clear_user_revocation(&target);
        Ok(())
    })
    .await?;

    if let Some(cutoff) = previous {
        info!(%entity, %target, "cleared user revocation");
        report.ok(format!("cleared revocation of {target} (was {cutoff})"));
    }
    Ok(Applied::new(signed, report))
}

/// `*`, a user public key, or the key of a named user of `account`.
async fn user_target<S: Store>(
    ctx: &Context<S>,
    account: &EntityRef,
    target: &str,
) -> Result<String> {
    let target = target.trim();
    if target == ALL_TARGETS {
        return Ok(target.to_string());
    }
    if let Ok(key) = PublicKey::decode(target) {
        key.expect_role(Role::User)?;
        return Ok(key.encode());
    }
    let user = account
        .child(target)
        .ok_or_else(|| Error::invalid("user", format!("{account} has no users")))?;
    Ok(ctx.load_claim(&user).await?.subject().encode())
}

fn note_backwards(report: &mut Report, target: &str, previous: Option<i64>, cutoff: i64) {
    if let Some(previous) = previous.filter(|p| *p > cutoff) {
        warn!(%target, previous, cutoff, "revocation cutoff moved backwards");
        report.warn(format!(
            "cutoff for {target} moved backwards from {previous} to {cutoff}; \
             tokens issued in between are valid again"
        ));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::account::{add_account, AddAccount};
    use crate::actions::export::add_export;
    use crate::actions::operator::{init_operator, InitOperator};
    use crate::actions::user::{add_user, AddUser};
    use crate::config::TrellisConfig;
    use crate::context::Clock;
    use crate::error::ErrorKind;
    use crate::mutation::TimeSpec;
    use tempfile::TempDir;
    use trellis_core::{Export, KeyPair};
    use trellis_store::{KeyStore, MemoryStore};

    async fn context() -> (TempDir, Context<MemoryStore>) {
        let dir = TempDir::new().unwrap();
        let keys = KeyStore::open(dir.path()).unwrap();
        let mut ctx = Context::load(MemoryStore::new(), keys, TrellisConfig::in_dir(dir.path()))
            .await
            .unwrap()
            .with_clock(Clock::Fixed(5_000));
        init_operator(&mut ctx, &InitOperator::new("O")).await.unwrap();
        add_account(&mut ctx, &AddAccount::new("A")).await.unwrap();
        (dir, ctx)
    }

    fn target() -> String {
        KeyPair::generate(Role::Account).public_key().encode()
    }

    #[tokio::test]
    async fn test_revoke_by_contained_subject() {
        let (_dir, ctx) = context().await;
        add_export(&ctx, None, Export::stream("foo.>")).await.unwrap();
        let acct1 = target();

        let req = RevokeActivation::new("foo.bar", ExportKind::Stream, &acct1);
        let applied = revoke_activation(&ctx, None, &req).await.unwrap();

        let account = applied.signed.claim().as_account().unwrap();
        let export = account.export("foo.>", ExportKind::Stream).unwrap();
        assert_eq!(export.revocations.cutoff(&acct1), Some(5_000));
        assert!(export.is_revoked_at(&acct1, 0));
        assert!(export.is_revoked_at(&acct1, 5_000));
        assert!(!export.is_revoked_at(&acct1, 5_001));
    }

    #[tokio::test]
    async fn test_revoke_service_at_cutoff() {
        let (_dir, ctx) = context().await;
        add_export(&ctx, None, Export::service("bar")).await.unwrap();
        let acct1 = target();

        let req = RevokeActivation::new("bar", ExportKind::Service, &acct1).at(TimeSpec::At(1000));
        let applied = revoke_activation(&ctx, None, &req).await.unwrap();

        let account = applied.signed.claim().as_account().unwrap();
        let export = account.export("bar", ExportKind::Service).unwrap();
        assert!(export.is_revoked_at(&acct1, 999));
        assert!(export.is_revoked_at(&acct1, 1000));
        assert!(!export.is_revoked_at(&acct1, 1001));
    }

    #[tokio::test]
    async fn test_no_matching_export() {
        let (_dir, ctx) = context().await;
        add_export(&ctx, None, Export::stream("foo.>")).await.unwrap();
        let req = RevokeActivation::new("foo.bar", ExportKind::Service, target());
        let err = revoke_activation(&ctx, None, &req).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ValidationFailed);
    }

    #[tokio::test]
    async fn test_backwards_cutoff_warns_and_overwrites() {
        let (_dir, ctx) = context().await;
        let mut export = Export::service("bar");
        export.token_required = true;
        add_export(&ctx, None, export).await.unwrap();
        let acct1 = target();

        let later = RevokeActivation::new("bar", ExportKind::Service, &acct1).at(TimeSpec::At(2000));
        let first = revoke_activation(&ctx, None, &later).await.unwrap();
        assert!(!first.report.has_warnings());

        let earlier = RevokeActivation::new("bar", ExportKind::Service, &acct1).at(TimeSpec::At(1000));
        let applied = revoke_activation(&ctx, None, &earlier).await.unwrap();
        assert!(applied.report.has_warnings());

        let account = applied.signed.claim().as_account().unwrap();
        let export = account.export("bar", ExportKind::Service).unwrap();
        assert_eq!(export.revocations.cutoff(&acct1), Some(1000));
        assert!(!export.is_revoked_at(&acct1, 1500));
    }

    #[tokio::test]
    async fn test_clear_activation_revocation() {
        let (_dir, mut ctx) = context().await;
        add_export(&ctx, None, Export::stream("foo.>")).await.unwrap();
        let req = RevokeActivation::new("foo.>", ExportKind::Stream, ALL_TARGETS);
        revoke_activation(&ctx, None, &req).await.unwrap();
        ctx.set_clock(Clock::Fixed(6_000));

        let applied = clear_activation_revocation(&ctx, None, "foo.>", ExportKind::Stream, "*")
            .await
            .unwrap();
        let account = applied.signed.claim().as_account().unwrap();
        assert!(account.exports[0].revocations.is_empty());

        ctx.set_clock(Clock::Fixed(7_000));
        let again = clear_activation_revocation(&ctx, None, "foo.>", ExportKind::Stream, "*")
            .await
            .unwrap();
        assert!(again.report.has_warnings());
        assert_eq!(again.signed.claim().jti, applied.signed.claim().jti);
    }

    #[tokio::test]
    async fn test_clear_unrevoked_activation_leaves_claim() {
        let (_dir, mut ctx) = context().await;
        add_export(&ctx, None, Export::stream("foo.>")).await.unwrap();
        let entity = EntityRef::account("O", "A");
        let before = ctx.load_claim(&entity).await.unwrap();
        ctx.set_clock(Clock::Fixed(6_000));

        let applied = clear_activation_revocation(&ctx, None, "foo.bar", ExportKind::Stream, &target())
            .await
            .unwrap();
        assert!(applied.report.has_warnings());
        assert_eq!(applied.signed.claim().jti, before.claim().jti);

        let after = ctx.load_claim(&entity).await.unwrap();
        assert_eq!(after.claim().jti, before.claim().jti);
        assert_eq!(after.token(), before.token());
    }

    #[tokio::test]
    async fn test_clear_unrevoked_user_leaves_claim() {
        let (_dir, mut ctx) = context().await;
        let user = add_user(&ctx, &AddUser::new("U")).await.unwrap().signed;
        let entity = EntityRef::account("O", "A");
        let before = ctx.load_claim(&entity).await.unwrap();
        ctx.set_clock(Clock::Fixed(6_000));

        let applied = clear_user_revocation(&ctx, None, "U").await.unwrap();
        assert!(applied.report.has_warnings());
        assert_eq!(applied.signed.claim().jti, before.claim().jti);

        let after = ctx.load_claim(&entity).await.unwrap();
        assert_eq!(after.claim().jti, before.claim().jti);
        assert!(!after
            .claim()
            .as_account()
            .unwrap()
            .is_user_revoked(&user.subject().encode(), user.claim().iat));
    }

    #[tokio::test]
    async fn test_revoke_user_by_name() {
        let (_dir, ctx) = context().await;
        let user = add_user(&ctx, &AddUser::new("U")).await.unwrap().signed;

        let applied = revoke_user(&ctx, None, &RevokeUser::new("U")).await.unwrap();
        let account = applied.signed.claim().as_account().unwrap();
        assert!(account.is_user_revoked(&user.subject().encode(), user.claim().iat));

        let cleared = clear_user_revocation(&ctx, None, &user.subject().encode())
            .await
            .unwrap();
        let account = cleared.signed.claim().as_account().unwrap();
        assert!(!account.is_user_revoked(&user.subject().encode(), user.claim().iat));
    }

    #[tokio::test]
    async fn test_revoke_user_rejects_account_key() {
        let (_dir, ctx) = context().await;
        let err = revoke_user(&ctx, None, &RevokeUser::new(target()))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::KeyMismatch);
    }
}
