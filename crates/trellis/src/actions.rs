//! Library actions over the trust hierarchy.
//!
//! Every action that changes a claim runs one read-modify-sign-write
//! cycle: load the stored claim, apply a validated mutation to a draft,
//! sign the draft with the parent's key, and replace the stored record if
//! it has not changed in the meantime. Side effects after the write are
//! itemized in the returned [`Report`].

pub mod account;
pub mod activation;
pub mod export;
pub mod inspect;
pub mod operator;
pub mod remote;
pub mod revoke;
pub mod user;

use tracing::debug;

use trellis_core::{Claim, ClaimBuilder, KeyPair, SignedClaim};
use trellis_store::{EntityRef, Store, StoreError};

use crate::context::Context;
use crate::error::Result;
use crate::report::Report;

/// Options for deleting an entity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeleteOptions {
    /// Also delete stored seeds and creds bundles.
    pub remove_keys: bool,
}

/// Apply `f` to a draft of the stored claim at `entity`, sign it with the
/// issuer's key, and replace the stored record.
///
/// Fails with `Conflict` if the record changed while the draft was open.
pub(crate) async fn edit_claim<S, F>(
    ctx: &Context<S>,
    entity: &EntityRef,
    f: F,
) -> Result<SignedClaim>
where
    S: Store,
    F: FnOnce(&mut Claim) -> Result<()>,
{
    let current = ctx.load_claim(entity).await?;
    let mut draft = ClaimBuilder::from_claim(current.claim().clone());
    f(draft.claim_mut())?;

    let issuer = entity.parent().unwrap_or_else(|| entity.clone());
    let signer = ctx.signer_for(&issuer).await?;
    let signed = draft.sign(&signer, ctx.now())?;
    ctx.store().replace(entity, &signed, current.jti()).await?;
    debug!(%entity, jti = %signed.jti(), "re-signed claim");
    Ok(signed)
}

/// Fail with `AlreadyExists` if `entity` is stored.
pub(crate) async fn ensure_absent<S: Store>(ctx: &Context<S>, entity: &EntityRef) -> Result<()> {
    if ctx.store().has(entity).await? {
        return Err(StoreError::AlreadyExists(entity.to_string()).into());
    }
    Ok(())
}

/// Store the seed of `keypair`, if it has one.
pub(crate) async fn store_seed<S: Store>(ctx: &Context<S>, keypair: &KeyPair, report: &mut Report) {
    let key = keypair.public_key();
    if !keypair.has_private() {
        report.warn(format!("no seed for {key}; nothing stored"));
        return;
    }
    let owned = keypair.clone();
    let result = ctx.with_keys(move |keys| keys.store(&owned)).await;
    report.record(
        result,
        |path| format!("stored seed for {key} at {}", path.display()),
        &format!("could not store seed for {key}"),
    );
}

/// Write the creds bundle of a user whose seed is stored.
pub(crate) async fn write_creds<S: Store>(
    ctx: &Context<S>,
    user: &EntityRef,
    signed: &SignedClaim,
    report: &mut Report,
) {
    if !ctx.config().generate_creds {
        return;
    }
    let EntityRef::User {
        operator,
        account,
        name,
    } = user.clone()
    else {
        return;
    };

    let key = signed.subject();
    let token = signed.token().to_string();
    let result = ctx
        .with_keys(move |keys| match keys.get(&key)? {
            Some(keypair) => keys
                .store_creds(&operator, &account, &name, &token, &keypair)
                .map(Some),
            None => Ok(None),
        })
        .await;

    match result {
        Ok(Some(path)) => report.ok(format!("wrote creds for {user} to {}", path.display())),
        Ok(None) => report.warn(format!("no seed stored for {user}; creds not written")),
        Err(e) => report.error(format!("could not write creds for {user}: {e}")),
    }
}

/// Persist a selection change, itemizing the outcome.
pub(crate) async fn select<S, F>(ctx: &mut Context<S>, what: String, report: &mut Report, f: F)
where
    S: Store,
    F: FnOnce(&mut trellis_store::Selection),
{
    let result = ctx.update_selection(f).await;
    report.record(
        result,
        |_| format!("selected {what}"),
        &format!("could not select {what}"),
    );
}
