//! User actions.

use tracing::info;

use trellis_core::{ClaimBuilder, Role};
use trellis_store::{EntityRef, Store};

use crate::actions::account::remove_user_keys;
use crate::actions::{edit_claim, ensure_absent, store_seed, write_creds, DeleteOptions};
use crate::context::Context;
use crate::error::{Error, Result};
use crate::mutation::UserEdit;
use crate::report::{Applied, Report};
use crate::resolver::Fallback;

/// Parameters of [`add_user`].
#[derive(Debug, Clone, Default)]
pub struct AddUser {
    /// The account; the selected one when absent.
    pub account: Option<String>,
    pub name: String,
    /// Seed, public key, or key file; a fresh key when absent.
    pub key: Option<String>,
    pub edit: UserEdit,
}

impl AddUser {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }
}

/// Create a user signed by its account.
///
/// When the user's seed is known it is stored and a creds bundle written.
pub async fn add_user<S: Store>(ctx: &Context<S>, params: &AddUser) -> Result<Applied> {
    params.edit.validate()?;
    let entity = ctx.user(params.account.as_deref(), &params.name)?;
    ensure_absent(ctx, &entity).await?;
    let account = entity
        .parent()
        .ok_or_else(|| Error::invalid("user", format!("{entity} has no account")))?;

    let keypair = ctx.resolver().resolve(
        Role::User,
        params.key.as_deref(),
        Fallback::Generate,
    )?;
    let signer = ctx.signer_for(&account).await?;
    let now = ctx.now();
    let mut draft = ClaimBuilder::user(keypair.public_key(), &params.name);
    params.edit.apply(draft.claim_mut(), now)?;
    let signed = draft.sign(&signer, now)?;
    ctx.store().create(&entity, &signed).await?;
    info!(%entity, key = %signed.subject(), "created user");

    let mut report = Report::new();
    report.ok(format!("created {entity}"));
    store_seed(ctx, &keypair, &mut report).await;
    write_creds(ctx, &entity, &signed, &mut report).await;
    Ok(Applied::new(signed, report))
}

/// Edit a user of the named (or selected) account and refresh its creds.
pub async fn edit_user<S: Store>(
    ctx: &Context<S>,
    account: Option<&str>,
    name: &str,
    edit: &UserEdit,
) -> Result<Applied> {
    edit.validate()?;
    let entity = ctx.user(account, name)?;
    let now = ctx.now();
    let signed = edit_claim(ctx, &entity, |claim| edit.apply(claim, now)).await?;
    info!(%entity, jti = %signed.jti(), "edited user");

    let mut report = Report::new();
    report.ok(format!("edited {entity}"));
    write_creds(ctx, &entity, &signed, &mut report).await;
    Ok(Applied::new(signed, report))
}

/// Delete a user of the named (or selected) account.
pub async fn delete_user<S: Store>(
    ctx: &Context<S>,
    account: Option<&str>,
    name: &str,
    options: DeleteOptions,
) -> Result<Report> {
    let entity = ctx.user(account, name)?;
    let signed = ctx.load_claim(&entity).await?;
    ctx.store().delete(&entity).await?;
    info!(%entity, "deleted user");

    let mut report = Report::new();
    report.ok(format!("deleted {entity}"));
    if options.remove_keys {
        if let EntityRef::User {
            operator, account, ..
        } = &entity
        {
            remove_user_keys(ctx, operator, account, name, signed.subject(), &mut report).await;
        }
    }
    Ok(report)
}
