//! Account actions.

use tracing::{info, warn};

use trellis_core::{ClaimBuilder, PublicKey, Role};
use trellis_store::{EntityRef, Store};

use crate::actions::{edit_claim, ensure_absent, select, store_seed, DeleteOptions};
use crate::context::{found, Context};
use crate::error::Result;
use crate::mutation::AccountEdit;
use crate::report::{Applied, Report};
use crate::resolver::Fallback;

/// Parameters of [`add_account`].
#[derive(Debug, Clone, Default)]
pub struct AddAccount {
    pub name: String,
    /// Seed, public key, or key file; a fresh key when absent.
    pub key: Option<String>,
    pub edit: AccountEdit,
}

impl AddAccount {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }
}

/// Create an account under the selected operator and select it.
///
/// The account key may be public-only; the operator signs.
pub async fn add_account<S: Store>(ctx: &mut Context<S>, params: &AddAccount) -> Result<Applied> {
    params.edit.validate()?;
    let operator = ctx.operator()?;
    let entity = EntityRef::account(operator.name(), &params.name);
    ensure_absent(ctx, &entity).await?;

    let keypair = ctx.resolver().resolve(
        Role::Account,
        params.key.as_deref(),
        Fallback::Generate,
    )?;
    let signer = ctx.signer_for(&operator).await?;
    let now = ctx.now();
    let mut draft = ClaimBuilder::account(keypair.public_key(), &params.name);
    params.edit.apply(draft.claim_mut(), now)?;
    let signed = draft.sign(&signer, now)?;
    ctx.store().create(&entity, &signed).await?;
    info!(%entity, key = %signed.subject(), "created account");

    let mut report = Report::new();
    report.ok(format!("created {entity}"));
    store_seed(ctx, &keypair, &mut report).await;
    let name = params.name.clone();
    select(ctx, entity.to_string(), &mut report, |s| s.select_account(name)).await;
    Ok(Applied::new(signed, report))
}

/// Edit the named (or selected) account.
pub async fn edit_account<S: Store>(
    ctx: &Context<S>,
    account: Option<&str>,
    edit: &AccountEdit,
) -> Result<Applied> {
    edit.validate()?;
    let entity = ctx.account(account)?;
    let now = ctx.now();
    let signed = edit_claim(ctx, &entity, |claim| edit.apply(claim, now)).await?;
    info!(%entity, jti = %signed.jti(), "edited account");

    let mut report = Report::new();
    report.ok(format!("edited {entity}"));
    Ok(Applied::new(signed, report))
}

/// Delete an account and its users.
pub async fn delete_account<S: Store>(
    ctx: &mut Context<S>,
    name: &str,
    options: DeleteOptions,
) -> Result<Report> {
    let entity = ctx.account(Some(name))?;
    let account = ctx.load_claim(&entity).await?;

    // Collect user keys before the records are gone.
    let mut users: Vec<(String, PublicKey)> = Vec::new();
    if options.remove_keys {
        for user in ctx.store().list(Some(&entity)).await? {
            let Some(child) = entity.child(&user) else {
                continue;
            };
            match found(ctx.store().get(&child).await)? {
                Some(signed) => users.push((user, signed.subject())),
                None => warn!(entity = %child, "user vanished during delete"),
            }
        }
    }

    ctx.store().delete(&entity).await?;
    info!(%entity, "deleted account");
    let mut report = Report::new();
    report.ok(format!("deleted {entity}"));

    if options.remove_keys {
        let operator = ctx.operator()?.name().to_string();
        for (user, key) in users {
            remove_user_keys(ctx, &operator, name, &user, key, &mut report).await;
        }
        remove_seed(ctx, account.subject(), &mut report).await;
    }

    if let Err(e) = ctx.update_selection(|s| s.forget_account(name)).await {
        report.error(format!("could not update selection: {e}"));
    }
    Ok(report)
}

/// Select an existing account of the selected operator.
pub async fn select_account<S: Store>(ctx: &mut Context<S>, name: &str) -> Result<Report> {
    let entity = ctx.account(Some(name))?;
    ctx.load_claim(&entity).await?;

    let mut report = Report::new();
    let name = name.to_string();
    select(ctx, entity.to_string(), &mut report, |s| s.select_account(name)).await;
    Ok(report)
}

pub(crate) async fn remove_seed<S: Store>(ctx: &Context<S>, key: PublicKey, report: &mut Report) {
    let result = ctx.with_keys(move |keys| keys.remove(&key)).await;
    match result {
        Ok(true) => report.ok(format!("removed seed for {key}")),
        Ok(false) => {}
        Err(e) => report.error(format!("could not remove seed for {key}: {e}")),
    }
}

pub(crate) async fn remove_user_keys<S: Store>(
    ctx: &Context<S>,
    operator: &str,
    account: &str,
    user: &str,
    key: PublicKey,
    report: &mut Report,
) {
    remove_seed(ctx, key, report).await;
    let (operator, account, user) = (operator.to_string(), account.to_string(), user.to_string());
    let label = format!("{operator}/{account}/{user}");
    let result = ctx
        .with_keys(move |keys| keys.remove_creds(&operator, &account, &user))
        .await;
    match result {
        Ok(true) => report.ok(format!("removed creds for {label}")),
        Ok(false) => {}
        Err(e) => report.error(format!("could not remove creds for {label}: {e}")),
    }
}
