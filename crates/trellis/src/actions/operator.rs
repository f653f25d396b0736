//! Operator actions.

use tracing::info;

use trellis_core::{ClaimBuilder, Role};
use trellis_store::{EntityRef, Store};

use crate::actions::{edit_claim, ensure_absent, select, store_seed};
use crate::context::Context;
use crate::error::Result;
use crate::mutation::OperatorEdit;
use crate::report::{Applied, Report};
use crate::resolver::Fallback;

/// Parameters of [`init_operator`].
#[derive(Debug, Clone, Default)]
pub struct InitOperator {
    pub name: String,
    /// Seed, public key, or key file; a fresh key when absent.
    pub key: Option<String>,
    pub edit: OperatorEdit,
}

impl InitOperator {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }
}

/// Create a self-signed operator, store its seed, and select it.
pub async fn init_operator<S: Store>(
    ctx: &mut Context<S>,
    params: &InitOperator,
) -> Result<Applied> {
    params.edit.validate()?;
    let entity = EntityRef::operator(&params.name);
    ensure_absent(ctx, &entity).await?;

    let keypair = ctx.resolver().resolve(
        Role::Operator,
        params.key.as_deref(),
        Fallback::Generate,
    )?;
    let now = ctx.now();
    let mut draft = ClaimBuilder::operator(keypair.public_key(), &params.name);
    params.edit.apply(draft.claim_mut(), now)?;
    let signed = draft.sign(&keypair, now)?;
    ctx.store().create(&entity, &signed).await?;
    info!(%entity, key = %signed.subject(), "created operator");

    let mut report = Report::new();
    report.ok(format!("created {entity}"));
    store_seed(ctx, &keypair, &mut report).await;
    let name = params.name.clone();
    select(ctx, entity.to_string(), &mut report, |s| s.select_operator(name)).await;
    Ok(Applied::new(signed, report))
}

/// Edit the selected operator.
pub async fn edit_operator<S: Store>(ctx: &Context<S>, edit: &OperatorEdit) -> Result<Applied> {
    edit.validate()?;
    let entity = ctx.operator()?;
    let now = ctx.now();
    let signed = edit_claim(ctx, &entity, |claim| edit.apply(claim, now)).await?;
    info!(%entity, jti = %signed.jti(), "edited operator");

    let mut report = Report::new();
    report.ok(format!("edited {entity}"));
    Ok(Applied::new(signed, report))
}

/// Select an existing operator.
pub async fn select_operator<S: Store>(ctx: &mut Context<S>, name: &str) -> Result<Report> {
    let entity = EntityRef::operator(name);
    ctx.load_claim(&entity).await?;

    let mut report = Report::new();
    let name = name.to_string();
    select(ctx, entity.to_string(), &mut report, |s| s.select_operator(name)).await;
    Ok(report)
}
