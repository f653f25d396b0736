//! Export actions.

use tracing::info;

use trellis_core::{Export, ExportKind};
use trellis_store::Store;

use crate::actions::edit_claim;
use crate::context::Context;
use crate::error::Result;
use crate::mutation::{check_new_export, ExportEdit};
use crate::report::{Applied, Report};

/// Add an export to the named (or selected) account.
pub async fn add_export<S: Store>(
    ctx: &Context<S>,
    account: Option<&str>,
    export: Export,
) -> Result<Applied> {
    check_new_export(&export)?;
    let entity = ctx.account(account)?;
    let label = format!("{} export {:?}", export.kind, export.subject);
    let public = !export.token_required;

    let signed = edit_claim(ctx, &entity, |claim| {
        claim.as_account_mut()?.add_export(export)?;
        Ok(())
    })
    .await?;
    info!(%entity, %label, "added export");

    let mut report = Report::new();
    report.ok(format!("added {label} to {entity}"));
    if public {
        report.ok(format!("{label} is public; importers need no activation"));
    }
    Ok(Applied::new(signed, report))
}

/// Edit an export of the named (or selected) account.
pub async fn edit_export<S: Store>(
    ctx: &Context<S>,
    account: Option<&str>,
    edit: &ExportEdit,
) -> Result<Applied> {
    edit.validate()?;
    let entity = ctx.account(account)?;
    let signed = edit_claim(ctx, &entity, |claim| edit.apply(claim)).await?;
    info!(%entity, subject = %edit.subject, "edited export");

    let mut report = Report::new();
    report.ok(format!(
        "edited {} export {:?} of {entity}",
        edit.kind, edit.subject
    ));
    Ok(Applied::new(signed, report))
}

/// Remove an export, with its activation revocations, from the named (or
/// selected) account.
pub async fn delete_export<S: Store>(
    ctx: &Context<S>,
    account: Option<&str>,
    subject: &str,
    kind: ExportKind,
) -> Result<Applied> {
    let entity = ctx.account(account)?;
    let mut removed = None;
    let signed = edit_claim(ctx, &entity, |claim| {
        removed = Some(claim.as_account_mut()?.remove_export(subject, kind)?);
        Ok(())
    })
    .await?;
    info!(%entity, %subject, "deleted export");

    let mut report = Report::new();
    report.ok(format!("deleted {kind} export {subject:?} from {entity}"));
    if let Some(export) = removed.filter(|e| !e.revocations.is_empty()) {
        report.warn(format!(
            "dropped {} activation revocation(s) with the export",
            export.revocations.len()
        ));
    }
    Ok(Applied::new(signed, report))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::account::{add_account, AddAccount};
    use crate::actions::operator::{init_operator, InitOperator};
    use crate::config::TrellisConfig;
    use crate::context::Clock;
    use crate::error::ErrorKind;
    use crate::mutation::Field;
    use tempfile::TempDir;
    use trellis_core::ResponseType;
    use trellis_store::{EntityRef, KeyStore, MemoryStore};

    async fn context() -> (TempDir, Context<MemoryStore>) {
        let dir = TempDir::new().unwrap();
        let keys = KeyStore::open(dir.path()).unwrap();
        let mut ctx = Context::load(MemoryStore::new(), keys, TrellisConfig::in_dir(dir.path()))
            .await
            .unwrap()
            .with_clock(Clock::Fixed(100));
        init_operator(&mut ctx, &InitOperator::new("O")).await.unwrap();
        add_account(&mut ctx, &AddAccount::new("A")).await.unwrap();
        (dir, ctx)
    }

    #[tokio::test]
    async fn test_add_and_edit_export() {
        let (_dir, ctx) = context().await;
        add_export(&ctx, None, Export::service("help.>")).await.unwrap();

        let mut edit = ExportEdit::new("help.>", ExportKind::Service);
        edit.token_required = Some(true);
        edit.response_type = Field::Set(ResponseType::Bounded { max_msgs: 3 });
        let applied = edit_export(&ctx, None, &edit).await.unwrap();

        let account = applied.signed.claim().as_account().unwrap();
        let export = account.export("help.>", ExportKind::Service).unwrap();
        assert!(export.token_required);
        assert_eq!(
            export.response_type,
            Some(ResponseType::Bounded { max_msgs: 3 })
        );
    }

    #[tokio::test]
    async fn test_duplicate_export() {
        let (_dir, ctx) = context().await;
        add_export(&ctx, None, Export::stream("foo.>")).await.unwrap();
        let err = add_export(&ctx, None, Export::stream("foo.>"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ValidationFailed);

        // Same subject, other kind.
        add_export(&ctx, None, Export::service("foo.>")).await.unwrap();
    }

    #[tokio::test]
    async fn test_invalid_subject() {
        let (_dir, ctx) = context().await;
        let err = add_export(&ctx, None, Export::stream("foo..bar"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ValidationFailed);
    }

    #[tokio::test]
    async fn test_delete_export() {
        let (_dir, ctx) = context().await;
        add_export(&ctx, None, Export::stream("foo.>")).await.unwrap();
        delete_export(&ctx, None, "foo.>", ExportKind::Stream)
            .await
            .unwrap();

        let stored = ctx.load_claim(&EntityRef::account("O", "A")).await.unwrap();
        assert!(stored.claim().as_account().unwrap().exports.is_empty());

        let err = delete_export(&ctx, None, "foo.>", ExportKind::Stream)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ValidationFailed);
    }
}
