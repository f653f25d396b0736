//! Activation tokens for private exports.

use tracing::info;

use trellis_core::{ClaimBuilder, CoreError, ExportKind, PublicKey, Role, SignedClaim};
use trellis_perms::validate_subject;
use trellis_store::Store;

use crate::context::Context;
use crate::error::Result;
use crate::mutation::TimeSpec;

/// Parameters of [`generate_activation`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerateActivation {
    /// The subject granted; the export's own subject or one it contains.
    pub subject: String,
    pub kind: ExportKind,
    /// Public key of the importing account.
    pub target: String,
    /// Defaults to the subject.
    pub name: Option<String>,
    pub not_before: Option<TimeSpec>,
    pub expires: Option<TimeSpec>,
}

impl GenerateActivation {
    pub fn new(subject: impl Into<String>, kind: ExportKind, target: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            kind,
            target: target.into(),
            name: None,
            not_before: None,
            expires: None,
        }
    }
}

/// Sign an activation granting `params.target` import access to a
/// token-required export of the named (or selected) account.
///
/// The token is returned, not stored; it is handed to the importer.
pub async fn generate_activation<S: Store>(
    ctx: &Context<S>,
    account: Option<&str>,
    params: &GenerateActivation,
) -> Result<SignedClaim> {
    validate_subject(&params.subject)?;
    let target = PublicKey::decode_as(&params.target, Role::Account)?;
    let entity = ctx.account(account)?;
    let stored = ctx.load_claim(&entity).await?;
    let now = ctx.now();

    let export = stored
        .claim()
        .as_account()?
        .covering_export(&params.subject, params.kind)?;
    if !export.token_required {
        return Err(CoreError::ValidationFailed(format!(
            "{} export {:?} is public and needs no activation",
            export.kind, export.subject
        ))
        .into());
    }
    if export.is_revoked_at(&target.encode(), now) {
        return Err(CoreError::ValidationFailed(format!(
            "activations for {target} on {} export {:?} are revoked",
            export.kind, export.subject
        ))
        .into());
    }

    let signer = ctx.signer_for(&entity).await?;
    let name = params.name.clone().unwrap_or_else(|| params.subject.clone());
    let signed = ClaimBuilder::activation(target, name, &params.subject, params.kind)
        .not_before(params.not_before.map(|t| t.resolve(now)))
        .expires(params.expires.map(|t| t.resolve(now)))
        .sign(&signer, now)?;
    info!(%entity, %target, subject = %params.subject, "generated activation");
    Ok(signed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::account::{add_account, AddAccount};
    use crate::actions::export::add_export;
    use crate::actions::operator::{init_operator, InitOperator};
    use crate::actions::revoke::revoke_activation;
    use crate::config::TrellisConfig;
    use crate::context::Clock;
    use crate::error::ErrorKind;
    use crate::mutation::RevokeActivation;
    use tempfile::TempDir;
    use trellis_core::{verify, ClaimKind, Export, KeyPair};
    use trellis_store::{EntityRef, KeyStore, MemoryStore};

    async fn context() -> (TempDir, Context<MemoryStore>) {
        let dir = TempDir::new().unwrap();
        let keys = KeyStore::open(dir.path()).unwrap();
        let mut ctx = Context::load(MemoryStore::new(), keys, TrellisConfig::in_dir(dir.path()))
            .await
            .unwrap()
            .with_clock(Clock::Fixed(1_000));
        init_operator(&mut ctx, &InitOperator::new("O")).await.unwrap();
        add_account(&mut ctx, &AddAccount::new("A")).await.unwrap();

        let mut private = Export::service("help.>");
        private.token_required = true;
        add_export(&ctx, None, private).await.unwrap();
        add_export(&ctx, None, Export::stream("news.>")).await.unwrap();
        (dir, ctx)
    }

    #[tokio::test]
    async fn test_activation_is_signed_by_exporter() {
        let (_dir, ctx) = context().await;
        let importer = KeyPair::generate(Role::Account).public_key();
        let mut params = GenerateActivation::new("help.billing", ExportKind::Service, importer.encode());
        params.expires = Some(TimeSpec::FromNow(3_600));

        let signed = generate_activation(&ctx, None, &params).await.unwrap();
        let exporter = ctx.load_claim(&EntityRef::account("O", "A")).await.unwrap();
        verify(signed.token(), &exporter.subject()).unwrap();
        assert_eq!(signed.kind(), ClaimKind::Activation);
        assert_eq!(signed.subject(), importer);
        assert_eq!(signed.claim().exp, Some(4_600));
    }

    #[tokio::test]
    async fn test_public_export_needs_no_activation() {
        let (_dir, ctx) = context().await;
        let importer = KeyPair::generate(Role::Account).public_key().encode();
        let params = GenerateActivation::new("news.>", ExportKind::Stream, importer);
        let err = generate_activation(&ctx, None, &params).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ValidationFailed);
    }

    #[tokio::test]
    async fn test_revoked_target() {
        let (_dir, ctx) = context().await;
        let importer = KeyPair::generate(Role::Account).public_key().encode();
        let revoke = RevokeActivation::new("help.>", ExportKind::Service, &importer);
        revoke_activation(&ctx, None, &revoke).await.unwrap();

        let params = GenerateActivation::new("help.>", ExportKind::Service, importer);
        let err = generate_activation(&ctx, None, &params).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ValidationFailed);
    }

    #[tokio::test]
    async fn test_target_must_be_account() {
        let (_dir, ctx) = context().await;
        let user = KeyPair::generate(Role::User).public_key().encode();
        let params = GenerateActivation::new("help.>", ExportKind::Service, user);
        let err = generate_activation(&ctx, None, &params).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::KeyMismatch);
    }
}
