//! Publishing accounts to, and refreshing them from, a token server.

use trellis_store::Store;
use trellis_sync::{pull_account, push_account, PushOutcome, TokenServer};

use crate::context::Context;
use crate::error::Result;
use crate::report::{Applied, Report};

/// Push the named (or selected) account with the configured retry policy.
///
/// A refusal by the server is reported as an error item, not raised.
pub async fn push<S, T>(ctx: &Context<S>, server: &T, account: Option<&str>) -> Result<Report>
where
    S: Store,
    T: TokenServer + ?Sized,
{
    let entity = ctx.account(account)?;
    let outcome = push_account(ctx.store(), server, &entity, &ctx.config().sync).await?;

    let mut report = Report::new();
    match outcome {
        PushOutcome::Ack => report.ok(format!("pushed {entity}")),
        PushOutcome::Conflict { reason } => {
            report.error(format!("server refused {entity}: {reason}"))
        }
    }
    Ok(report)
}

/// Replace the named (or selected) account with the server's copy.
pub async fn pull<S, T>(ctx: &Context<S>, server: &T, account: Option<&str>) -> Result<Applied>
where
    S: Store,
    T: TokenServer + ?Sized,
{
    let entity = ctx.account(account)?;
    let signed = pull_account(ctx.store(), server, &entity, &ctx.config().sync).await?;

    let mut report = Report::new();
    report.ok(format!("pulled {entity}"));
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
    use std::time::Duration;
    use tempfile::TempDir;
    use trellis_core::{KeyPair, Role};
    use trellis_store::{EntityRef, KeyStore, MemoryStore};
    use trellis_sync::{MemoryTokenServer, SyncConfig};

    async fn context() -> (TempDir, Context<MemoryStore>) {
        let dir = TempDir::new().unwrap();
        let keys = KeyStore::open(dir.path()).unwrap();
        let mut config = TrellisConfig::in_dir(dir.path());
        config.sync = SyncConfig {
            timeout: Duration::from_millis(100),
            retries: 1,
            backoff: Duration::from_millis(1),
        };
        let mut ctx = Context::load(MemoryStore::new(), keys, config)
            .await
            .unwrap()
            .with_clock(Clock::Fixed(100));
        init_operator(&mut ctx, &InitOperator::new("O")).await.unwrap();
        add_account(&mut ctx, &AddAccount::new("A")).await.unwrap();
        (dir, ctx)
    }

    #[tokio::test]
    async fn test_push_then_pull() {
        let (_dir, ctx) = context().await;
        let operator = ctx.load_claim(&EntityRef::operator("O")).await.unwrap();
        let server = MemoryTokenServer::for_operator(operator.subject());

        let report = push(&ctx, &server, None).await.unwrap();
        assert!(!report.has_errors());
        let pulled = pull(&ctx, &server, None).await.unwrap();
        assert_eq!(
            pulled.signed,
            ctx.load_claim(&EntityRef::account("O", "A")).await.unwrap()
        );
    }

    #[tokio::test]
    async fn test_refusal_is_itemized() {
        let (_dir, ctx) = context().await;
        let other = KeyPair::generate(Role::Operator).public_key();
        let server = MemoryTokenServer::for_operator(other);

        let report = push(&ctx, &server, None).await.unwrap();
        assert!(report.has_errors());
    }

    #[tokio::test]
    async fn test_transport_failure_is_raised() {
        let (_dir, ctx) = context().await;
        let server = MemoryTokenServer::new();
        server.fail_next(5);

        let err = push(&ctx, &server, None).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Sync);
        assert_eq!(server.calls(), 2);
    }
}
