//! Test fixtures and helpers.
//!
//! Common setup code for integration tests.

use std::path::PathBuf;

use anyhow::{Context as _, Result};
use tempfile::TempDir;

use trellis::actions::{account, export, operator, user};
use trellis::{Clock, Context, TrellisConfig};
use trellis_core::{Export, PublicKey, SignedClaim};
use trellis_store::{DirStore, EntityRef, KeyStore, MemoryStore};

/// Name of the operator every fixture starts with.
pub const FIXTURE_OPERATOR: &str = "O";

/// The fixed clock of every fixture.
pub const FIXTURE_NOW: i64 = 1_700_000_000;

/// A directory-backed store in a temp dir with one selected operator.
pub struct TestStore {
    pub ctx: Context<DirStore>,
    dir: TempDir,
}

impl TestStore {
    pub async fn new() -> Result<Self> {
        let dir = TempDir::new()?;
        let mut ctx = Context::open(TrellisConfig::in_dir(dir.path()))
            .await?
            .with_clock(Clock::Fixed(FIXTURE_NOW));
        operator::init_operator(&mut ctx, &operator::InitOperator::new(FIXTURE_OPERATOR))
            .await
            .context("init operator")?;
        Ok(Self { ctx, dir })
    }

    /// A fixture with the named accounts. The last one is selected.
    pub async fn with_accounts(names: &[&str]) -> Result<Self> {
        let mut fixture = Self::new().await?;
        for name in names {
            fixture.add_account(name).await?;
        }
        Ok(fixture)
    }

    pub fn root(&self) -> PathBuf {
        self.dir.path().to_path_buf()
    }

    pub fn keys(&self) -> &KeyStore {
        self.ctx.keys()
    }

    pub async fn add_account(&mut self, name: &str) -> Result<SignedClaim> {
        let applied = account::add_account(&mut self.ctx, &account::AddAccount::new(name))
            .await
            .with_context(|| format!("add account {name}"))?;
        Ok(applied.signed)
    }

    pub async fn add_export(&self, account: &str, export: Export) -> Result<SignedClaim> {
        let applied = export::add_export(&self.ctx, Some(account), export)
            .await
            .with_context(|| format!("add export to {account}"))?;
        Ok(applied.signed)
    }

    pub async fn add_user(&self, account: &str, name: &str) -> Result<SignedClaim> {
        let params = user::AddUser {
            account: Some(account.to_string()),
            ..user::AddUser::new(name)
        };
        let applied = user::add_user(&self.ctx, &params)
            .await
            .with_context(|| format!("add user {account}/{name}"))?;
        Ok(applied.signed)
    }

    pub async fn operator(&self) -> Result<SignedClaim> {
        Ok(self
            .ctx
            .load_claim(&EntityRef::operator(FIXTURE_OPERATOR))
            .await?)
    }

    pub async fn account(&self, name: &str) -> Result<SignedClaim> {
        Ok(self
            .ctx
            .load_claim(&EntityRef::account(FIXTURE_OPERATOR, name))
            .await?)
    }

    pub async fn account_key(&self, name: &str) -> Result<PublicKey> {
        Ok(self.account(name).await?.subject())
    }

    pub fn token_path(&self, entity: &EntityRef) -> PathBuf {
        self.ctx.store().token_path(entity)
    }
}

/// An in-memory context with a key store in `dir` and the fixture clock.
pub async fn memory_context(dir: &TempDir) -> Result<Context<MemoryStore>> {
    let keys = KeyStore::open(dir.path())?;
    let ctx = Context::load(MemoryStore::new(), keys, TrellisConfig::in_dir(dir.path()))
        .await?
        .with_clock(Clock::Fixed(FIXTURE_NOW));
    Ok(ctx)
}
