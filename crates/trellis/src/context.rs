//! The invocation context.
//!
//! A [`Context`] is built once per invocation and passed by reference to
//! every action. It owns the claim store handle, the key store, the
//! current operator/account selection, and the clock used for `iat` and
//! validity checks.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use trellis_core::{now_secs, KeyPair, Role, SignedClaim};
use trellis_store::{DirStore, EntityRef, KeyStore, Selection, Store, StoreError};

use crate::config::TrellisConfig;
use crate::error::{Error, Result};
use crate::resolver::KeyResolver;

/// Source of the current time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Clock {
    #[default]
    System,
    /// Always the given Unix time, for reproducible runs.
    Fixed(i64),
}

impl Clock {
    pub fn now(&self) -> i64 {
        match self {
            Clock::System => now_secs(),
            Clock::Fixed(now) => *now,
        }
    }
}

/// Everything an action needs to run.
pub struct Context<S: Store> {
    store: Arc<S>,
    keys: KeyStore,
    config: TrellisConfig,
    selection: Selection,
    clock: Clock,
    /// Explicit signing keys, by role.
    signers: HashMap<Role, String>,
}

impl Context<DirStore> {
    /// Open the directory store and key store named by `config`.
    pub async fn open(config: TrellisConfig) -> Result<Self> {
        let store = DirStore::open(config.store_root.clone())?;
        let keys = KeyStore::open(config.keys_dir.clone())?;
        Self::load(store, keys, config).await
    }
}

impl<S: Store> Context<S> {
    /// Build a context over `store`, loading its persisted selection.
    pub async fn load(store: S, keys: KeyStore, config: TrellisConfig) -> Result<Self> {
        let selection = store.selection().await?;
        debug!(?selection, "loaded context");
        Ok(Self {
            store: Arc::new(store),
            keys,
            config,
            selection,
            clock: Clock::System,
            signers: HashMap::new(),
        })
    }

    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    /// Sign claims issued by `role` with `key` (a seed, public key, or key
    /// file path) instead of the stored key of the issuing entity.
    pub fn with_signer(mut self, role: Role, key: impl Into<String>) -> Self {
        self.signers.insert(role, key.into());
        self
    }

    pub fn set_clock(&mut self, clock: Clock) {
        self.clock = clock;
    }

    pub fn now(&self) -> i64 {
        self.clock.now()
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn keys(&self) -> &KeyStore {
        &self.keys
    }

    pub fn config(&self) -> &TrellisConfig {
        &self.config
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    pub fn resolver(&self) -> KeyResolver<'_> {
        KeyResolver::new(&self.keys)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Entity Resolution
    // ─────────────────────────────────────────────────────────────────────────

    /// The selected operator.
    pub fn operator(&self) -> Result<EntityRef> {
        self.selection
            .operator
            .as_deref()
            .map(EntityRef::operator)
            .ok_or(Error::NoSelection("operator"))
    }

    /// The named account of the selected operator, or the selected account.
    pub fn account(&self, name: Option<&str>) -> Result<EntityRef> {
        let operator = self.operator()?;
        let name = name
            .or(self.selection.account.as_deref())
            .ok_or(Error::NoSelection("account"))?;
        Ok(EntityRef::account(operator.name(), name))
    }

    /// A user of the named (or selected) account.
    pub fn user(&self, account: Option<&str>, name: &str) -> Result<EntityRef> {
        let account = self.account(account)?;
        account
            .child(name)
            .ok_or_else(|| Error::invalid("user", format!("{account} has no users")))
    }

    /// Load a stored claim.
    pub async fn load_claim(&self, entity: &EntityRef) -> Result<SignedClaim> {
        Ok(self.store.get(entity).await?)
    }

    /// The private key that signs claims beneath `issuer`.
    ///
    /// Uses the explicit signer for the issuer's role when one was given.
    pub(crate) async fn signer_for(&self, issuer: &EntityRef) -> Result<KeyPair> {
        let signed = self.load_claim(issuer).await?;
        let role = issuer.role();
        let explicit = self.signers.get(&role).map(String::as_str);
        self.resolver()
            .resolve_signer(role, explicit, &signed.subject())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Selection
    // ─────────────────────────────────────────────────────────────────────────

    /// Change the selection and persist it.
    pub(crate) async fn update_selection(&mut self, f: impl FnOnce(&mut Selection)) -> Result<()> {
        let mut selection = self.selection.clone();
        f(&mut selection);
        if selection == self.selection {
            return Ok(());
        }
        self.store.set_selection(&selection).await?;
        debug!(?selection, "selection changed");
        self.selection = selection;
        Ok(())
    }

    /// Run blocking key store work off the async runtime.
    pub(crate) async fn with_keys<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&KeyStore) -> trellis_store::Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let keys = self.keys.clone();
        tokio::task::spawn_blocking(move || f(&keys))
            .await
            .map_err(|e| Error::Task(format!("spawn_blocking failed: {e}")))?
            .map_err(Error::from)
    }
}

/// Map a store miss to `None`.
pub(crate) fn found<T>(result: trellis_store::Result<T>) -> Result<Option<T>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(StoreError::NotFound(_)) => Ok(None),
        Err(e) => Err(e.into()),
    }
}
