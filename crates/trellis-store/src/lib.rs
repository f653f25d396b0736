//! # Trellis Store
//!
//! Persistence for the Trellis trust hierarchy: signed claims, private
//! keys, creds bundles, and the current operator/account selection.
//!
//! ## Overview
//!
//! Claims are stored behind the async [`Store`] trait, addressed by name
//! through [`EntityRef`]. The durable implementation is [`DirStore`], one
//! token file per entity in a directory tree; [`MemoryStore`] has the same
//! semantics for tests. Seeds live apart from claims in a [`KeyStore`].
//!
//! ## Key Types
//!
//! - [`Store`] - The async trait for claim storage
//! - [`DirStore`] - Directory-backed storage with atomic replace
//! - [`MemoryStore`] - In-memory storage for tests
//! - [`KeyStore`] - Owner-only seed files and creds bundles
//! - [`Selection`] - Current operator/account, persisted as `context.json`
//!
//! ## Usage
//!
//! ```rust,no_run
//! use trellis_store::{DirStore, EntityRef, Store};
//!
//! async fn example() -> trellis_store::Result<()> {
//!     let store = DirStore::open("/tmp/trellis")?;
//!     for account in store.list(Some(&EntityRef::operator("acme"))).await? {
//!         let signed = store.get(&EntityRef::account("acme", &account)).await?;
//!         println!("{account}: {}", signed.subject());
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Design Notes
//!
//! - **Atomic writes**: every record is written to a temp file and renamed
//! - **Create vs put**: `create` refuses to overwrite (`AlreadyExists`)
//! - **Optimistic replace**: `replace` checks the stored `jti` (`Conflict`)
//! - **Typed misses**: `get` on an unknown name is `NotFound`

pub mod creds;
pub mod dir;
pub mod error;
pub mod keystore;
pub mod layout;
pub mod memory;
pub mod selection;
pub mod traits;

pub use creds::Creds;
pub use dir::DirStore;
pub use error::{Result, StoreError};
pub use keystore::KeyStore;
pub use layout::{Layout, LAYOUT_VERSION};
pub use memory::MemoryStore;
pub use selection::Selection;
pub use traits::{EntityRef, Store};
