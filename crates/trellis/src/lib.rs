//! # Trellis
//!
//! Operator → Account → User trust chains for message-bus authorization.
//!
//! ## Overview
//!
//! This crate ties the Trellis crates together:
//!
//! - `trellis-perms`: subject patterns, permission sets, revocation lists
//! - `trellis-core`: role-tagged keys, claims, signed tokens
//! - `trellis-store`: claim storage, key storage, current selection
//! - `trellis-sync`: push and pull of account tokens
//!
//! and adds the actions that edit the hierarchy: each one resolves its
//! signing key, applies a complete mutation to a draft of the stored
//! claim, signs it with the parent's key, and writes it back atomically.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use trellis::actions::{account, export, operator, revoke};
//! use trellis::{Export, ExportKind};
//! use trellis::{Context, RevokeActivation, TrellisConfig};
//!
//! async fn example() -> trellis::Result<()> {
//!     let mut ctx = Context::open(TrellisConfig::from_env()).await?;
//!
//!     operator::init_operator(&mut ctx, &operator::InitOperator::new("acme")).await?;
//!     account::add_account(&mut ctx, &account::AddAccount::new("billing")).await?;
//!     export::add_export(&ctx, None, Export::stream("invoices.>")).await?;
//!
//!     let importer = "ACNB...";
//!     let req = RevokeActivation::new("invoices.eu", ExportKind::Stream, importer);
//!     let applied = revoke::revoke_activation(&ctx, None, &req).await?;
//!     print!("{}", applied.report);
//!     Ok(())
//! }
//! ```
//!
//! ## Design Notes
//!
//! - **Draft then commit**: mutations are validated and applied to a draft;
//!   nothing is written unless signing succeeds
//! - **Optimistic replace**: edits fail with `Conflict` if the stored claim
//!   changed while the draft was open
//! - **Reports**: seed files, creds bundles, and selection changes are
//!   secondary; their failures are itemized instead of undoing the claim
//! - **No network**: signing never talks to a server; use [`sync`] to push
//!   or pull account tokens

pub mod actions;
pub mod config;
pub mod context;
pub mod error;
pub mod mutation;
pub mod report;
pub mod resolver;

pub use config::TrellisConfig;
pub use context::{Clock, Context};
pub use error::{Error, ErrorKind, Result};
pub use mutation::{
    AccountEdit, ExportEdit, Field, ListEdit, OperatorEdit, PermissionEdit, RevokeActivation,
    RevokeUser, TimeRange, TimeSpec, UserEdit,
};
pub use report::{Applied, Report, ReportItem};
pub use resolver::{Fallback, KeyResolver};

// Re-export component crates
pub use trellis_core as core;
pub use trellis_perms as perms;
pub use trellis_store as store;
pub use trellis_sync as sync;

// Re-export commonly used types
pub use trellis_core::{
    Claim, ClaimKind, Export, ExportKind, KeyPair, PublicKey, ResponseType, Role, SignedClaim,
};
pub use trellis_store::{DirStore, EntityRef, KeyStore, MemoryStore, Store};
