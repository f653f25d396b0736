//! # Trellis Sync
//!
//! Explicit push and pull of account tokens against a remote token server.
//!
//! ## Overview
//!
//! Signing never talks to the network. Publishing an account to the
//! operator's token server, or refreshing a local account from it, is a
//! separate step run by the caller with its own timeout and retry policy.
//!
//! ## Key Types
//!
//! - [`TokenServer`] - push a token, pull a token by public key
//! - [`MemoryTokenServer`] - in-memory server with failure injection
//! - [`SyncConfig`] - per-attempt timeout, retries, backoff
//!
//! ## Usage
//!
//! ```rust,no_run
//! use trellis_store::{DirStore, EntityRef};
//! use trellis_sync::{push_account, MemoryTokenServer, PushOutcome, SyncConfig};
//!
//! async fn example() -> trellis_sync::Result<()> {
//!     let store = DirStore::open("/tmp/trellis")?;
//!     let server = MemoryTokenServer::new();
//!     let account = EntityRef::account("acme", "billing");
//!
//!     match push_account(&store, &server, &account, &SyncConfig::default()).await? {
//!         PushOutcome::Ack => println!("published"),
//!         PushOutcome::Conflict { reason } => println!("refused: {reason}"),
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Trust
//!
//! Pulled tokens are verified against the operator key of the local store
//! before they replace anything.

pub mod error;
pub mod protocol;
pub mod server;

pub use error::{Result, SyncError};
pub use protocol::{pull_account, push_account, with_retry, SyncConfig};
pub use server::{MemoryTokenServer, PullOutcome, PushOutcome, TokenServer};
