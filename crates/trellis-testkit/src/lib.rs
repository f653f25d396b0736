//! # Trellis Testkit
//!
//! Testing utilities for Trellis.
//!
//! ## Overview
//!
//! This crate provides:
//!
//! - **Fixtures**: an on-disk store with an operator, accounts, and exports
//!   ready to edit
//! - **Generators**: proptest strategies for subjects, patterns, and keys
//!
//! ## Test Fixtures
//!
//! ```rust,no_run
//! use trellis::Export;
//! use trellis_testkit::TestStore;
//!
//! async fn example() -> anyhow::Result<()> {
//!     let mut fixture = TestStore::with_accounts(&["A", "B"]).await?;
//!     fixture.add_export("A", Export::stream("foo.>")).await?;
//!     let key = fixture.account_key("B").await?;
//!     println!("B is {key}");
//!     Ok(())
//! }
//! ```
//!
//! ## Property Testing
//!
//! ```rust,ignore
//! use proptest::prelude::*;
//! use trellis_testkit::generators::{literal_subject, pattern};
//!
//! proptest! {
//!     #[test]
//!     fn patterns_validate(p in pattern()) {
//!         prop_assert!(trellis::perms::validate_subject(&p).is_ok());
//!     }
//! }
//! ```

pub mod fixtures;
pub mod generators;

pub use fixtures::{memory_context, TestStore, FIXTURE_NOW, FIXTURE_OPERATOR};
