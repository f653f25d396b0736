//! # Trellis Core
//!
//! Pure primitives for the Trellis trust hierarchy: role-tagged keys,
//! claims, canonical encoding, and signed tokens.
//!
//! This crate contains no I/O, no storage, no networking. It is pure
//! computation over cryptographic data structures.
//!
//! ## Key Types
//!
//! - [`KeyPair`] / [`PublicKey`] - ed25519 keys tagged with a [`Role`]
//! - [`Claim`] - identity, validity, and a typed [`ClaimBody`]
//! - [`ClaimBuilder`] - an unsigned draft; `sign` turns it into a [`SignedClaim`]
//! - [`SignedClaim`] - a token string plus its decoded claim
//!
//! ## Trust Chain
//!
//! | Claim | Subject role | Issuer role |
//! |---|---|---|
//! | Operator | Operator | Operator (self) |
//! | Account | Account | Operator |
//! | User | User | Account |
//! | Activation | Account (target) | Account (exporter) |
//!
//! ## Canonicalization
//!
//! Claim bodies are encoded as deterministic CBOR. See [`canonical`] module.

pub mod canonical;
pub mod claim;
pub mod error;
pub mod keys;
pub mod time;
pub mod token;
pub mod types;
pub mod validation;

pub use canonical::{canonical_bytes, decode_canonical};
pub use claim::{
    AccountClaim, ActivationClaim, Claim, ClaimBody, ClaimBuilder, ClaimKind, Export, ExportKind,
    OperatorClaim, ResponseType, UserClaim,
};
pub use error::{CoreError, Result};
pub use keys::{KeyPair, PublicKey, Role, Signature};
pub use time::{now_secs, Validity};
pub use token::{verify, SignedClaim};
pub use types::ClaimId;
pub use validation::{check_issuer, validate_claim, validate_signed};

// The permission model is part of the claim surface.
pub use trellis_perms as perms;
