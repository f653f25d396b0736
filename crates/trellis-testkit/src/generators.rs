//! Proptest generators for property-based testing.

use proptest::prelude::*;

use trellis_core::{ExportKind, KeyPair, PublicKey, Role};

/// Generate a role.
pub fn role() -> impl Strategy<Value = Role> {
    prop_oneof![
        Just(Role::Operator),
        Just(Role::Account),
        Just(Role::User),
        Just(Role::Cluster),
    ]
}

/// Generate a key pair for `role`.
pub fn keypair(role: Role) -> impl Strategy<Value = KeyPair> {
    any::<[u8; 32]>()
        .prop_map(move |seed| KeyPair::from_seed(role, &seed).expect("any 32 bytes seed a key"))
}

/// Generate an account public key.
pub fn account_key() -> impl Strategy<Value = PublicKey> {
    keypair(Role::Account).prop_map(|kp| kp.public_key())
}

/// Generate a user public key.
pub fn user_key() -> impl Strategy<Value = PublicKey> {
    keypair(Role::User).prop_map(|kp| kp.public_key())
}

/// Generate an export kind.
pub fn export_kind() -> impl Strategy<Value = ExportKind> {
    prop_oneof![Just(ExportKind::Stream), Just(ExportKind::Service)]
}

/// Generate one literal subject token.
pub fn token() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9_-]{0,7}".prop_map(String::from)
}

/// Generate a literal subject of one to five tokens.
pub fn literal_subject() -> impl Strategy<Value = String> {
    prop::collection::vec(token(), 1..=5).prop_map(|tokens| tokens.join("."))
}

/// Generate a subject pattern: literal tokens, `*` anywhere, and an
/// optional trailing `>`.
pub fn pattern() -> impl Strategy<Value = String> {
    let part = prop_oneof![4 => token(), 1 => Just("*".to_string())];
    (prop::collection::vec(part, 1..=4), any::<bool>()).prop_map(|(mut tokens, tail)| {
        if tail {
            tokens.push(">".to_string());
        }
        tokens.join(".")
    })
}

/// Generate a reasonable timestamp.
pub fn timestamp() -> impl Strategy<Value = i64> {
    0i64..=4_102_444_800
}
