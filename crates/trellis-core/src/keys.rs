//! Role-tagged ed25519 keys.
//!
//! Every key belongs to a [`Role`] in the trust hierarchy. The role is part
//! of the key's text form (its first character), so an account key can
//! never be mistaken for an operator key.
//!
//! Key material and its text encoding come from the `nkeys` crate; this
//! module adds the role tag and the error mapping.

use nkeys::KeyPairType;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use crate::error::{CoreError, Result};

/// Length of a public key's text form.
const PUBLIC_KEY_LEN: usize = 56;

/// The role of a key in the trust hierarchy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Operator,
    Account,
    User,
    Cluster,
}

impl Role {
    /// All roles, in hierarchy order.
    pub const ALL: [Role; 4] = [Role::Operator, Role::Account, Role::User, Role::Cluster];

    /// The first character of public keys of this role.
    pub const fn as_char(self) -> char {
        match self {
            Role::Operator => 'O',
            Role::Account => 'A',
            Role::User => 'U',
            Role::Cluster => 'C',
        }
    }

    /// Lower-case name, used in paths and messages.
    pub const fn name(self) -> &'static str {
        match self {
            Role::Operator => "operator",
            Role::Account => "account",
            Role::User => "user",
            Role::Cluster => "cluster",
        }
    }

    /// The role whose key signs claims for this role.
    ///
    /// Operators sign their own claims.
    pub const fn parent(self) -> Role {
        match self {
            Role::Operator | Role::Account | Role::Cluster => Role::Operator,
            Role::User => Role::Account,
        }
    }

    fn key_pair_type(self) -> KeyPairType {
        match self {
            Role::Operator => KeyPairType::Operator,
            Role::Account => KeyPairType::Account,
            Role::User => KeyPairType::User,
            Role::Cluster => KeyPairType::Cluster,
        }
    }

    fn from_key_pair_type(kp_type: KeyPairType) -> Result<Self> {
        match kp_type {
            KeyPairType::Operator => Ok(Role::Operator),
            KeyPairType::Account => Ok(Role::Account),
            KeyPairType::User => Ok(Role::User),
            KeyPairType::Cluster => Ok(Role::Cluster),
            other => Err(CoreError::InvalidKey(format!(
                "unsupported key type {other:?}"
            ))),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A 64-byte ed25519 signature.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Signature(pub [u8; 64]);

impl Signature {
    /// Create from raw bytes.
    pub const fn from_bytes(bytes: [u8; 64]) -> Self {
        Self(bytes)
    }

    /// Get raw bytes.
    pub const fn as_bytes(&self) -> &[u8; 64] {
        &self.0
    }

    /// Convert to hex string.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Debug for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Sig({}...)", &self.to_hex()[..8])
    }
}

impl TryFrom<&[u8]> for Signature {
    type Error = CoreError;

    fn try_from(slice: &[u8]) -> Result<Self> {
        let arr: [u8; 64] = slice
            .try_into()
            .map_err(|_| CoreError::MalformedToken("signature must be 64 bytes".into()))?;
        Ok(Self(arr))
    }
}

/// A role-tagged ed25519 public key.
///
/// Stored in its nkeys text form: 56 characters starting with the role
/// character.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PublicKey {
    role: Role,
    text: [u8; PUBLIC_KEY_LEN],
}

impl PublicKey {
    /// Wrap nkeys text of a known role. nkeys public keys are always
    /// `PUBLIC_KEY_LEN` ASCII characters.
    fn encoded(role: Role, encoded: &str) -> Self {
        let mut text = [0u8; PUBLIC_KEY_LEN];
        for (dst, src) in text.iter_mut().zip(encoded.bytes()) {
            *dst = src;
        }
        Self { role, text }
    }

    /// The key's role.
    pub const fn role(&self) -> Role {
        self.role
    }

    /// Encode to text form.
    pub fn encode(&self) -> String {
        String::from_utf8_lossy(&self.text).into_owned()
    }

    /// Decode from text form.
    pub fn decode(text: &str) -> Result<Self> {
        let kp = nkeys::KeyPair::from_public_key(text.trim()).map_err(invalid_key)?;
        let role = Role::from_key_pair_type(kp.key_pair_type())?;
        Ok(Self::encoded(role, &kp.public_key()))
    }

    /// Decode and require a specific role.
    pub fn decode_as(text: &str, role: Role) -> Result<Self> {
        let pk = Self::decode(text)?;
        pk.expect_role(role)?;
        Ok(pk)
    }

    /// Fail with `KeyMismatch` if this key is not of `role`.
    pub fn expect_role(&self, role: Role) -> Result<()> {
        if self.role != role {
            return Err(CoreError::KeyMismatch {
                expected: role,
                found: self.role,
            });
        }
        Ok(())
    }

    /// Verify a signature over a message.
    pub fn verify(&self, message: &[u8], signature: &Signature) -> Result<()> {
        let kp = nkeys::KeyPair::from_public_key(&self.encode()).map_err(invalid_key)?;
        kp.verify(message, signature.as_bytes())
            .map_err(|_| CoreError::SignatureInvalid)
    }
}

impl fmt::Display for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PublicKey({}...)", &self.encode()[..12])
    }
}

impl FromStr for PublicKey {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        Self::decode(s)
    }
}

impl TryFrom<String> for PublicKey {
    type Error = CoreError;

    fn try_from(s: String) -> Result<Self> {
        Self::decode(&s)
    }
}

impl From<PublicKey> for String {
    fn from(pk: PublicKey) -> Self {
        pk.encode()
    }
}

/// A key pair for signing claims.
///
/// Holds a public key and, when loaded from a seed or generated, the
/// `nkeys` signer. Debug output never includes the seed.
#[derive(Clone)]
pub struct KeyPair {
    public: PublicKey,
    signer: Option<Arc<nkeys::KeyPair>>,
}

impl KeyPair {
    fn with_signer(role: Role, signer: nkeys::KeyPair) -> Self {
        Self {
            public: PublicKey::encoded(role, &signer.public_key()),
            signer: Some(Arc::new(signer)),
        }
    }

    /// Generate a new random key pair for `role`.
    pub fn generate(role: Role) -> Self {
        Self::with_signer(role, nkeys::KeyPair::new(role.key_pair_type()))
    }

    /// Create from 32 bytes of raw seed material.
    pub fn from_seed(role: Role, seed: &[u8; 32]) -> Result<Self> {
        let signer =
            nkeys::KeyPair::new_from_raw(role.key_pair_type(), *seed).map_err(invalid_key)?;
        Ok(Self::with_signer(role, signer))
    }

    /// Wrap a public key with no private material.
    pub fn from_public(public: PublicKey) -> Self {
        Self {
            public,
            signer: None,
        }
    }

    /// Decode a seed string (`S` followed by the role character).
    pub fn from_seed_str(text: &str) -> Result<Self> {
        let signer = nkeys::KeyPair::from_seed(text.trim()).map_err(invalid_key)?;
        let role = Role::from_key_pair_type(signer.key_pair_type())?;
        Ok(Self::with_signer(role, signer))
    }

    /// Parse either a seed or a public key string.
    pub fn parse(text: &str) -> Result<Self> {
        let text = text.trim();
        if text.starts_with('S') {
            Self::from_seed_str(text)
        } else {
            PublicKey::decode(text).map(Self::from_public)
        }
    }

    /// The key's role.
    pub fn role(&self) -> Role {
        self.public.role
    }

    /// The public key.
    pub fn public_key(&self) -> PublicKey {
        self.public
    }

    /// Whether private material is available.
    pub fn has_private(&self) -> bool {
        self.signer.is_some()
    }

    /// Encode the seed to its text form.
    pub fn seed(&self) -> Result<String> {
        self.signer()?.seed().map_err(invalid_key)
    }

    /// Sign a message.
    pub fn sign(&self, message: &[u8]) -> Result<Signature> {
        let sig = self.signer()?.sign(message).map_err(invalid_key)?;
        Signature::try_from(sig.as_slice())
    }

    fn signer(&self) -> Result<&nkeys::KeyPair> {
        self.signer
            .as_deref()
            .ok_or_else(|| CoreError::NoSigningKey(self.public.encode()))
    }
}

impl fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyPair")
            .field("public", &self.public)
            .field("private", &self.has_private())
            .finish()
    }
}

fn invalid_key(e: impl fmt::Display) -> CoreError {
    CoreError::InvalidKey(e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sign_verify() {
        let keypair = KeyPair::generate(Role::Account);
        let message = b"hello world";
        let signature = keypair.sign(message).unwrap();

        keypair.public_key().verify(message, &signature).unwrap();

        let tampered = b"hello worlD";
        assert!(matches!(
            keypair.public_key().verify(tampered, &signature),
            Err(CoreError::SignatureInvalid)
        ));
    }

    #[test]
    fn test_deterministic_from_seed() {
        let seed = [0x42u8; 32];
        let kp1 = KeyPair::from_seed(Role::User, &seed).unwrap();
        let kp2 = KeyPair::from_seed(Role::User, &seed).unwrap();
        assert_eq!(kp1.public_key(), kp2.public_key());
    }

    #[test]
    fn test_text_prefixes() {
        for role in Role::ALL {
            let kp = KeyPair::generate(role);
            let public = kp.public_key().encode();
            let seed = kp.seed().unwrap();

            assert_eq!(public.len(), 56);
            assert!(public.starts_with(role.as_char()));
            assert_eq!(seed.len(), 58);
            assert!(seed.starts_with('S'));
            assert_eq!(seed.chars().nth(1), Some(role.as_char()));
        }
    }

    #[test]
    fn test_seed_roundtrip_keeps_role() {
        let kp = KeyPair::generate(Role::Operator);
        let restored = KeyPair::from_seed_str(&kp.seed().unwrap()).unwrap();
        assert_eq!(restored.role(), Role::Operator);
        assert_eq!(restored.public_key(), kp.public_key());
        assert!(restored.has_private());
    }

    #[test]
    fn test_parse_public_only() {
        let kp = KeyPair::generate(Role::User);
        let public_only = KeyPair::parse(&kp.public_key().encode()).unwrap();

        assert!(!public_only.has_private());
        assert!(matches!(public_only.sign(b"x"), Err(CoreError::NoSigningKey(_))));
        assert!(matches!(public_only.seed(), Err(CoreError::NoSigningKey(_))));
    }

    #[test]
    fn test_decode_as_wrong_role() {
        let kp = KeyPair::generate(Role::Account);
        let err = PublicKey::decode_as(&kp.public_key().encode(), Role::Operator).unwrap_err();
        assert!(matches!(
            err,
            CoreError::KeyMismatch {
                expected: Role::Operator,
                found: Role::Account
            }
        ));
    }

    #[test]
    fn test_public_key_rejects_seed_text() {
        let kp = KeyPair::generate(Role::Account);
        assert!(PublicKey::decode(&kp.seed().unwrap()).is_err());
    }

    #[test]
    fn test_debug_hides_seed() {
        let kp = KeyPair::generate(Role::User);
        let debug = format!("{:?}", kp);
        assert!(!debug.contains(&kp.seed().unwrap()));
        assert!(debug.contains("private: true"));
    }

    #[test]
    fn test_interoperates_with_nkeys() {
        let pairs = [
            (Role::Operator, nkeys::KeyPair::new_operator()),
            (Role::Account, nkeys::KeyPair::new_account()),
            (Role::User, nkeys::KeyPair::new_user()),
        ];
        for (role, native) in pairs {
            let seed = native.seed().unwrap();
            let kp = KeyPair::from_seed_str(&seed).unwrap();
            assert_eq!(kp.role(), role);
            assert_eq!(kp.public_key().encode(), native.public_key());
            assert_eq!(kp.seed().unwrap(), seed);

            let signature = kp.sign(b"claim").unwrap();
            native.verify(b"claim", signature.as_bytes()).unwrap();
        }
    }

    #[test]
    fn test_decode_rejects_bad_checksum() {
        let text = KeyPair::generate(Role::Account).public_key().encode();
        let mut corrupted = text.clone().into_bytes();
        corrupted[10] = if corrupted[10] == b'A' { b'B' } else { b'A' };
        let corrupted = String::from_utf8(corrupted).unwrap();

        assert!(PublicKey::decode(&text).is_ok());
        assert!(matches!(
            PublicKey::decode(&corrupted),
            Err(CoreError::InvalidKey(_))
        ));
    }

    #[test]
    fn test_rejects_unsupported_key_type() {
        let server = nkeys::KeyPair::new_server();
        assert!(matches!(
            PublicKey::decode(&server.public_key()),
            Err(CoreError::InvalidKey(_))
        ));
        assert!(KeyPair::from_seed_str(&server.seed().unwrap()).is_err());
    }

    #[test]
    fn test_parent_roles() {
        assert_eq!(Role::Operator.parent(), Role::Operator);
        assert_eq!(Role::Account.parent(), Role::Operator);
        assert_eq!(Role::User.parent(), Role::Account);
    }
}
