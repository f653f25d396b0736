//! Identifier types.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::CoreError;

/// Content identifier of a claim (its `jti`).
///
/// Computed as `blake3(canonical_body)` where the body is encoded with
/// `jti` set to [`ClaimId::ZERO`]. Two claims with identical content have
/// the same id. Serialized as a lower-case hex string.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ClaimId(pub [u8; 32]);

impl ClaimId {
    /// Placeholder id used while computing the real one.
    pub const ZERO: Self = Self([0u8; 32]);

    /// Create a new ClaimId from raw bytes.
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Hash the given canonical bytes.
    pub fn hash(canonical: &[u8]) -> Self {
        Self(*blake3::hash(canonical).as_bytes())
    }

    /// Get the raw bytes.
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Convert to hex string.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parse from hex string.
    pub fn from_hex(s: &str) -> Result<Self, hex::FromHexError> {
        let bytes = hex::decode(s)?;
        if bytes.len() != 32 {
            return Err(hex::FromHexError::InvalidStringLength);
        }
        let mut arr = [0u8; 32];
        arr.copy_from_slice(&bytes);
        Ok(Self(arr))
    }

    pub fn is_zero(&self) -> bool {
        *self == Self::ZERO
    }
}

impl fmt::Debug for ClaimId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ClaimId({})", &self.to_hex()[..16])
    }
}

impl fmt::Display for ClaimId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", &self.to_hex()[..16])
    }
}

impl TryFrom<String> for ClaimId {
    type Error = CoreError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::from_hex(&s).map_err(|e| CoreError::DecodingError(format!("invalid jti: {e}")))
    }
}

impl From<ClaimId> for String {
    fn from(id: ClaimId) -> Self {
        id.to_hex()
    }
}
