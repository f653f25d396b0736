//! Signed token encoding.
//!
//! A token is three base64url (no padding) segments joined by `.`:
//!
//! ```text
//! base64url(header) "." base64url(body) "." base64url(signature)
//! ```
//!
//! Header and body are canonical CBOR. The signature is ed25519 over the
//! ASCII bytes of the first two segments including the separating dot.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde::{Deserialize, Serialize};

use crate::canonical::{canonical_bytes, decode_canonical};
use crate::claim::{Claim, ClaimKind};
use crate::error::{CoreError, Result};
use crate::keys::{KeyPair, PublicKey, Signature};
use crate::types::ClaimId;
use crate::validation::check_issuer;

/// Token type marker.
pub const TOKEN_TYPE: &str = "trellis";

/// Signature algorithm marker.
pub const TOKEN_ALG: &str = "ed25519";

/// Current token format version.
pub const TOKEN_VERSION: u8 = 1;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct TokenHeader {
    typ: String,
    alg: String,
    ver: u8,
}

impl TokenHeader {
    fn current() -> Self {
        Self {
            typ: TOKEN_TYPE.to_string(),
            alg: TOKEN_ALG.to_string(),
            ver: TOKEN_VERSION,
        }
    }

    fn check(&self) -> Result<()> {
        if self.typ != TOKEN_TYPE || self.alg != TOKEN_ALG {
            return Err(CoreError::MalformedToken(format!(
                "unsupported token type {}/{}",
                self.typ, self.alg
            )));
        }
        if self.ver != TOKEN_VERSION {
            return Err(CoreError::MalformedToken(format!(
                "unsupported token version {}",
                self.ver
            )));
        }
        Ok(())
    }
}

/// A token together with its decoded claim.
///
/// Only produced by signing a draft or by decoding a token whose signature
/// verifies, so the claim always matches the token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedClaim {
    token: String,
    claim: Claim,
}

impl SignedClaim {
    /// Encode and sign a finished claim.
    pub(crate) fn encode(claim: Claim, signer: &KeyPair) -> Result<Self> {
        let header = canonical_bytes(&TokenHeader::current())?;
        let body = canonical_bytes(&claim)?;

        let mut token = String::new();
        URL_SAFE_NO_PAD.encode_string(header, &mut token);
        token.push('.');
        URL_SAFE_NO_PAD.encode_string(body, &mut token);

        let signature = signer.sign(token.as_bytes())?;
        token.push('.');
        URL_SAFE_NO_PAD.encode_string(signature.as_bytes(), &mut token);

        Ok(Self { token, claim })
    }

    /// Decode a token and check its signature against the key in `iss`.
    ///
    /// Does not check who the issuer is; use [`SignedClaim::verify`] for
    /// that.
    pub fn decode(token: &str) -> Result<Self> {
        let token = token.trim();
        let mut parts = token.split('.');
        let (Some(header), Some(body), Some(sig), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(CoreError::MalformedToken("expected three segments".into()));
        };

        let header: TokenHeader = decode_canonical(&decode_segment(header, "header")?)?;
        header.check()?;

        let claim: Claim = decode_canonical(&decode_segment(body, "body")?)?;
        let signature = Signature::try_from(decode_segment(sig, "signature")?.as_slice())?;

        let signed_len = token.len() - sig.len() - 1;
        claim
            .iss
            .verify(&token.as_bytes()[..signed_len], &signature)?;

        if claim.compute_id()? != claim.jti {
            return Err(CoreError::MalformedToken(
                "jti does not match claim content".into(),
            ));
        }

        Ok(Self {
            token: token.to_string(),
            claim,
        })
    }

    /// Decode a token and require that it was issued by `expected`.
    pub fn verify(token: &str, expected: &PublicKey) -> Result<Self> {
        let signed = Self::decode(token)?;
        check_issuer(&signed.claim, expected)?;
        Ok(signed)
    }

    /// The encoded token.
    pub fn token(&self) -> &str {
        &self.token
    }

    /// The decoded claim.
    pub fn claim(&self) -> &Claim {
        &self.claim
    }

    pub fn into_claim(self) -> Claim {
        self.claim
    }

    pub fn jti(&self) -> ClaimId {
        self.claim.jti
    }

    pub fn name(&self) -> &str {
        &self.claim.name
    }

    pub fn subject(&self) -> PublicKey {
        self.claim.sub
    }

    pub fn issuer(&self) -> PublicKey {
        self.claim.iss
    }

    pub fn kind(&self) -> ClaimKind {
        self.claim.kind()
    }
}

/// Decode `token` and check it was issued by `expected`.
pub fn verify(token: &str, expected: &PublicKey) -> Result<SignedClaim> {
    SignedClaim::verify(token, expected)
}

fn decode_segment(segment: &str, what: &str) -> Result<Vec<u8>> {
    URL_SAFE_NO_PAD
        .decode(segment)
        .map_err(|e| CoreError::MalformedToken(format!("{what}: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::claim::ClaimBuilder;
    use crate::keys::Role;

    fn account_token() -> (KeyPair, KeyPair, SignedClaim) {
        let op = KeyPair::generate(Role::Operator);
        let account = KeyPair::generate(Role::Account);
        let signed = ClaimBuilder::account(account.public_key(), "A")
            .sign(&op, 1_000)
            .unwrap();
        (op, account, signed)
    }

    #[test]
    fn test_sign_then_verify() {
        let (op, account, signed) = account_token();
        let verified = verify(signed.token(), &op.public_key()).unwrap();

        assert_eq!(verified, signed);
        assert_eq!(verified.subject(), account.public_key());
        assert_eq!(verified.kind(), ClaimKind::Account);
    }

    #[test]
    fn test_verify_with_other_key_fails() {
        let (_, _, signed) = account_token();
        let other = KeyPair::generate(Role::Operator);
        let err = verify(signed.token(), &other.public_key()).unwrap_err();
        assert!(matches!(err, CoreError::IssuerMismatch { .. }));
    }

    #[test]
    fn test_user_signed_by_wrong_account() {
        let storing_parent = KeyPair::generate(Role::Account);
        let other_account = KeyPair::generate(Role::Account);
        let user = KeyPair::generate(Role::User);

        let signed = ClaimBuilder::user(user.public_key(), "U")
            .sign(&other_account, 0)
            .unwrap();

        let err = verify(signed.token(), &storing_parent.public_key()).unwrap_err();
        assert!(matches!(err, CoreError::IssuerMismatch { .. }));
    }

    #[test]
    fn test_tampered_body_fails_signature() {
        let op = KeyPair::generate(Role::Operator);
        let a = KeyPair::generate(Role::Account);
        let b = KeyPair::generate(Role::Account);
        let first = ClaimBuilder::account(a.public_key(), "A").sign(&op, 0).unwrap();
        let second = ClaimBuilder::account(b.public_key(), "B").sign(&op, 0).unwrap();

        // Splice the body of one token into another.
        let p1: Vec<&str> = first.token().split('.').collect();
        let p2: Vec<&str> = second.token().split('.').collect();
        let spliced = format!("{}.{}.{}", p1[0], p2[1], p1[2]);

        assert!(matches!(
            SignedClaim::decode(&spliced),
            Err(CoreError::SignatureInvalid)
        ));
    }

    #[test]
    fn test_malformed_tokens() {
        assert!(matches!(
            SignedClaim::decode("abc"),
            Err(CoreError::MalformedToken(_))
        ));
        assert!(matches!(
            SignedClaim::decode("a.b.c.d"),
            Err(CoreError::MalformedToken(_))
        ));
        assert!(SignedClaim::decode("!!.??.**").is_err());
    }

    #[test]
    fn test_token_is_deterministic() {
        let op = KeyPair::from_seed(Role::Operator, &[1u8; 32]).unwrap();
        let a = ClaimBuilder::operator(op.public_key(), "O").sign(&op, 7).unwrap();
        let b = ClaimBuilder::operator(op.public_key(), "O").sign(&op, 7).unwrap();
        assert_eq!(a.token(), b.token());
    }
}
