//! Resolution of signing and subject keys.
//!
//! An action names a key explicitly (a seed, a public key, or a file
//! holding either) or falls back to what the key store knows about the
//! entity it is working on.

use std::fs;
use std::path::Path;

use tracing::debug;

use trellis_core::{CoreError, KeyPair, PublicKey, Role};
use trellis_store::{Creds, KeyStore};

use crate::error::Result;

/// What to do when no key is given explicitly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fallback {
    /// Look up the stored seed of this key; public-only if there is none.
    Stored(PublicKey),
    /// Create a fresh key pair. It is not persisted here.
    Generate,
    /// Fail with `KeyNotFound`.
    None,
}

/// Resolves key arguments against a [`KeyStore`].
#[derive(Debug, Clone, Copy)]
pub struct KeyResolver<'a> {
    keys: &'a KeyStore,
}

impl<'a> KeyResolver<'a> {
    pub fn new(keys: &'a KeyStore) -> Self {
        Self { keys }
    }

    /// Resolve a key of `role`.
    ///
    /// The result may be public-only; use [`KeyResolver::resolve_signer`]
    /// when private material is required.
    pub fn resolve(
        &self,
        role: Role,
        explicit: Option<&str>,
        fallback: Fallback,
    ) -> Result<KeyPair> {
        let keypair = match explicit.map(str::trim).filter(|s| !s.is_empty()) {
            Some(text) => self.explicit(text)?,
            None => match fallback {
                Fallback::Stored(key) => self.stored(&key)?,
                Fallback::Generate => {
                    debug!(%role, "generating key");
                    KeyPair::generate(role)
                }
                Fallback::None => {
                    return Err(CoreError::KeyNotFound(format!("no {role} key given")).into())
                }
            },
        };
        check_role(&keypair, role)?;
        Ok(keypair)
    }

    /// Resolve the private key that signs as `entity_key`.
    ///
    /// An explicit key must belong to `entity_key`.
    pub fn resolve_signer(
        &self,
        role: Role,
        explicit: Option<&str>,
        entity_key: &PublicKey,
    ) -> Result<KeyPair> {
        let keypair = self.resolve(role, explicit, Fallback::Stored(*entity_key))?;
        if keypair.public_key() != *entity_key {
            return Err(CoreError::IssuerMismatch {
                expected: entity_key.encode(),
                found: keypair.public_key().encode(),
            }
            .into());
        }
        if !keypair.has_private() {
            return Err(CoreError::NoSigningKey(entity_key.encode()).into());
        }
        Ok(keypair)
    }

    fn explicit(&self, text: &str) -> Result<KeyPair> {
        if let Ok(keypair) = self.parse_key(text) {
            return Ok(keypair);
        }
        let path = Path::new(text);
        if !path.is_file() {
            return Err(CoreError::KeyNotFound(text.to_string()).into());
        }

        let contents = fs::read_to_string(path).map_err(trellis_store::StoreError::from)?;
        debug!(path = %path.display(), "reading key file");
        if let Ok(creds) = Creds::parse(&contents) {
            return Ok(KeyPair::from_seed_str(&creds.seed)?);
        }
        let line = contents
            .lines()
            .map(str::trim)
            .find(|line| !line.is_empty())
            .ok_or_else(|| CoreError::InvalidKey(format!("{} is empty", path.display())))?;
        self.parse_key(line)
    }

    /// A seed, or a public key completed from the store when possible.
    fn parse_key(&self, text: &str) -> Result<KeyPair> {
        let keypair = KeyPair::parse(text)?;
        if keypair.has_private() {
            return Ok(keypair);
        }
        self.stored(&keypair.public_key())
    }

    fn stored(&self, key: &PublicKey) -> Result<KeyPair> {
        Ok(self
            .keys
            .get(key)?
            .unwrap_or_else(|| KeyPair::from_public(*key)))
    }
}

fn check_role(keypair: &KeyPair, role: Role) -> Result<()> {
    if keypair.role() != role {
        return Err(CoreError::KeyMismatch {
            expected: role,
            found: keypair.role(),
        }
        .into());
    }
    Ok(())
}
