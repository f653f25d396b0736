//! Seed storage.
//!
//! ```text
//! <dir>/keys/<R>/<XY>/<public key>.nk     seed, mode 0600
//! <dir>/creds/<op>/<acct>/<user>.creds    creds bundle, mode 0600
//! ```
//!
//! `R` is the role character of the key and `XY` the next two characters,
//! which spreads keys over subdirectories. Directories are created with
//! mode 0700. Seed files are created exclusively with their final mode, so
//! there is no window in which another user can read them.

use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use trellis_core::{CoreError, KeyPair, PublicKey, Role};

use crate::creds::Creds;
use crate::error::{Result, StoreError};
use crate::layout::{check_name, write_atomic};

/// Extension of seed files.
pub const SEED_EXT: &str = "nk";

/// Extension of creds bundles.
pub const CREDS_EXT: &str = "creds";

/// A directory of private keys.
#[derive(Debug, Clone)]
pub struct KeyStore {
    dir: PathBuf,
}

impl KeyStore {
    /// Open (creating if needed) a key store in `dir`.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        create_private_dir(&dir.join("keys"))?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Where the seed for `key` is stored.
    pub fn key_path(&self, key: &PublicKey) -> PathBuf {
        let text = key.encode();
        self.role_dir(key.role())
            .join(&text[1..3])
            .join(format!("{text}.{SEED_EXT}"))
    }

    fn role_dir(&self, role: Role) -> PathBuf {
        self.dir.join("keys").join(role.as_char().to_string())
    }

    /// Store a key pair's seed.
    ///
    /// Storing the same seed again is a no-op. Returns the file path.
    pub fn store(&self, keypair: &KeyPair) -> Result<PathBuf> {
        let seed = keypair.seed()?;
        let path = self.key_path(&keypair.public_key());
        if let Some(parent) = path.parent() {
            create_private_dir(parent)?;
        }

        match create_private_file(&path) {
            Ok(mut file) => {
                file.write_all(seed.as_bytes())?;
                file.sync_all()?;
                debug!(key = %keypair.public_key(), "stored seed");
                Ok(path)
            }
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                let existing = fs::read_to_string(&path)?;
                if existing.trim() == seed {
                    Ok(path)
                } else {
                    Err(StoreError::AlreadyExists(path.display().to_string()))
                }
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Load the key pair for `key`, or `None` if no seed is stored.
    pub fn get(&self, key: &PublicKey) -> Result<Option<KeyPair>> {
        let path = self.key_path(key);
        let text = match fs::read_to_string(&path) {
            Ok(text) => text,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let keypair = KeyPair::from_seed_str(&text)?;
        if keypair.public_key() != *key {
            return Err(StoreError::InvalidData(format!(
                "{} holds the seed of another key",
                path.display()
            )));
        }
        Ok(Some(keypair))
    }

    /// Whether a seed is stored for `key`.
    pub fn has_private(&self, key: &PublicKey) -> bool {
        self.key_path(key).is_file()
    }

    /// Delete the seed for `key`. Returns whether a file was removed.
    pub fn remove(&self, key: &PublicKey) -> Result<bool> {
        remove_if_exists(&self.key_path(key))
    }

    /// Write the public key alone to `path`, for sharing.
    pub fn export_public(&self, key: &PublicKey, path: &Path) -> Result<()> {
        write_atomic(path, format!("{key}\n").as_bytes())
    }

    /// Public keys of `role` with stored seeds, sorted.
    pub fn list(&self, role: Role) -> Result<Vec<PublicKey>> {
        let role_dir = self.role_dir(role);
        if !role_dir.is_dir() {
            return Ok(Vec::new());
        }

        let mut keys = Vec::new();
        for shard in fs::read_dir(&role_dir)? {
            let shard = shard?.path();
            if !shard.is_dir() {
                continue;
            }
            for entry in fs::read_dir(&shard)? {
                let path = entry?.path();
                if path.extension().and_then(|e| e.to_str()) != Some(SEED_EXT) {
                    continue;
                }
                let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                    continue;
                };
                match PublicKey::decode_as(stem, role) {
                    Ok(key) => keys.push(key),
                    Err(e) => warn!(path = %path.display(), error = %e, "skipping unrecognized key file"),
                }
            }
        }
        keys.sort();
        Ok(keys)
    }

    /// Where the creds bundle for a user is stored.
    pub fn creds_path(&self, operator: &str, account: &str, user: &str) -> Result<PathBuf> {
        check_name(operator)?;
        check_name(account)?;
        check_name(user)?;
        Ok(self
            .dir
            .join("creds")
            .join(operator)
            .join(account)
            .join(format!("{user}.{CREDS_EXT}")))
    }

    /// Write a user's creds bundle (token and seed), replacing any old one.
    pub fn store_creds(
        &self,
        operator: &str,
        account: &str,
        user: &str,
        token: &str,
        keypair: &KeyPair,
    ) -> Result<PathBuf> {
        if keypair.role() != Role::User {
            return Err(CoreError::KeyMismatch {
                expected: Role::User,
                found: keypair.role(),
            }
            .into());
        }
        let creds = Creds::new(token, keypair.seed()?);
        let path = self.creds_path(operator, account, user)?;
        if let Some(parent) = path.parent() {
            create_private_dir(parent)?;
        }
        // Temp files are created owner-only, and the rename keeps the mode.
        write_atomic(&path, creds.format().as_bytes())?;
        debug!(%operator, %account, %user, "stored creds");
        Ok(path)
    }

    /// Read a user's creds bundle.
    pub fn read_creds(&self, operator: &str, account: &str, user: &str) -> Result<Creds> {
        let path = self.creds_path(operator, account, user)?;
        match fs::read_to_string(&path) {
            Ok(text) => Creds::parse(&text),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                Err(StoreError::NotFound(path.display().to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Delete a user's creds bundle. Returns whether a file was removed.
    pub fn remove_creds(&self, operator: &str, account: &str, user: &str) -> Result<bool> {
        remove_if_exists(&self.creds_path(operator, account, user)?)
    }
}

fn remove_if_exists(path: &Path) -> Result<bool> {
    match fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e.into()),
    }
}

#[cfg(unix)]
fn create_private_dir(dir: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::DirBuilderExt;
    fs::DirBuilder::new().recursive(true).mode(0o700).create(dir)
}

#[cfg(not(unix))]
fn create_private_dir(dir: &Path) -> std::io::Result<()> {
    fs::create_dir_all(dir)
}

#[cfg(unix)]
fn create_private_file(path: &Path) -> std::io::Result<fs::File> {
    use std::os::unix::fs::OpenOptionsExt;
    OpenOptions::new()
        .write(true)
        .create_new(true)
        .mode(0o600)
        .open(path)
}

#[cfg(not(unix))]
fn create_private_file(path: &Path) -> std::io::Result<fs::File> {
    OpenOptions::new().write(true).create_new(true).open(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keystore() -> (tempfile::TempDir, KeyStore) {
        let dir = tempfile::tempdir().unwrap();
        let keys = KeyStore::open(dir.path()).unwrap();
        (dir, keys)
    }

    #[test]
    fn test_store_and_get() {
        let (_dir, keys) = keystore();
        let kp = KeyPair::generate(Role::Account);
        let path = keys.store(&kp).unwrap();

        let text = kp.public_key().encode();
        assert!(path.ends_with(format!("keys/A/{}/{}.nk", &text[1..3], text)));
        assert!(keys.has_private(&kp.public_key()));

        let loaded = keys.get(&kp.public_key()).unwrap().unwrap();
        assert_eq!(loaded.public_key(), kp.public_key());
        assert!(loaded.has_private());
    }

    #[test]
    fn test_store_is_idempotent() {
        let (_dir, keys) = keystore();
        let kp = KeyPair::generate(Role::User);
        let first = keys.store(&kp).unwrap();
        let second = keys.store(&kp).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_public_only_cannot_be_stored() {
        let (_dir, keys) = keystore();
        let kp = KeyPair::from_public(KeyPair::generate(Role::User).public_key());
        assert!(matches!(
            keys.store(&kp),
            Err(StoreError::Core(CoreError::NoSigningKey(_)))
        ));
    }

    #[test]
    fn test_missing_key() {
        let (_dir, keys) = keystore();
        let kp = KeyPair::generate(Role::Operator);
        assert!(keys.get(&kp.public_key()).unwrap().is_none());
        assert!(!keys.remove(&kp.public_key()).unwrap());
    }

    #[cfg(unix)]
    #[test]
    fn test_seed_file_modes() {
        use std::os::unix::fs::PermissionsExt;

        let (_dir, keys) = keystore();
        let kp = KeyPair::generate(Role::User);
        let path = keys.store(&kp).unwrap();

        let file_mode = fs::metadata(&path).unwrap().permissions().mode() & 0o777;
        assert_eq!(file_mode, 0o600);
        let dir_mode = fs::metadata(path.parent().unwrap())
            .unwrap()
            .permissions()
            .mode()
            & 0o777;
        assert_eq!(dir_mode, 0o700);

        let creds = keys.store_creds("O", "A", "U", "token", &kp).unwrap();
        let creds_mode = fs::metadata(&creds).unwrap().permissions().mode() & 0o777;
        assert_eq!(creds_mode, 0o600);
    }

    #[test]
    fn test_list_by_role() {
        let (_dir, keys) = keystore();
        let a1 = KeyPair::generate(Role::Account);
        let a2 = KeyPair::generate(Role::Account);
        let u = KeyPair::generate(Role::User);
        for kp in [&a1, &a2, &u] {
            keys.store(kp).unwrap();
        }

        let mut expected = vec![a1.public_key(), a2.public_key()];
        expected.sort();
        assert_eq!(keys.list(Role::Account).unwrap(), expected);
        assert_eq!(keys.list(Role::User).unwrap(), vec![u.public_key()]);
        assert!(keys.list(Role::Operator).unwrap().is_empty());
    }

    #[test]
    fn test_export_public_has_no_seed() {
        let (dir, keys) = keystore();
        let kp = KeyPair::generate(Role::Account);
        let out = dir.path().join("share").join("account.pub");
        keys.export_public(&kp.public_key(), &out).unwrap();

        let text = fs::read_to_string(&out).unwrap();
        assert_eq!(text.trim(), kp.public_key().encode());
        assert!(!text.contains(&kp.seed().unwrap()));
    }

    #[test]
    fn test_creds_roundtrip() {
        let (_dir, keys) = keystore();
        let kp = KeyPair::generate(Role::User);
        keys.store_creds("O", "A", "U", "a.b.c", &kp).unwrap();

        let creds = keys.read_creds("O", "A", "U").unwrap();
        assert_eq!(creds.token, "a.b.c");
        assert_eq!(creds.seed, kp.seed().unwrap());

        assert!(keys.remove_creds("O", "A", "U").unwrap());
        assert!(matches!(
            keys.read_creds("O", "A", "U"),
            Err(StoreError::NotFound(_))
        ));
    }

    #[test]
    fn test_creds_need_user_key() {
        let (_dir, keys) = keystore();
        let kp = KeyPair::generate(Role::Account);
        assert!(keys.store_creds("O", "A", "U", "a.b.c", &kp).is_err());
    }
}
