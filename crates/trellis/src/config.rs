//! Configuration for a Trellis invocation.

use std::path::PathBuf;

use trellis_sync::SyncConfig;

/// Environment variable naming the claim store root.
pub const HOME_VAR: &str = "TRELLIS_HOME";

/// Environment variable naming the key store directory.
pub const KEYS_DIR_VAR: &str = "TRELLIS_KEYS_DIR";

/// Configuration for the Trellis context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrellisConfig {
    /// Root of the claim store.
    pub store_root: PathBuf,
    /// Directory holding seeds and creds bundles.
    pub keys_dir: PathBuf,
    /// Write a creds bundle whenever a user with a known seed is signed.
    pub generate_creds: bool,
    /// Push/pull behavior.
    pub sync: SyncConfig,
}

impl Default for TrellisConfig {
    fn default() -> Self {
        let base = std::env::var_os("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".trellis");
        Self {
            store_root: base.join("stores"),
            keys_dir: base.join("nkeys"),
            generate_creds: true,
            sync: SyncConfig::default(),
        }
    }
}

impl TrellisConfig {
    /// Defaults overridden by `TRELLIS_HOME` and `TRELLIS_KEYS_DIR`.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Like [`TrellisConfig::from_env`] with an explicit variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();
        let set = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());
        if let Some(home) = set(HOME_VAR) {
            config.store_root = PathBuf::from(home);
        }
        if let Some(keys) = set(KEYS_DIR_VAR) {
            config.keys_dir = PathBuf::from(keys);
        }
        config
    }

    /// A configuration rooted at `dir`, with `stores/` and `nkeys/` beneath.
    pub fn in_dir(dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        Self {
            store_root: dir.join("stores"),
            keys_dir: dir.join("nkeys"),
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_overrides() {
        let config = TrellisConfig::from_lookup(|name| match name {
            HOME_VAR => Some("/srv/trellis".into()),
            KEYS_DIR_VAR => Some("  ".into()),
            _ => None,
        });
        assert_eq!(config.store_root, PathBuf::from("/srv/trellis"));
        assert_eq!(config.keys_dir, TrellisConfig::default().keys_dir);
    }

    #[test]
    fn test_in_dir() {
        let config = TrellisConfig::in_dir("/tmp/t");
        assert_eq!(config.store_root, PathBuf::from("/tmp/t/stores"));
        assert_eq!(config.keys_dir, PathBuf::from("/tmp/t/nkeys"));
        assert!(config.generate_creds);
    }
}
