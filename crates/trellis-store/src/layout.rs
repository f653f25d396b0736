//! On-disk layout of a directory store.
//!
//! ```text
//! <root>/.trellis                                   layout version marker
//! <root>/context.json                               current selection
//! <root>/<op>/<op>.jwt                              operator
//! <root>/<op>/accounts/<acct>/<acct>.jwt            account
//! <root>/<op>/accounts/<acct>/users/<user>.jwt      user
//! ```

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Result, StoreError};
use crate::traits::EntityRef;

/// Current layout version.
pub const LAYOUT_VERSION: u32 = 1;

/// Version marker file name.
pub const MARKER_FILE: &str = ".trellis";

/// Selection file name.
pub const CONTEXT_FILE: &str = "context.json";

/// Extension of token files.
pub const TOKEN_EXT: &str = "jwt";

const ACCOUNTS_DIR: &str = "accounts";
const USERS_DIR: &str = "users";

#[derive(Debug, Serialize, Deserialize)]
struct Marker {
    version: u32,
}

/// Path computations for a store rooted at a directory.
#[derive(Debug, Clone)]
pub struct Layout {
    root: PathBuf,
}

impl Layout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn marker_path(&self) -> PathBuf {
        self.root.join(MARKER_FILE)
    }

    pub fn context_path(&self) -> PathBuf {
        self.root.join(CONTEXT_FILE)
    }

    /// Directory holding the entity's token and its children.
    pub fn entity_dir(&self, entity: &EntityRef) -> PathBuf {
        match entity {
            EntityRef::Operator(name) => self.root.join(name),
            EntityRef::Account { operator, name } => {
                self.root.join(operator).join(ACCOUNTS_DIR).join(name)
            }
            EntityRef::User {
                operator, account, ..
            } => self
                .root
                .join(operator)
                .join(ACCOUNTS_DIR)
                .join(account)
                .join(USERS_DIR),
        }
    }

    /// The token file of an entity.
    pub fn token_path(&self, entity: &EntityRef) -> PathBuf {
        self.entity_dir(entity)
            .join(format!("{}.{TOKEN_EXT}", entity.name()))
    }

    /// Directory whose entries are the children of `parent`.
    pub fn children_dir(&self, parent: Option<&EntityRef>) -> Option<PathBuf> {
        match parent {
            None => Some(self.root.clone()),
            Some(EntityRef::Operator(name)) => Some(self.root.join(name).join(ACCOUNTS_DIR)),
            Some(account @ EntityRef::Account { .. }) => Some(self.entity_dir(account).join(USERS_DIR)),
            Some(EntityRef::User { .. }) => None,
        }
    }

    /// Create the root if needed and check the version marker.
    pub fn init(&self) -> Result<()> {
        fs::create_dir_all(&self.root)?;
        let marker = self.marker_path();
        match fs::read_to_string(&marker) {
            Ok(text) => {
                let found: Marker = serde_json::from_str(&text)?;
                if found.version > LAYOUT_VERSION {
                    return Err(StoreError::UnsupportedLayout {
                        found: found.version,
                        supported: LAYOUT_VERSION,
                    });
                }
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let bytes = serde_json::to_vec(&Marker {
                    version: LAYOUT_VERSION,
                })?;
                write_atomic(&marker, &bytes)
            }
            Err(e) => Err(e.into()),
        }
    }
}

/// Check that every name in `entity` is usable as a path component.
pub fn check_entity(entity: &EntityRef) -> Result<()> {
    match entity {
        EntityRef::Operator(name) => check_name(name),
        EntityRef::Account { operator, name } => {
            check_name(operator)?;
            check_name(name)
        }
        EntityRef::User {
            operator,
            account,
            name,
        } => {
            check_name(operator)?;
            check_name(account)?;
            check_name(name)
        }
    }
}

/// Check that a name is usable as a single path component.
pub fn check_name(name: &str) -> Result<()> {
    let invalid = |reason: &str| StoreError::InvalidName {
        name: name.to_string(),
        reason: reason.to_string(),
    };
    if name.trim().is_empty() {
        return Err(invalid("name cannot be empty"));
    }
    if name.starts_with('.') {
        return Err(invalid("name cannot start with '.'"));
    }
    if name.contains(['/', '\\', '\0']) {
        return Err(invalid("name cannot contain path separators"));
    }
    let reserved = [ACCOUNTS_DIR, USERS_DIR, MARKER_FILE, CONTEXT_FILE];
    if reserved.iter().any(|r| name.eq_ignore_ascii_case(r)) {
        return Err(invalid("name is reserved"));
    }
    Ok(())
}

/// Write `bytes` to `path` through a temp file in the same directory.
///
/// The temp file is renamed over `path`, so readers see either the old or
/// the new content.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let file = temp_with(path, bytes)?;
    file.persist(path).map_err(|e| StoreError::Io(e.error))?;
    Ok(())
}

/// Like [`write_atomic`] but fails with `AlreadyExists` if `path` exists.
pub fn write_new(path: &Path, bytes: &[u8]) -> Result<()> {
    let file = temp_with(path, bytes)?;
    file.persist_noclobber(path).map_err(|e| {
        if e.error.kind() == std::io::ErrorKind::AlreadyExists {
            StoreError::AlreadyExists(path.display().to_string())
        } else {
            StoreError::Io(e.error)
        }
    })?;
    Ok(())
}

fn temp_with(path: &Path, bytes: &[u8]) -> Result<tempfile::NamedTempFile> {
    let dir = path
        .parent()
        .ok_or_else(|| StoreError::InvalidData(format!("{} has no parent", path.display())))?;
    fs::create_dir_all(dir)?;
    let mut file = tempfile::NamedTempFile::new_in(dir)?;
    file.write_all(bytes)?;
    file.as_file().sync_all()?;
    Ok(file)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_paths() {
        let layout = Layout::new("/s");
        assert_eq!(
            layout.token_path(&EntityRef::operator("O")),
            PathBuf::from("/s/O/O.jwt")
        );
        assert_eq!(
            layout.token_path(&EntityRef::account("O", "A")),
            PathBuf::from("/s/O/accounts/A/A.jwt")
        );
        assert_eq!(
            layout.token_path(&EntityRef::user("O", "A", "U")),
            PathBuf::from("/s/O/accounts/A/users/U.jwt")
        );
        assert_eq!(
            layout.children_dir(Some(&EntityRef::account("O", "A"))),
            Some(PathBuf::from("/s/O/accounts/A/users"))
        );
    }

    #[test]
    fn test_check_name() {
        assert!(check_name("acme").is_ok());
        assert!(check_name("").is_err());
        assert!(check_name("..").is_err());
        assert!(check_name(".hidden").is_err());
        assert!(check_name("a/b").is_err());
        assert!(check_name("users").is_err());
    }

    #[test]
    fn test_check_name_rejects_store_files() {
        assert!(matches!(
            check_name(CONTEXT_FILE),
            Err(StoreError::InvalidName { .. })
        ));
        assert!(check_name("Context.JSON").is_err());
        assert!(check_name(MARKER_FILE).is_err());
        assert!(check_entity(&EntityRef::operator(CONTEXT_FILE)).is_err());
        assert!(check_name("context").is_ok());
    }

    #[test]
    fn test_marker_version_check() {
        let dir = tempfile::tempdir().unwrap();
        let layout = Layout::new(dir.path());
        layout.init().unwrap();
        layout.init().unwrap();

        fs::write(layout.marker_path(), r#"{"version":99}"#).unwrap();
        assert!(matches!(
            layout.init(),
            Err(StoreError::UnsupportedLayout { found: 99, .. })
        ));
    }

    #[test]
    fn test_write_new_refuses_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("x.jwt");
        write_new(&path, b"one").unwrap();
        assert!(matches!(
            write_new(&path, b"two"),
            Err(StoreError::AlreadyExists(_))
        ));
        write_atomic(&path, b"three").unwrap();
        assert_eq!(fs::read(&path).unwrap(), b"three");
    }

    proptest! {
        #[test]
        fn prop_valid_names_stay_in_their_directory(name in "[A-Za-z0-9_-][A-Za-z0-9_. -]{0,20}") {
            prop_assume!(check_name(&name).is_ok());
            let layout = Layout::new("/root");
            let entity = EntityRef::account("O", name.clone());
            let path = layout.token_path(&entity);
            let dir = layout.entity_dir(&entity);
            prop_assert_eq!(path.parent(), Some(dir.as_path()));
            prop_assert!(path.starts_with("/root/O/accounts"));
        }
    }
}
