//! Directory implementation of the Store trait.
//!
//! This is the durable storage backend. One token file per entity, nested
//! under its parent's directory (see [`crate::layout`]). Blocking file I/O
//! runs inside `tokio::task::spawn_blocking`.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};

use trellis_core::{ClaimId, SignedClaim};

use crate::error::{Result, StoreError};
use crate::layout::{check_entity, write_atomic, write_new, Layout, TOKEN_EXT};
use crate::selection::Selection;
use crate::traits::{check_record, EntityRef, Store};

/// Directory-backed store.
#[derive(Debug, Clone)]
pub struct DirStore {
    layout: Arc<Layout>,
}

impl DirStore {
    /// Open a store rooted at `root`.
    ///
    /// Creates the directory and version marker if they don't exist.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let layout = Layout::new(root);
        layout.init()?;
        Ok(Self {
            layout: Arc::new(layout),
        })
    }

    pub fn root(&self) -> &Path {
        self.layout.root()
    }

    /// Path of an entity's token file.
    pub fn token_path(&self, entity: &EntityRef) -> PathBuf {
        self.layout.token_path(entity)
    }

    /// Run a blocking operation on the layout.
    async fn blocking<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Layout) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let layout = self.layout.clone();
        tokio::task::spawn_blocking(move || f(&layout))
            .await
            .map_err(|e| StoreError::Task(format!("spawn_blocking failed: {}", e)))?
    }
}

fn read_token(layout: &Layout, entity: &EntityRef) -> Result<SignedClaim> {
    let path = layout.token_path(entity);
    let text = match fs::read_to_string(&path) {
        Ok(text) => text,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            return Err(StoreError::NotFound(entity.to_string()))
        }
        Err(e) => return Err(e.into()),
    };
    let signed = SignedClaim::decode(&text)?;
    check_record(entity, &signed)?;
    Ok(signed)
}

fn require_parent(layout: &Layout, entity: &EntityRef) -> Result<()> {
    if let Some(parent) = entity.parent() {
        if !layout.token_path(&parent).is_file() {
            return Err(StoreError::NotFound(parent.to_string()));
        }
    }
    Ok(())
}

/// Names of child directories that hold `<name>/<name>.jwt`.
fn list_entity_dirs(dir: &Path) -> Result<Vec<String>> {
    let mut names = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let Some(name) = entry.file_name().to_str().map(str::to_string) else {
            warn!(path = %entry.path().display(), "skipping non-UTF-8 entry");
            continue;
        };
        if name.starts_with('.') || !entry.file_type()?.is_dir() {
            continue;
        }
        if entry.path().join(format!("{name}.{TOKEN_EXT}")).is_file() {
            names.push(name);
        }
    }
    Ok(names)
}

/// Names of `*.jwt` files in a directory.
fn list_token_files(dir: &Path) -> Result<Vec<String>> {
    let mut names = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.extension().and_then(|e| e.to_str()) != Some(TOKEN_EXT) || !path.is_file() {
            continue;
        }
        if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
            names.push(stem.to_string());
        }
    }
    Ok(names)
}

#[async_trait]
impl Store for DirStore {
    async fn put(&self, entity: &EntityRef, signed: &SignedClaim) -> Result<()> {
        check_entity(entity)?;
        check_record(entity, signed)?;
        let entity = entity.clone();
        let token = signed.token().to_string();

        self.blocking(move |layout| {
            require_parent(layout, &entity)?;
            write_atomic(&layout.token_path(&entity), token.as_bytes())?;
            debug!(%entity, "stored claim");
            Ok(())
        })
        .await
    }

    async fn create(&self, entity: &EntityRef, signed: &SignedClaim) -> Result<()> {
        check_entity(entity)?;
        check_record(entity, signed)?;
        let entity = entity.clone();
        let token = signed.token().to_string();

        self.blocking(move |layout| {
            require_parent(layout, &entity)?;
            write_new(&layout.token_path(&entity), token.as_bytes()).map_err(|e| match e {
                StoreError::AlreadyExists(_) => StoreError::AlreadyExists(entity.to_string()),
                other => other,
            })?;
            debug!(%entity, "created claim");
            Ok(())
        })
        .await
    }

    async fn replace(
        &self,
        entity: &EntityRef,
        signed: &SignedClaim,
        expected: ClaimId,
    ) -> Result<()> {
        check_entity(entity)?;
        check_record(entity, signed)?;
        let entity = entity.clone();
        let token = signed.token().to_string();

        // The check and the rename are not locked together; a writer that
        // slips in between is still last-write-wins.
        self.blocking(move |layout| {
            let current = read_token(layout, &entity)?;
            if current.jti() != expected {
                return Err(StoreError::Conflict {
                    entity: entity.to_string(),
                    expected: expected.to_hex(),
                    found: current.jti().to_hex(),
                });
            }
            write_atomic(&layout.token_path(&entity), token.as_bytes())?;
            debug!(%entity, "replaced claim");
            Ok(())
        })
        .await
    }

    async fn get(&self, entity: &EntityRef) -> Result<SignedClaim> {
        check_entity(entity)?;
        let entity = entity.clone();
        self.blocking(move |layout| read_token(layout, &entity)).await
    }

    async fn delete(&self, entity: &EntityRef) -> Result<()> {
        check_entity(entity)?;
        let entity = entity.clone();

        self.blocking(move |layout| {
            let token = layout.token_path(&entity);
            if !token.is_file() {
                return Err(StoreError::NotFound(entity.to_string()));
            }
            match &entity {
                EntityRef::User { .. } => fs::remove_file(&token)?,
                _ => fs::remove_dir_all(layout.entity_dir(&entity))?,
            }
            debug!(%entity, "deleted claim");
            Ok(())
        })
        .await
    }

    async fn list(&self, parent: Option<&EntityRef>) -> Result<Vec<String>> {
        if let Some(parent) = parent {
            check_entity(parent)?;
        }
        let parent = parent.cloned();

        self.blocking(move |layout| {
            let Some(dir) = layout.children_dir(parent.as_ref()) else {
                return Ok(Vec::new());
            };
            if !dir.is_dir() {
                return Ok(Vec::new());
            }
            let mut names = match parent {
                Some(EntityRef::Account { .. }) => list_token_files(&dir)?,
                _ => list_entity_dirs(&dir)?,
            };
            names.sort();
            Ok(names)
        })
        .await
    }

    async fn selection(&self) -> Result<Selection> {
        self.blocking(|layout| match fs::read_to_string(layout.context_path()) {
            Ok(text) => Ok(serde_json::from_str(&text)?),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(Selection::default()),
            Err(e) => Err(e.into()),
        })
        .await
    }

    async fn set_selection(&self, selection: &Selection) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(selection)?;
        self.blocking(move |layout| write_atomic(&layout.context_path(), &bytes))
            .await
    }
}
