//! In-memory implementation of the Store trait.
//!
//! This is primarily for testing. It has the same semantics as the
//! directory store but keeps everything in memory with no persistence.

use std::collections::BTreeMap;
use std::sync::RwLock;

use async_trait::async_trait;
use trellis_core::{ClaimId, SignedClaim};

use crate::error::{Result, StoreError};
use crate::layout::check_entity;
use crate::selection::Selection;
use crate::traits::{check_record, EntityRef, Store};

/// In-memory store implementation.
///
/// All data is lost when the store is dropped. Thread-safe via RwLock.
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<MemoryStoreInner>,
}

#[derive(Default)]
struct MemoryStoreInner {
    records: BTreeMap<EntityRef, SignedClaim>,
    selection: Selection,
}

impl MemoryStore {
    /// Create a new empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored records.
    pub fn len(&self) -> usize {
        self.inner.read().expect("memory store lock poisoned").records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn parent_exists(inner: &MemoryStoreInner, entity: &EntityRef) -> Result<()> {
    match entity.parent() {
        Some(parent) if !inner.records.contains_key(&parent) => {
            Err(StoreError::NotFound(parent.to_string()))
        }
        _ => Ok(()),
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn put(&self, entity: &EntityRef, signed: &SignedClaim) -> Result<()> {
        check_entity(entity)?;
        check_record(entity, signed)?;
        let mut inner = self.inner.write().expect("memory store lock poisoned");
        parent_exists(&inner, entity)?;
        inner.records.insert(entity.clone(), signed.clone());
        Ok(())
    }

    async fn create(&self, entity: &EntityRef, signed: &SignedClaim) -> Result<()> {
        check_entity(entity)?;
        check_record(entity, signed)?;
        let mut inner = self.inner.write().expect("memory store lock poisoned");
        parent_exists(&inner, entity)?;
        if inner.records.contains_key(entity) {
            return Err(StoreError::AlreadyExists(entity.to_string()));
        }
        inner.records.insert(entity.clone(), signed.clone());
        Ok(())
    }

    async fn replace(
        &self,
        entity: &EntityRef,
        signed: &SignedClaim,
        expected: ClaimId,
    ) -> Result<()> {
        check_record(entity, signed)?;
        let mut inner = self.inner.write().expect("memory store lock poisoned");
        let current = inner
            .records
            .get_mut(entity)
            .ok_or_else(|| StoreError::NotFound(entity.to_string()))?;
        if current.jti() != expected {
            return Err(StoreError::Conflict {
                entity: entity.to_string(),
                expected: expected.to_hex(),
                found: current.jti().to_hex(),
            });
        }
        *current = signed.clone();
        Ok(())
    }

    async fn get(&self, entity: &EntityRef) -> Result<SignedClaim> {
        let inner = self.inner.read().expect("memory store lock poisoned");
        inner
            .records
            .get(entity)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(entity.to_string()))
    }

    async fn delete(&self, entity: &EntityRef) -> Result<()> {
        let mut inner = self.inner.write().expect("memory store lock poisoned");
        if !inner.records.contains_key(entity) {
            return Err(StoreError::NotFound(entity.to_string()));
        }
        inner.records.retain(|key, _| !key.is_within(entity));
        Ok(())
    }

    async fn list(&self, parent: Option<&EntityRef>) -> Result<Vec<String>> {
        let inner = self.inner.read().expect("memory store lock poisoned");
        // BTreeMap order keeps names sorted within a parent.
        Ok(inner
            .records
            .keys()
            .filter(|key| key.parent().as_ref() == parent)
            .map(|key| key.name().to_string())
            .collect())
    }

    async fn selection(&self) -> Result<Selection> {
        let inner = self.inner.read().expect("memory store lock poisoned");
        Ok(inner.selection.clone())
    }

    async fn set_selection(&self, selection: &Selection) -> Result<()> {
        let mut inner = self.inner.write().expect("memory store lock poisoned");
        inner.selection = selection.clone();
        Ok(())
    }
}
