//! Store trait: the abstract interface for signed claim persistence.
//!
//! Records are addressed by name through an [`EntityRef`], which mirrors
//! the trust hierarchy: users live under accounts, accounts under
//! operators.

use std::fmt;

use async_trait::async_trait;
use trellis_core::{ClaimId, ClaimKind, Role, SignedClaim};

use crate::error::{Result, StoreError};
use crate::selection::Selection;

/// Name-based address of a stored claim.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EntityRef {
    Operator(String),
    Account {
        operator: String,
        name: String,
    },
    User {
        operator: String,
        account: String,
        name: String,
    },
}

impl EntityRef {
    pub fn operator(name: impl Into<String>) -> Self {
        EntityRef::Operator(name.into())
    }

    pub fn account(operator: impl Into<String>, name: impl Into<String>) -> Self {
        EntityRef::Account {
            operator: operator.into(),
            name: name.into(),
        }
    }

    pub fn user(
        operator: impl Into<String>,
        account: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        EntityRef::User {
            operator: operator.into(),
            account: account.into(),
            name: name.into(),
        }
    }

    /// The entity's own name.
    pub fn name(&self) -> &str {
        match self {
            EntityRef::Operator(name)
            | EntityRef::Account { name, .. }
            | EntityRef::User { name, .. } => name,
        }
    }

    pub fn role(&self) -> Role {
        match self {
            EntityRef::Operator(_) => Role::Operator,
            EntityRef::Account { .. } => Role::Account,
            EntityRef::User { .. } => Role::User,
        }
    }

    /// The claim kind stored for this entity.
    pub fn kind(&self) -> ClaimKind {
        match self {
            EntityRef::Operator(_) => ClaimKind::Operator,
            EntityRef::Account { .. } => ClaimKind::Account,
            EntityRef::User { .. } => ClaimKind::User,
        }
    }

    /// The entity whose claim signs this one. Operators have none.
    pub fn parent(&self) -> Option<EntityRef> {
        match self {
            EntityRef::Operator(_) => None,
            EntityRef::Account { operator, .. } => Some(EntityRef::Operator(operator.clone())),
            EntityRef::User {
                operator, account, ..
            } => Some(EntityRef::account(operator.clone(), account.clone())),
        }
    }

    /// A child of this entity with the given name.
    ///
    /// Users have no children.
    pub fn child(&self, name: impl Into<String>) -> Option<EntityRef> {
        match self {
            EntityRef::Operator(operator) => Some(EntityRef::account(operator.clone(), name)),
            EntityRef::Account {
                operator,
                name: account,
            } => Some(EntityRef::user(operator.clone(), account.clone(), name)),
            EntityRef::User { .. } => None,
        }
    }

    /// Whether `self` is `ancestor` or lives beneath it.
    pub fn is_within(&self, ancestor: &EntityRef) -> bool {
        let mut current = Some(self.clone());
        while let Some(entity) = current {
            if &entity == ancestor {
                return true;
            }
            current = entity.parent();
        }
        false
    }
}

impl fmt::Display for EntityRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityRef::Operator(name) => write!(f, "operator {name:?}"),
            EntityRef::Account { operator, name } => write!(f, "account {operator}/{name}"),
            EntityRef::User {
                operator,
                account,
                name,
            } => write!(f, "user {operator}/{account}/{name}"),
        }
    }
}

/// The Store trait: async interface for signed claim persistence.
///
/// Every write replaces the whole record atomically; a reader never sees a
/// partially written token. Concurrent writers are last-write-wins unless
/// they use [`Store::replace`].
#[async_trait]
pub trait Store: Send + Sync {
    /// Write a record, replacing any existing one.
    async fn put(&self, entity: &EntityRef, signed: &SignedClaim) -> Result<()>;

    /// Write a new record. Fails with `AlreadyExists` if the name is taken.
    async fn create(&self, entity: &EntityRef, signed: &SignedClaim) -> Result<()>;

    /// Replace a record only if its current `jti` is `expected`.
    ///
    /// Fails with `Conflict` when the stored record has changed and with
    /// `NotFound` when there is none.
    async fn replace(
        &self,
        entity: &EntityRef,
        signed: &SignedClaim,
        expected: ClaimId,
    ) -> Result<()>;

    /// Read a record. Fails with `NotFound` if it does not exist.
    ///
    /// The token signature is verified; the issuer is not.
    async fn get(&self, entity: &EntityRef) -> Result<SignedClaim>;

    /// Delete a record and everything stored beneath it.
    async fn delete(&self, entity: &EntityRef) -> Result<()>;

    /// Names of the children of `parent`, sorted. `None` lists operators.
    async fn list(&self, parent: Option<&EntityRef>) -> Result<Vec<String>>;

    /// Whether a record exists.
    async fn has(&self, entity: &EntityRef) -> Result<bool> {
        match self.get(entity).await {
            Ok(_) => Ok(true),
            Err(StoreError::NotFound(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// The persisted current operator/account selection.
    async fn selection(&self) -> Result<Selection>;

    async fn set_selection(&self, selection: &Selection) -> Result<()>;
}

/// Reject a record that does not belong at `entity`.
pub(crate) fn check_record(entity: &EntityRef, signed: &SignedClaim) -> Result<()> {
    if signed.kind() != entity.kind() {
        return Err(StoreError::InvalidData(format!(
            "{} claim cannot be stored as {entity}",
            signed.kind()
        )));
    }
    if signed.name() != entity.name() {
        return Err(StoreError::InvalidData(format!(
            "claim named {:?} cannot be stored as {entity}",
            signed.name()
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parent_chain() {
        let user = EntityRef::user("O", "A", "U");
        assert_eq!(user.parent(), Some(EntityRef::account("O", "A")));
        assert_eq!(
            user.parent().and_then(|a| a.parent()),
            Some(EntityRef::operator("O"))
        );
        assert_eq!(EntityRef::operator("O").parent(), None);
    }

    #[test]
    fn test_is_within() {
        let user = EntityRef::user("O", "A", "U");
        assert!(user.is_within(&EntityRef::operator("O")));
        assert!(user.is_within(&EntityRef::account("O", "A")));
        assert!(user.is_within(&user));
        assert!(!user.is_within(&EntityRef::account("O", "B")));
        assert!(!EntityRef::account("O", "A").is_within(&user));
    }

    #[test]
    fn test_child() {
        let op = EntityRef::operator("O");
        assert_eq!(op.child("A"), Some(EntityRef::account("O", "A")));
        assert_eq!(EntityRef::user("O", "A", "U").child("x"), None);
    }
}
