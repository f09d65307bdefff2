//! In-memory user directory.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;

use coachgate_auth::{AccountStatus, Principal, Role, StoreError, UserDirectory};
use coachgate_core::{DomainError, DomainResult, UserId};

/// Account records keyed by user id, for dev and tests.
///
/// Role and status changes are visible to the very next lookup, which is what
/// lets demotions and suspensions apply to tokens already issued.
#[derive(Debug, Default)]
pub struct InMemoryUserDirectory {
    inner: RwLock<HashMap<UserId, Principal>>,
}

impl InMemoryUserDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn upsert(&self, principal: Principal) -> Result<(), StoreError> {
        let mut map = self.write()?;
        map.insert(principal.id, principal);
        Ok(())
    }

    pub fn get(&self, id: UserId) -> Option<Principal> {
        let map = self.inner.read().ok()?;
        map.get(&id).cloned()
    }

    pub fn set_status(&self, id: UserId, status: AccountStatus) -> DomainResult<()> {
        self.update(id, |p| p.status = status)
    }

    pub fn set_role(&self, id: UserId, role: Role) -> DomainResult<()> {
        self.update(id, |p| p.role = role)
    }

    pub fn remove(&self, id: UserId) -> Option<Principal> {
        self.inner.write().ok()?.remove(&id)
    }

    pub fn len(&self) -> usize {
        self.inner.read().map(|m| m.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of accounts currently holding `role`, whatever their status.
    pub fn count_role(&self, role: Role) -> usize {
        self.inner
            .read()
            .map(|m| m.values().filter(|p| p.role == role).count())
            .unwrap_or(0)
    }

    fn update(&self, id: UserId, f: impl FnOnce(&mut Principal)) -> DomainResult<()> {
        let mut map = self
            .inner
            .write()
            .map_err(|_| DomainError::invariant("user directory lock poisoned"))?;
        let principal = map.get_mut(&id).ok_or_else(DomainError::not_found)?;
        f(principal);
        Ok(())
    }

    fn write(
        &self,
    ) -> Result<std::sync::RwLockWriteGuard<'_, HashMap<UserId, Principal>>, StoreError> {
        self.inner
            .write()
            .map_err(|_| StoreError::Corrupt("user directory lock poisoned".into()))
    }
}

#[async_trait]
impl UserDirectory for InMemoryUserDirectory {
    async fn find_by_id(&self, id: UserId) -> Result<Option<Principal>, StoreError> {
        let map = self
            .inner
            .read()
            .map_err(|_| StoreError::Corrupt("user directory lock poisoned".into()))?;
        Ok(map.get(&id).cloned())
    }
}
