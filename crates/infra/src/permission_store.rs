//! In-memory permission grants with the admin lifecycle.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::info;

use coachgate_auth::{PermissionGrant, PermissionStore, PermissionType, StoreError};
use coachgate_core::{DomainError, DomainResult, GrantId, UserId};

/// Admin request to grant a permission to a trainer.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct NewGrant {
    pub trainer_id: UserId,
    pub permission_type: PermissionType,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub notes: Option<String>,
}

/// Admin listing filter. Unset fields match everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GrantFilter {
    pub trainer_id: Option<UserId>,
    pub permission_type: Option<PermissionType>,
    pub is_active: Option<bool>,
    /// Grants whose expiry has passed are hidden unless set.
    pub include_expired: bool,
}

impl GrantFilter {
    fn matches(&self, grant: &PermissionGrant, now: DateTime<Utc>) -> bool {
        self.trainer_id.is_none_or(|id| grant.trainer_id == id)
            && self.permission_type.is_none_or(|p| grant.permission_type == p)
            && self.is_active.is_none_or(|a| grant.is_active == a)
            && (self.include_expired || grant.expires_at.is_none_or(|exp| exp > now))
    }
}

/// One-based page request.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct PageRequest {
    pub page: u32,
    pub limit: u32,
}

impl PageRequest {
    pub const DEFAULT_LIMIT: u32 = 50;
    pub const MAX_LIMIT: u32 = 200;

    pub fn new(page: u32, limit: u32) -> DomainResult<Self> {
        if page == 0 {
            return Err(DomainError::validation("page starts at 1"));
        }
        if limit == 0 || limit > Self::MAX_LIMIT {
            return Err(DomainError::validation(format!(
                "limit must be between 1 and {}",
                Self::MAX_LIMIT
            )));
        }
        Ok(Self { page, limit })
    }

    fn offset(&self) -> usize {
        (self.page as usize - 1) * self.limit as usize
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            page: 1,
            limit: Self::DEFAULT_LIMIT,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GrantPage {
    pub grants: Vec<PermissionGrant>,
    pub page: u32,
    pub limit: u32,
    pub total_count: usize,
    pub total_pages: usize,
}

/// Point-in-time counts over every grant ever issued.
///
/// `effective + revoked + expired == total`: each grant is in exactly one of
/// those buckets. `expiring_soon` is a subset of `effective`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GrantStats {
    pub total: usize,
    pub effective: usize,
    pub revoked: usize,
    pub expired: usize,
    pub expiring_soon: usize,
    /// Effective grants per type. Every type is present, zero included.
    pub by_type: BTreeMap<PermissionType, usize>,
    /// Distinct trainers holding at least one effective grant.
    pub trainers_with_grants: usize,
}

#[derive(Debug, Default)]
pub struct InMemoryPermissionStore {
    grants: RwLock<HashMap<GrantId, PermissionGrant>>,
}

impl InMemoryPermissionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an active grant.
    ///
    /// The expiry, when given, must lie in the future. A trainer may hold at
    /// most one effective grant per permission type.
    pub fn grant(
        &self,
        request: NewGrant,
        granted_by: UserId,
        now: DateTime<Utc>,
    ) -> DomainResult<PermissionGrant> {
        if let Some(exp) = request.expires_at {
            if exp <= now {
                return Err(DomainError::validation("expiration date must be in the future"));
            }
        }

        let mut grants = self.write()?;
        let duplicate = grants.values().any(|g| {
            g.trainer_id == request.trainer_id
                && g.permission_type == request.permission_type
                && g.is_effective(now)
        });
        if duplicate {
            return Err(DomainError::conflict(format!(
                "trainer already holds an active '{}' permission",
                request.permission_type
            )));
        }

        let grant = PermissionGrant {
            id: GrantId::new(),
            trainer_id: request.trainer_id,
            permission_type: request.permission_type,
            is_active: true,
            expires_at: request.expires_at,
            granted_by,
            granted_at: now,
            revoked_at: None,
            revoked_by: None,
            notes: request.notes,
        };
        grants.insert(grant.id, grant.clone());

        info!(
            target: "audit",
            grant_id = %grant.id,
            trainer_id = %grant.trainer_id,
            permission = grant.permission_type.as_str(),
            granted_by = %granted_by,
            "permission granted"
        );
        Ok(grant)
    }

    /// Deactivate a grant. `notes`, when given, replace the grant's notes.
    pub fn revoke(
        &self,
        id: GrantId,
        revoked_by: UserId,
        notes: Option<String>,
        now: DateTime<Utc>,
    ) -> DomainResult<PermissionGrant> {
        let mut grants = self.write()?;
        let grant = grants.get_mut(&id).ok_or_else(DomainError::not_found)?;
        if !grant.is_active {
            return Err(DomainError::conflict("permission is already revoked"));
        }

        grant.is_active = false;
        grant.revoked_at = Some(now);
        grant.revoked_by = Some(revoked_by);
        if notes.is_some() {
            grant.notes = notes;
        }

        info!(
            target: "audit",
            grant_id = %id,
            trainer_id = %grant.trainer_id,
            permission = grant.permission_type.as_str(),
            revoked_by = %revoked_by,
            "permission revoked"
        );
        Ok(grant.clone())
    }

    /// Move an active grant's expiry. `notes`, when given, replace the grant's notes.
    pub fn extend(
        &self,
        id: GrantId,
        new_expires_at: DateTime<Utc>,
        notes: Option<String>,
        now: DateTime<Utc>,
    ) -> DomainResult<PermissionGrant> {
        if new_expires_at <= now {
            return Err(DomainError::validation("new expiration date must be in the future"));
        }

        let mut grants = self.write()?;
        let grant = grants.get_mut(&id).ok_or_else(DomainError::not_found)?;
        if !grant.is_active {
            return Err(DomainError::invariant("cannot extend a revoked permission"));
        }

        grant.expires_at = Some(new_expires_at);
        if notes.is_some() {
            grant.notes = notes;
        }
        info!(
            target: "audit",
            grant_id = %id,
            trainer_id = %grant.trainer_id,
            expires_at = %new_expires_at,
            "permission extended"
        );
        Ok(grant.clone())
    }

    pub fn get(&self, id: GrantId) -> DomainResult<PermissionGrant> {
        self.read()?.get(&id).cloned().ok_or_else(DomainError::not_found)
    }

    /// Every grant ever issued to `trainer_id`, newest first.
    pub fn list_for_trainer(&self, trainer_id: UserId) -> DomainResult<Vec<PermissionGrant>> {
        let mut out: Vec<_> = self
            .read()?
            .values()
            .filter(|g| g.trainer_id == trainer_id)
            .cloned()
            .collect();
        out.sort_by(|a, b| b.granted_at.cmp(&a.granted_at));
        Ok(out)
    }

    /// Grants matching `filter`, newest first, cut to one page.
    pub fn list(
        &self,
        filter: &GrantFilter,
        page: PageRequest,
        now: DateTime<Utc>,
    ) -> DomainResult<GrantPage> {
        let mut matching: Vec<_> = self
            .read()?
            .values()
            .filter(|g| filter.matches(g, now))
            .cloned()
            .collect();
        matching.sort_by(|a, b| b.granted_at.cmp(&a.granted_at).then(b.id.cmp(&a.id)));

        let total_count = matching.len();
        let grants = matching
            .into_iter()
            .skip(page.offset())
            .take(page.limit as usize)
            .collect();
        Ok(GrantPage {
            grants,
            page: page.page,
            limit: page.limit,
            total_count,
            total_pages: total_count.div_ceil(page.limit as usize),
        })
    }

    pub fn stats(&self, now: DateTime<Utc>) -> DomainResult<GrantStats> {
        let grants = self.read()?;
        let mut stats = GrantStats {
            total: grants.len(),
            effective: 0,
            revoked: 0,
            expired: 0,
            expiring_soon: 0,
            by_type: PermissionType::ALL.into_iter().map(|p| (p, 0)).collect(),
            trainers_with_grants: 0,
        };
        let mut trainers = HashSet::new();
        for grant in grants.values() {
            if !grant.is_active {
                stats.revoked += 1;
            } else if grant.is_effective(now) {
                stats.effective += 1;
                *stats.by_type.entry(grant.permission_type).or_default() += 1;
                trainers.insert(grant.trainer_id);
                if grant.is_expiring_soon(now) {
                    stats.expiring_soon += 1;
                }
            } else {
                stats.expired += 1;
            }
        }
        stats.trainers_with_grants = trainers.len();
        Ok(stats)
    }

    /// The effective grant for one permission, if any.
    pub fn find_effective(
        &self,
        trainer_id: UserId,
        permission_type: PermissionType,
        now: DateTime<Utc>,
    ) -> DomainResult<Option<PermissionGrant>> {
        Ok(self
            .read()?
            .values()
            .find(|g| {
                g.trainer_id == trainer_id
                    && g.permission_type == permission_type
                    && g.is_effective(now)
            })
            .cloned())
    }

    fn read(&self) -> DomainResult<RwLockReadGuard<'_, HashMap<GrantId, PermissionGrant>>> {
        self.grants
            .read()
            .map_err(|_| DomainError::invariant("permission store lock poisoned"))
    }

    fn write(&self) -> DomainResult<RwLockWriteGuard<'_, HashMap<GrantId, PermissionGrant>>> {
        self.grants
            .write()
            .map_err(|_| DomainError::invariant("permission store lock poisoned"))
    }
}

#[async_trait]
impl PermissionStore for InMemoryPermissionStore {
    async fn find_effective_grants(
        &self,
        trainer_id: UserId,
        types: &[PermissionType],
        now: DateTime<Utc>,
    ) -> Result<HashSet<PermissionType>, StoreError> {
        let grants = self
            .grants
            .read()
            .map_err(|_| StoreError::Corrupt("permission store lock poisoned".into()))?;
        Ok(grants
            .values()
            .filter(|g| g.trainer_id == trainer_id && types.contains(&g.permission_type))
            .filter(|g| g.is_effective(now))
            .map(|g| g.permission_type)
            .collect())
    }
}
