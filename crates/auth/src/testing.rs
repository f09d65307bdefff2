//! In-crate fakes for unit tests.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use coachgate_core::UserId;

use crate::audit::{AuditEvent, AuditSink};
use crate::{PermissionStore, PermissionType, Principal, StoreError, UserDirectory};

#[derive(Default)]
pub struct FakeDirectory {
    users: HashMap<UserId, Principal>,
    failing: bool,
    calls: AtomicUsize,
}

impl FakeDirectory {
    pub fn with(users: Vec<Principal>) -> Self {
        Self {
            users: users.into_iter().map(|p| (p.id, p)).collect(),
            ..Default::default()
        }
    }

    pub fn failing() -> Self {
        Self {
            failing: true,
            ..Default::default()
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl UserDirectory for FakeDirectory {
    async fn find_by_id(&self, id: UserId) -> Result<Option<Principal>, StoreError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing {
            return Err(StoreError::unavailable("directory offline"));
        }
        Ok(self.users.get(&id).cloned())
    }
}

#[derive(Default)]
pub struct RecordingAudit {
    events: Mutex<Vec<AuditEvent>>,
}

impl RecordingAudit {
    pub fn events(&self) -> Vec<AuditEvent> {
        self.events.lock().unwrap().clone()
    }
}

impl AuditSink for RecordingAudit {
    fn record(&self, event: AuditEvent) {
        self.events.lock().unwrap().push(event);
    }
}

struct FakeGrant {
    trainer_id: UserId,
    permission: PermissionType,
    expires_at: Option<DateTime<Utc>>,
}

/// Permission store that counts lookups.
#[derive(Default)]
pub struct CountingPermissionStore {
    grants: Mutex<Vec<FakeGrant>>,
    failing: bool,
    calls: AtomicUsize,
}

impl CountingPermissionStore {
    pub fn failing() -> Self {
        Self {
            failing: true,
            ..Default::default()
        }
    }

    pub fn grant(
        &self,
        trainer_id: UserId,
        permission: PermissionType,
        expires_at: Option<DateTime<Utc>>,
    ) {
        self.grants.lock().unwrap().push(FakeGrant {
            trainer_id,
            permission,
            expires_at,
        });
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PermissionStore for CountingPermissionStore {
    async fn find_effective_grants(
        &self,
        trainer_id: UserId,
        types: &[PermissionType],
        now: DateTime<Utc>,
    ) -> Result<HashSet<PermissionType>, StoreError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing {
            return Err(StoreError::Timeout);
        }
        Ok(self
            .grants
            .lock()
            .unwrap()
            .iter()
            .filter(|g| g.trainer_id == trainer_id && types.contains(&g.permission))
            .filter(|g| g.expires_at.is_none_or(|e| e > now))
            .map(|g| g.permission)
            .collect())
    }
}
