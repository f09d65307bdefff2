//! Role and permission gates.
//!
//! Both gates take an [`Elevation`] computed once per request, so the admin
//! bypass is decided in exactly one place.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{error, warn};

use coachgate_core::UserId;

use crate::audit::{AuditEvent, AuditKind, AuditSink, RequestMeta};
use crate::{Denial, Forbidden, PermissionType, Principal, RequireMode, Role, StoreError};

/// Privilege level of the acting principal for this request.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Elevation {
    /// Admins pass every role and permission gate.
    Admin,
    Standard,
}

impl Elevation {
    pub fn of(principal: &Principal) -> Self {
        if principal.role == Role::Admin {
            Elevation::Admin
        } else {
            Elevation::Standard
        }
    }

    pub fn bypasses_gates(&self) -> bool {
        matches!(self, Elevation::Admin)
    }
}

/// Static role-membership check.
///
/// Admin is implicitly a member of every accepted set. On denial the full
/// accepted set (admin included) is returned for user-facing messaging.
pub fn require_role(
    principal: &Principal,
    allowed: &[Role],
    elevation: Elevation,
) -> Result<(), Denial> {
    if elevation.bypasses_gates() || allowed.contains(&principal.role) {
        return Ok(());
    }

    let mut required_roles = allowed.to_vec();
    if !required_roles.contains(&Role::Admin) {
        required_roles.push(Role::Admin);
    }
    Err(Denial::Forbidden(Forbidden::RoleRequired { required_roles }))
}

/// Source of trainer permission grants.
#[async_trait]
pub trait PermissionStore: Send + Sync {
    /// Of `types`, the permissions `trainer_id` holds through a grant that is
    /// effective at `now`.
    async fn find_effective_grants(
        &self,
        trainer_id: UserId,
        types: &[PermissionType],
        now: DateTime<Utc>,
    ) -> Result<HashSet<PermissionType>, StoreError>;
}

/// Permissions a route demands and how they combine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PermissionRequirement {
    pub permissions: Vec<PermissionType>,
    pub mode: RequireMode,
}

impl PermissionRequirement {
    pub fn one(permission: PermissionType) -> Self {
        Self::all([permission])
    }

    pub fn all(permissions: impl IntoIterator<Item = PermissionType>) -> Self {
        Self {
            permissions: dedup(permissions),
            mode: RequireMode::All,
        }
    }

    pub fn any(permissions: impl IntoIterator<Item = PermissionType>) -> Self {
        Self {
            permissions: dedup(permissions),
            mode: RequireMode::Any,
        }
    }

    /// Decide against the set of effective permissions actually held.
    pub fn evaluate(&self, held: &HashSet<PermissionType>) -> Result<(), Forbidden> {
        if self.permissions.is_empty() {
            return Ok(());
        }
        match self.mode {
            RequireMode::All => {
                let missing: Vec<_> = self
                    .permissions
                    .iter()
                    .copied()
                    .filter(|p| !held.contains(p))
                    .collect();
                if missing.is_empty() {
                    Ok(())
                } else {
                    Err(Forbidden::MissingPermissions {
                        mode: RequireMode::All,
                        missing_permissions: missing,
                    })
                }
            }
            RequireMode::Any => {
                if self.permissions.iter().any(|p| held.contains(p)) {
                    Ok(())
                } else {
                    Err(Forbidden::MissingPermissions {
                        mode: RequireMode::Any,
                        missing_permissions: self.permissions.clone(),
                    })
                }
            }
        }
    }
}

fn dedup(permissions: impl IntoIterator<Item = PermissionType>) -> Vec<PermissionType> {
    let mut out = Vec::new();
    for p in permissions {
        if !out.contains(&p) {
            out.push(p);
        }
    }
    out
}

/// Dynamic, expiring, revocable capability check for trainers.
pub struct PermissionGate {
    store: Arc<dyn PermissionStore>,
    audit: Arc<dyn AuditSink>,
}

impl PermissionGate {
    pub fn new(store: Arc<dyn PermissionStore>, audit: Arc<dyn AuditSink>) -> Self {
        Self { store, audit }
    }

    pub async fn require(
        &self,
        principal: &Principal,
        requirement: &PermissionRequirement,
        elevation: Elevation,
        request: &RequestMeta,
        now: DateTime<Utc>,
    ) -> Result<(), Denial> {
        if elevation.bypasses_gates() {
            return Ok(());
        }

        if principal.role != Role::Trainer {
            let denial = Denial::Forbidden(Forbidden::RoleRequired {
                required_roles: vec![Role::Trainer, Role::Admin],
            });
            self.record_denial(principal, requirement, request, &denial, now);
            return Err(denial);
        }

        let held = self
            .store
            .find_effective_grants(principal.id, &requirement.permissions, now)
            .await
            .map_err(|e| {
                error!(principal_id = %principal.id, error = %e, "permission store lookup failed");
                Denial::internal(format!("permission store: {e}"))
            })?;

        requirement.evaluate(&held).map_err(|forbidden| {
            let denial = Denial::Forbidden(forbidden);
            self.record_denial(principal, requirement, request, &denial, now);
            denial
        })
    }

    fn record_denial(
        &self,
        principal: &Principal,
        requirement: &PermissionRequirement,
        request: &RequestMeta,
        denial: &Denial,
        now: DateTime<Utc>,
    ) {
        let required: Vec<&str> = requirement.permissions.iter().map(|p| p.as_str()).collect();
        warn!(
            target: "audit",
            principal_id = %principal.id,
            role = %principal.role,
            path = %request.path,
            method = %request.method,
            mode = ?requirement.mode,
            required = ?required,
            decision = denial.code(),
            "permission denied"
        );
        self.audit.record(
            AuditEvent::new(
                AuditKind::PermissionDenied,
                Some(principal.id),
                request,
                denial.code(),
                now,
            )
            .with_extra(serde_json::json!({
                "mode": requirement.mode,
                "required": required,
                "denial": denial.to_string(),
            })),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{CountingPermissionStore, RecordingAudit};
    use chrono::Duration;

    use PermissionType::*;

    fn trainer() -> Principal {
        Principal::active(UserId::new(), Role::Trainer, "t1@example.com")
    }

    fn meta() -> RequestMeta {
        RequestMeta::new("POST", "/workouts")
    }

    fn gate(store: Arc<CountingPermissionStore>, audit: Arc<RecordingAudit>) -> PermissionGate {
        PermissionGate::new(store, audit)
    }

    #[test]
    fn admin_passes_any_role_set() {
        let admin = Principal::active(UserId::new(), Role::Admin, "a@example.com");
        assert!(require_role(&admin, &[Role::Client], Elevation::of(&admin)).is_ok());
    }

    #[test]
    fn role_denial_carries_accepted_set() {
        let client = Principal::active(UserId::new(), Role::Client, "c@example.com");
        let err = require_role(&client, &[Role::Trainer], Elevation::of(&client)).unwrap_err();
        assert_eq!(
            err,
            Denial::Forbidden(Forbidden::RoleRequired {
                required_roles: vec![Role::Trainer, Role::Admin]
            })
        );
    }

    #[tokio::test]
    async fn admin_bypass_never_touches_the_store() {
        let store = Arc::new(CountingPermissionStore::default());
        let admin = Principal::active(UserId::new(), Role::Admin, "a@example.com");

        let result = gate(store.clone(), Arc::new(RecordingAudit::default()))
            .require(
                &admin,
                &PermissionRequirement::all(PermissionType::ALL),
                Elevation::of(&admin),
                &meta(),
                Utc::now(),
            )
            .await;

        assert!(result.is_ok());
        assert_eq!(store.calls(), 0);
    }

    #[tokio::test]
    async fn clients_are_rejected_before_lookup() {
        let store = Arc::new(CountingPermissionStore::default());
        let audit = Arc::new(RecordingAudit::default());
        let client = Principal::active(UserId::new(), Role::Client, "c@example.com");

        let err = gate(store.clone(), audit.clone())
            .require(
                &client,
                &PermissionRequirement::one(ViewProgress),
                Elevation::of(&client),
                &meta(),
                Utc::now(),
            )
            .await
            .unwrap_err();

        assert_eq!(err.code(), "role_required");
        assert_eq!(store.calls(), 0);
        assert_eq!(audit.events().len(), 1);
    }

    #[tokio::test]
    async fn single_grant_scenario() {
        let t1 = trainer();
        let now = Utc::now();
        let store = Arc::new(CountingPermissionStore::default());
        store.grant(t1.id, EditWorkouts, Some(now + Duration::days(1)));
        let audit = Arc::new(RecordingAudit::default());
        let gate = gate(store, audit.clone());
        let el = Elevation::of(&t1);

        assert!(
            gate.require(&t1, &PermissionRequirement::all([EditWorkouts]), el, &meta(), now)
                .await
                .is_ok()
        );

        let err = gate
            .require(
                &t1,
                &PermissionRequirement::all([EditWorkouts, ViewAnalytics]),
                el,
                &meta(),
                now,
            )
            .await
            .unwrap_err();
        assert_eq!(
            err,
            Denial::Forbidden(Forbidden::MissingPermissions {
                mode: RequireMode::All,
                missing_permissions: vec![ViewAnalytics],
            })
        );

        let err = gate
            .require(
                &t1,
                &PermissionRequirement::any([ManageClients, ViewProgress]),
                el,
                &meta(),
                now,
            )
            .await
            .unwrap_err();
        assert_eq!(
            err,
            Denial::Forbidden(Forbidden::MissingPermissions {
                mode: RequireMode::Any,
                missing_permissions: vec![ManageClients, ViewProgress],
            })
        );

        let events = audit.events();
        assert_eq!(events.len(), 2);
        assert!(events.iter().all(|e| e.kind == AuditKind::PermissionDenied));
        assert!(events.iter().all(|e| e.path == "/workouts"));
    }

    #[tokio::test]
    async fn any_mode_passes_with_one_of_the_set() {
        let t = trainer();
        let now = Utc::now();
        let store = Arc::new(CountingPermissionStore::default());
        store.grant(t.id, ViewAnalytics, None);
        let gate = gate(store, Arc::new(RecordingAudit::default()));

        let any = PermissionRequirement::any([ViewProgress, ViewAnalytics]);
        assert!(gate.require(&t, &any, Elevation::of(&t), &meta(), now).await.is_ok());

        let all = PermissionRequirement::all([ViewProgress, ViewAnalytics]);
        let err = gate.require(&t, &all, Elevation::of(&t), &meta(), now).await.unwrap_err();
        assert_eq!(
            err,
            Denial::Forbidden(Forbidden::MissingPermissions {
                mode: RequireMode::All,
                missing_permissions: vec![ViewProgress],
            })
        );
    }

    #[tokio::test]
    async fn expiry_is_observed_on_the_next_check() {
        let t = trainer();
        let now = Utc::now();
        let store = Arc::new(CountingPermissionStore::default());
        store.grant(t.id, EditWorkouts, Some(now + Duration::seconds(5)));
        let gate = gate(store, Arc::new(RecordingAudit::default()));
        let req = PermissionRequirement::one(EditWorkouts);

        assert!(gate.require(&t, &req, Elevation::of(&t), &meta(), now).await.is_ok());
        let later = now + Duration::seconds(5);
        assert!(gate.require(&t, &req, Elevation::of(&t), &meta(), later).await.is_err());
    }

    #[tokio::test]
    async fn store_outage_is_internal_not_forbidden() {
        let t = trainer();
        let store = Arc::new(CountingPermissionStore::failing());
        let err = gate(store, Arc::new(RecordingAudit::default()))
            .require(
                &t,
                &PermissionRequirement::one(EditWorkouts),
                Elevation::of(&t),
                &meta(),
                Utc::now(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, Denial::InternalError(_)));
    }

    #[test]
    fn requirement_dedups_permissions() {
        let req = PermissionRequirement::all([EditWorkouts, EditWorkouts, ViewProgress]);
        assert_eq!(req.permissions, vec![EditWorkouts, ViewProgress]);
    }

    #[test]
    fn empty_requirement_is_satisfied() {
        assert!(PermissionRequirement::any([]).evaluate(&HashSet::new()).is_ok());
    }
}
