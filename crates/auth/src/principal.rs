use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use coachgate_core::{Clock, UserId};

use crate::audit::{AuditEvent, AuditKind, AuditSink, RequestMeta};
use crate::{AuthFailure, Denial, Forbidden, Role, StoreError, TokenClaims};

/// Account lifecycle state as held by the user directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AccountStatus {
    #[default]
    Active,
    Suspended,
    Deleted,
}

impl AccountStatus {
    pub fn can_authenticate(&self) -> bool {
        matches!(self, AccountStatus::Active)
    }
}

/// Read-only snapshot of the acting user for the duration of one request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub id: UserId,
    pub role: Role,
    pub status: AccountStatus,
    pub email: String,
}

impl Principal {
    pub fn active(id: UserId, role: Role, email: impl Into<String>) -> Self {
        Self {
            id,
            role,
            status: AccountStatus::Active,
            email: email.into(),
        }
    }
}

/// Source of truth for account records.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn find_by_id(&self, id: UserId) -> Result<Option<Principal>, StoreError>;
}

/// Maps verified claims to the live principal.
///
/// The directory, not the token, decides role and status, so demotions and
/// suspensions apply to tokens that are already in circulation.
pub struct PrincipalResolver {
    directory: Arc<dyn UserDirectory>,
    audit: Arc<dyn AuditSink>,
    clock: Arc<dyn Clock>,
}

impl PrincipalResolver {
    pub fn new(
        directory: Arc<dyn UserDirectory>,
        audit: Arc<dyn AuditSink>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            directory,
            audit,
            clock,
        }
    }

    pub async fn resolve(
        &self,
        claims: &TokenClaims,
        request: &RequestMeta,
    ) -> Result<Principal, Denial> {
        let outcome = self.lookup(claims).await;

        let code = match &outcome {
            Ok(_) => "allowed",
            Err(denial) => denial.code(),
        };
        self.audit.record(AuditEvent::new(
            AuditKind::PrincipalResolution,
            Some(claims.subject_id),
            request,
            code,
            self.clock.now(),
        ));

        outcome
    }

    async fn lookup(&self, claims: &TokenClaims) -> Result<Principal, Denial> {
        let principal = self
            .directory
            .find_by_id(claims.subject_id)
            .await
            .map_err(|e| {
                error!(principal_id = %claims.subject_id, error = %e, "user directory lookup failed");
                Denial::internal(format!("user directory: {e}"))
            })?
            .ok_or(Denial::AuthFailed(AuthFailure::UserNotFound))?;

        if !principal.status.can_authenticate() {
            return Err(Denial::Forbidden(Forbidden::AccountSuspended));
        }

        if principal.role != claims.role {
            debug!(
                principal_id = %principal.id,
                token_role = %claims.role,
                directory_role = %principal.role,
                "token role is stale; using directory role"
            );
        }

        Ok(principal)
    }
}
