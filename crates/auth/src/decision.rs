//! Access decisions and the denial taxonomy.

use chrono::Duration;
use serde::Serialize;
use thiserror::Error;

use crate::{Feature, PermissionType, Principal, Role};

/// Why a credential was rejected after it was presented.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthFailure {
    InvalidSignature,
    Expired,
    MalformedPayload,
    UserNotFound,
}

impl AuthFailure {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuthFailure::InvalidSignature => "invalid_signature",
            AuthFailure::Expired => "expired",
            AuthFailure::MalformedPayload => "malformed_payload",
            AuthFailure::UserNotFound => "user_not_found",
        }
    }
}

impl core::fmt::Display for AuthFailure {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a set of required permissions is combined.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RequireMode {
    /// Every listed permission must be effective.
    All,
    /// At least one listed permission must be effective.
    Any,
}

/// Which rate window denied a request.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RateScope {
    Principal,
    Global,
}

impl core::fmt::Display for RateScope {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            RateScope::Principal => f.write_str("principal"),
            RateScope::Global => f.write_str("global"),
        }
    }
}

/// An authenticated principal is not privileged enough.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Forbidden {
    /// The account exists but is suspended or deleted.
    AccountSuspended,

    /// The principal's role is not in the accepted set.
    ///
    /// `required_roles` always lists the full accepted set (admin included)
    /// so callers can render "requires one of: ...".
    RoleRequired { required_roles: Vec<Role> },

    /// The principal lacks effective permission grants.
    ///
    /// For [`RequireMode::All`] this lists the missing permissions; for
    /// [`RequireMode::Any`] it lists every accepted permission.
    MissingPermissions {
        mode: RequireMode,
        missing_permissions: Vec<PermissionType>,
    },
}

/// A terminal, non-allow outcome of the access pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Denial {
    #[error("authentication required")]
    AuthRequired,

    #[error("authentication failed: {0}")]
    AuthFailed(AuthFailure),

    #[error("forbidden: {}", describe_forbidden(.0))]
    Forbidden(Forbidden),

    #[error("rate limited ({scope}); retry in {}s", retry_after_secs(.retry_after))]
    RateLimited { scope: RateScope, retry_after: Duration },

    #[error("feature '{feature}' is disabled")]
    FeatureDisabled { feature: Feature },

    #[error("internal error: {0}")]
    InternalError(String),
}

impl Denial {
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::InternalError(msg.into())
    }

    /// Stable, machine-readable code for responses and logs.
    pub fn code(&self) -> &'static str {
        match self {
            Denial::AuthRequired => "auth_required",
            Denial::AuthFailed(AuthFailure::InvalidSignature) => "invalid_signature",
            Denial::AuthFailed(AuthFailure::Expired) => "token_expired",
            Denial::AuthFailed(AuthFailure::MalformedPayload) => "malformed_token",
            Denial::AuthFailed(AuthFailure::UserNotFound) => "user_not_found",
            Denial::Forbidden(Forbidden::AccountSuspended) => "account_suspended",
            Denial::Forbidden(Forbidden::RoleRequired { .. }) => "role_required",
            Denial::Forbidden(Forbidden::MissingPermissions { .. }) => "permission_required",
            Denial::RateLimited {
                scope: RateScope::Principal,
                ..
            } => "rate_limited",
            Denial::RateLimited {
                scope: RateScope::Global,
                ..
            } => "service_busy",
            Denial::FeatureDisabled { .. } => "feature_disabled",
            Denial::InternalError(_) => "internal_error",
        }
    }

    /// HTTP status the caller must answer with.
    pub fn status_code(&self) -> u16 {
        match self {
            Denial::AuthRequired | Denial::AuthFailed(_) => 401,
            Denial::Forbidden(_) => 403,
            Denial::RateLimited {
                scope: RateScope::Principal,
                ..
            } => 429,
            Denial::RateLimited {
                scope: RateScope::Global,
                ..
            } => 503,
            Denial::FeatureDisabled { .. } => 503,
            Denial::InternalError(_) => 500,
        }
    }

    /// Rate limits and disabled features clear on their own; privilege
    /// denials need an admin action and must not be retried automatically.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Denial::RateLimited { .. } | Denial::FeatureDisabled { .. }
        )
    }

    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Denial::RateLimited { retry_after, .. } => Some(*retry_after),
            _ => None,
        }
    }
}

fn describe_forbidden(f: &Forbidden) -> String {
    match f {
        Forbidden::AccountSuspended => "account is suspended".to_string(),
        Forbidden::RoleRequired { required_roles } => format!(
            "requires one of: {}",
            required_roles
                .iter()
                .map(|r| r.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        ),
        Forbidden::MissingPermissions {
            mode,
            missing_permissions,
        } => {
            let list = missing_permissions
                .iter()
                .map(|p| p.as_str())
                .collect::<Vec<_>>()
                .join(", ");
            match mode {
                RequireMode::All => format!("missing permissions: {list}"),
                RequireMode::Any => format!("requires one of the permissions: {list}"),
            }
        }
    }
}

/// Whole seconds, rounded up, never below one.
pub fn retry_after_secs(d: &Duration) -> i64 {
    let ms = d.num_milliseconds().max(1);
    (ms + 999) / 1000
}

/// Pipeline stage that produced a decision.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Token,
    Principal,
    KillSwitch,
    Rate,
    Role,
    Permission,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Token => "token",
            Stage::Principal => "principal",
            Stage::KillSwitch => "kill_switch",
            Stage::Rate => "rate",
            Stage::Role => "role",
            Stage::Permission => "permission",
        }
    }
}

/// Outcome of one pipeline run. Exactly one per request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccessDecision {
    /// Every configured stage passed; the resolved principal is handed to
    /// the protected operation.
    Allowed(Principal),

    /// The first stage that rejected the request, and why.
    Denied { stage: Stage, denial: Denial },
}

impl AccessDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, AccessDecision::Allowed(_))
    }

    pub fn denial(&self) -> Option<&Denial> {
        match self {
            AccessDecision::Allowed(_) => None,
            AccessDecision::Denied { denial, .. } => Some(denial),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_mapping_matches_contract() {
        assert_eq!(Denial::AuthRequired.status_code(), 401);
        assert_eq!(Denial::AuthFailed(AuthFailure::Expired).status_code(), 401);
        assert_eq!(Denial::Forbidden(Forbidden::AccountSuspended).status_code(), 403);
        let principal = Denial::RateLimited {
            scope: RateScope::Principal,
            retry_after: Duration::seconds(3),
        };
        let global = Denial::RateLimited {
            scope: RateScope::Global,
            retry_after: Duration::seconds(3),
        };
        assert_eq!(principal.status_code(), 429);
        assert_eq!(global.status_code(), 503);
        assert_eq!(
            Denial::FeatureDisabled {
                feature: Feature::AI_GENERATION
            }
            .status_code(),
            503
        );
        assert_eq!(Denial::internal("boom").status_code(), 500);
    }

    #[test]
    fn expired_and_bad_signature_have_distinct_codes() {
        assert_ne!(
            Denial::AuthFailed(AuthFailure::Expired).code(),
            Denial::AuthFailed(AuthFailure::InvalidSignature).code()
        );
    }

    #[test]
    fn role_denial_message_lists_accepted_roles() {
        let d = Denial::Forbidden(Forbidden::RoleRequired {
            required_roles: vec![Role::Trainer, Role::Admin],
        });
        assert_eq!(d.to_string(), "forbidden: requires one of: trainer, admin");
    }

    #[test]
    fn retry_after_rounds_up() {
        assert_eq!(retry_after_secs(&Duration::milliseconds(1)), 1);
        assert_eq!(retry_after_secs(&Duration::milliseconds(1500)), 2);
        assert_eq!(retry_after_secs(&Duration::seconds(60)), 60);
    }

    #[test]
    fn only_transient_denials_are_retryable() {
        assert!(
            Denial::RateLimited {
                scope: RateScope::Principal,
                retry_after: Duration::seconds(1)
            }
            .is_retryable()
        );
        assert!(!Denial::Forbidden(Forbidden::AccountSuspended).is_retryable());
    }
}
