//! `coachgate-auth`: request authorization and governance.
//!
//! Every inbound request passes through [`AccessPipeline`], which composes
//! token verification, principal resolution, the kill switch, rate
//! governance and the role/permission gates into a single
//! [`AccessDecision`]. The crate knows nothing about HTTP or storage; both
//! sit behind the collaborator traits ([`UserDirectory`],
//! [`PermissionStore`], [`FeatureFlagSource`], [`AuditSink`]).

pub mod audit;
pub mod authorize;
pub mod claims;
pub mod decision;
pub mod error;
pub mod kill_switch;
pub mod permissions;
pub mod pipeline;
pub mod principal;
pub mod rate_limit;
pub mod roles;
pub mod token;

#[cfg(test)]
pub(crate) mod testing;

pub use audit::{AuditEvent, AuditKind, AuditSink, RequestMeta, TracingAuditSink};
pub use authorize::{Elevation, PermissionGate, PermissionRequirement, PermissionStore, require_role};
pub use claims::{TokenClaims, TokenValidationError, validate_claims};
pub use decision::{
    AccessDecision, AuthFailure, Denial, Forbidden, RateScope, RequireMode, Stage,
    retry_after_secs,
};
pub use error::StoreError;
pub use kill_switch::{Feature, FeatureFlagSource, KillSwitch};
pub use permissions::{PermissionGrant, PermissionType, UnknownPermission};
pub use pipeline::{AccessPipeline, PipelineDeps, RoutePolicy};
pub use principal::{AccountStatus, Principal, PrincipalResolver, UserDirectory};
pub use rate_limit::{RateGovernor, RateLimit, RateWindow};
pub use roles::{Role, UnknownRole};
pub use token::{Hs256TokenVerifier, TokenVerifier, encode_token, extract_bearer};
