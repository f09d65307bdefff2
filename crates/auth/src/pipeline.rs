//! Fixed-order access pipeline.
//!
//! Token → principal → kill switch → rate → role → permission. The first
//! stage to deny ends evaluation; later stages never run.

use std::sync::Arc;

use tracing::{debug, error, warn};

use crate::audit::{AuditSink, RequestMeta};
use crate::authorize::{Elevation, PermissionGate, PermissionRequirement, PermissionStore, require_role};
use crate::token::{TokenVerifier, extract_bearer};
use crate::{
    AccessDecision, Denial, Feature, FeatureFlagSource, KillSwitch, PrincipalResolver,
    RateGovernor, Role, Stage, UserDirectory,
};
use coachgate_core::Clock;

/// Declarative per-route access requirements, built once at startup.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoutePolicy {
    pub feature: Option<Feature>,
    /// Empty means any authenticated, active principal.
    pub roles: Vec<Role>,
    pub permissions: Option<PermissionRequirement>,
}

impl RoutePolicy {
    pub fn authenticated() -> Self {
        Self::default()
    }

    pub fn feature(mut self, feature: Feature) -> Self {
        self.feature = Some(feature);
        self
    }

    pub fn roles(mut self, roles: impl IntoIterator<Item = Role>) -> Self {
        self.roles = roles.into_iter().collect();
        self
    }

    pub fn permissions(mut self, requirement: PermissionRequirement) -> Self {
        self.permissions = Some(requirement);
        self
    }
}

/// Collaborators the pipeline is assembled from.
pub struct PipelineDeps {
    pub verifier: Arc<dyn TokenVerifier>,
    pub directory: Arc<dyn UserDirectory>,
    pub permissions: Arc<dyn PermissionStore>,
    pub flags: Arc<dyn FeatureFlagSource>,
    pub audit: Arc<dyn AuditSink>,
    pub governor: Arc<RateGovernor>,
    pub clock: Arc<dyn Clock>,
}

pub struct AccessPipeline {
    verifier: Arc<dyn TokenVerifier>,
    resolver: PrincipalResolver,
    kill_switch: KillSwitch,
    governor: Arc<RateGovernor>,
    permission_gate: PermissionGate,
    clock: Arc<dyn Clock>,
}

impl AccessPipeline {
    pub fn new(deps: PipelineDeps) -> Self {
        Self {
            verifier: deps.verifier,
            resolver: PrincipalResolver::new(deps.directory, deps.audit.clone(), deps.clock.clone()),
            kill_switch: KillSwitch::new(deps.flags),
            governor: deps.governor,
            permission_gate: PermissionGate::new(deps.permissions, deps.audit),
            clock: deps.clock,
        }
    }

    pub fn kill_switch(&self) -> &KillSwitch {
        &self.kill_switch
    }

    pub fn governor(&self) -> &RateGovernor {
        &self.governor
    }

    /// Run every applicable stage for one request.
    ///
    /// `authorization` is the raw `Authorization` header value, if any.
    pub async fn evaluate(
        &self,
        authorization: Option<&str>,
        request: &RequestMeta,
        policy: &RoutePolicy,
    ) -> AccessDecision {
        let now = self.clock.now();

        let claims = match extract_bearer(authorization)
            .and_then(|token| self.verifier.verify(token, now))
        {
            Ok(claims) => claims,
            Err(denial) => return deny(Stage::Token, denial, None, request),
        };

        let principal = match self.resolver.resolve(&claims, request).await {
            Ok(p) => p,
            Err(denial) => {
                return deny(Stage::Principal, denial, Some(&claims.subject_id), request);
            }
        };

        if let Some(feature) = &policy.feature {
            if !self.kill_switch.is_enabled(feature) {
                let denial = Denial::FeatureDisabled {
                    feature: feature.clone(),
                };
                return deny(Stage::KillSwitch, denial, Some(&principal.id), request);
            }
        }

        if let Err(denial) = self.governor.admit(principal.id, now) {
            return deny(Stage::Rate, denial, Some(&principal.id), request);
        }

        let elevation = Elevation::of(&principal);

        if !policy.roles.is_empty() {
            if let Err(denial) = require_role(&principal, &policy.roles, elevation) {
                return deny(Stage::Role, denial, Some(&principal.id), request);
            }
        }

        if let Some(requirement) = &policy.permissions {
            if let Err(denial) = self
                .permission_gate
                .require(&principal, requirement, elevation, request, now)
                .await
            {
                return deny(Stage::Permission, denial, Some(&principal.id), request);
            }
        }

        debug!(
            principal_id = %principal.id,
            role = %principal.role,
            path = %request.path,
            method = %request.method,
            "access allowed"
        );
        AccessDecision::Allowed(principal)
    }
}

fn deny(
    stage: Stage,
    denial: Denial,
    principal_id: Option<&coachgate_core::UserId>,
    request: &RequestMeta,
) -> AccessDecision {
    let principal_id = principal_id.map(ToString::to_string).unwrap_or_default();
    match &denial {
        Denial::InternalError(msg) => error!(
            principal_id = %principal_id,
            path = %request.path,
            method = %request.method,
            stage = stage.as_str(),
            error = %msg,
            "access evaluation failed"
        ),
        Denial::AuthRequired => debug!(
            path = %request.path,
            method = %request.method,
            "no credential presented"
        ),
        _ => warn!(
            principal_id = %principal_id,
            path = %request.path,
            method = %request.method,
            stage = stage.as_str(),
            decision = denial.code(),
            "access denied"
        ),
    }
    AccessDecision::Denied { stage, denial }
}
