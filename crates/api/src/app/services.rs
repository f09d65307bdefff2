//! Collaborator wiring for the HTTP process.

use std::sync::Arc;
use std::time::Duration;

use coachgate_auth::{
    AccessPipeline, Hs256TokenVerifier, PipelineDeps, Principal, RateGovernor, Role, StoreError,
    TracingAuditSink,
};
use coachgate_core::{Clock, SystemClock};
use coachgate_infra::{
    EnvFeatureFlags, GovernanceConfig, InMemoryAuditSink, InMemoryFeatureFlags,
    InMemoryPermissionStore, InMemoryUserDirectory,
};

/// Everything handlers and the access middleware need.
pub struct Services {
    pub pipeline: Arc<AccessPipeline>,
    pub directory: Arc<InMemoryUserDirectory>,
    pub permissions: Arc<InMemoryPermissionStore>,
    pub flags: Arc<InMemoryFeatureFlags>,
    pub governor: Arc<RateGovernor>,
    pub audit: Arc<InMemoryAuditSink>,
    pub clock: Arc<dyn Clock>,
}

pub fn build_services(config: GovernanceConfig) -> Result<Services, StoreError> {
    build_services_with_clock(config, Arc::new(SystemClock))
}

pub fn build_services_with_clock(
    config: GovernanceConfig,
    clock: Arc<dyn Clock>,
) -> Result<Services, StoreError> {
    let directory = Arc::new(InMemoryUserDirectory::new());
    let permissions = Arc::new(InMemoryPermissionStore::new());
    let flags = Arc::new(InMemoryFeatureFlags::with_fallback(Arc::new(
        EnvFeatureFlags::from_env(),
    )));
    let governor = Arc::new(RateGovernor::new(config.per_principal, config.global));
    let audit = Arc::new(InMemoryAuditSink::default().forwarding_to(Arc::new(TracingAuditSink)));

    for feature in &config.disabled_features {
        flags.set_enabled(feature.clone(), false)?;
    }

    if let Some(admin) = &config.bootstrap_admin {
        directory.upsert(Principal::active(admin.id, Role::Admin, admin.email.clone()))?;
        tracing::info!(principal_id = %admin.id, "bootstrap admin seeded");
    }

    let pipeline = Arc::new(AccessPipeline::new(PipelineDeps {
        verifier: Arc::new(Hs256TokenVerifier::new(config.jwt_secret.as_bytes())),
        directory: directory.clone(),
        permissions: permissions.clone(),
        flags: flags.clone(),
        audit: audit.clone(),
        governor: governor.clone(),
        clock: clock.clone(),
    }));

    Ok(Services {
        pipeline,
        directory,
        permissions,
        flags,
        governor,
        audit,
        clock,
    })
}

/// Periodically drop elapsed rate windows so memory tracks active principals
/// only. Abort the handle to stop.
pub fn spawn_rate_window_pruner(
    governor: Arc<RateGovernor>,
    clock: Arc<dyn Clock>,
    every: Duration,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            let removed = governor.prune_expired(clock.now());
            if removed > 0 {
                tracing::debug!(removed, "pruned elapsed rate windows");
            }
        }
    })
}
