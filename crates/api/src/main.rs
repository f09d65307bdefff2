use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;

use coachgate_infra::GovernanceConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    coachgate_observability::init_from_env();

    let config = GovernanceConfig::from_env().context("invalid configuration")?;
    let bind_addr = config.bind_addr;

    let services = Arc::new(coachgate_api::app::build_services(config)?);
    let _pruner = coachgate_api::app::spawn_rate_window_pruner(
        services.governor.clone(),
        services.clock.clone(),
        Duration::from_secs(60),
    );

    let app = coachgate_api::app::build_app(services);

    let listener = tokio::net::TcpListener::bind(bind_addr)
        .await
        .with_context(|| format!("failed to bind {bind_addr}"))?;

    tracing::info!(addr = %listener.local_addr()?, "listening");

    axum::serve(listener, app).await?;
    Ok(())
}
