use std::sync::Arc;

use anyhow::Context;

use sitestock_infra::LedgerConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    sitestock_observability::init();

    let config = LedgerConfig::from_env().context("invalid configuration")?;
    let services = sitestock_api::app::services::build_services(&config)
        .await
        .context("failed to initialise storage")?;

    let app = sitestock_api::app::build_app(Arc::new(services));

    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;

    tracing::info!(
        addr = %listener.local_addr()?,
        max_commit_retries = config.max_commit_retries,
        "listening"
    );

    axum::serve(listener, app).await.context("server error")?;
    Ok(())
}
