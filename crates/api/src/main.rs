use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use tracing::info;

use tenantry_api::app::{build_app, services::AppServices};
use tenantry_infra::{AppConfig, spawn_sweeper};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // A missing .env file is fine.
    let _ = dotenvy::dotenv();

    let config = AppConfig::from_env().context("loading configuration")?;
    tenantry_observability::init(config.log_format);

    let services = Arc::new(AppServices::from_config(&config)?);
    if let Some(admin) = &config.bootstrap_admin {
        services
            .bootstrap_admin(admin)
            .context("creating bootstrap system admin")?;
    }

    let sweeper = spawn_sweeper(services.limiter.clone());
    let app = build_app(services);

    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;
    info!(addr = %listener.local_addr()?, "listening");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(async {
        let _ = tokio::signal::ctrl_c().await;
    })
    .await?;

    sweeper.shutdown().await;
    info!("server stopped");
    Ok(())
}
