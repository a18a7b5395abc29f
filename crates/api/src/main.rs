use anyhow::Context;
use tracing::{info, warn};

use figura_api::app::{build_app, AppServices};
use figura_infra::config::AppConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    figura_observability::init();

    let config = AppConfig::from_env().context("invalid configuration")?;
    if config.jwt_secret_is_default {
        warn!("JWT_SECRET not set; using insecure dev default");
    }

    let services = AppServices::from_config(&config).await?;
    let scheduler = if config.scheduler_enabled {
        Some(services.spawn_scheduler(config.refresh_interval))
    } else {
        info!("refresh scheduler disabled");
        None
    };

    let app = build_app(config.jwt_secret.clone(), services);

    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;
    info!(addr = %listener.local_addr()?, "listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    if let Some(scheduler) = scheduler {
        scheduler.shutdown().await;
    }
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("shutdown requested");
}
