use std::net::SocketAddr;

use day_service::{Settings, build_router};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let settings = Settings::from_env()?;

    // RUST_LOG wins; otherwise LOG_LEVEL from the config map.
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(settings.log_directive())?,
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!(
        service = %settings.service_name,
        namespace = %settings.namespace,
        environment = %settings.environment,
        feature_new_ui = settings.feature_new_ui,
        cache_ttl = settings.cache_ttl,
        "starting day service"
    );

    let addr = SocketAddr::from(([0, 0, 0, 0], settings.port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "listening");

    axum::serve(listener, build_router(settings))
        .with_graceful_shutdown(async {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("shutdown signal received");
            }
        })
        .await?;

    info!("day service stopped");
    Ok(())
}
