use std::path::Path;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod api;
mod auth;
mod routes;
mod state;
mod views;

use state::AppState;
use whoknows::{config, db};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "whoknows=debug,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration / 加载配置
    let app_config = config::load_config().map_err(anyhow::Error::msg)?;
    tracing::info!(
        "Starting whoknows (built {}, env={}, full_text={}, enrichment={})",
        whoknows::BUILD_TIME,
        app_config.app_env,
        app_config.search.full_text,
        app_config.search.external_enrichment
    );

    let pool = db::connect(&app_config).await?;
    db::run_migrations(&pool).await?;
    db::seed_pages(
        &pool,
        Path::new(&app_config.database.seed_file),
        app_config.is_production(),
    )
    .await?;

    match auth::purge_expired_sessions(&pool).await {
        Ok(0) => {}
        Ok(n) => tracing::info!("Removed {} expired sessions", n),
        Err(e) => tracing::warn!("Failed to purge expired sessions: {}", e),
    }

    if app_config.weather.api_key.is_none() {
        tracing::warn!("DMI_API_KEY not set, weather pages will report the service as unavailable");
    }

    let bind_addr = app_config.get_bind_address();
    let state = Arc::new(AppState::from_config(pool, app_config)?);
    let app = routes::build_router(state);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!("Server running at http://{}", bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
