use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use fileengine_remote::api::build_router;
use fileengine_remote::archive::purge_stale_archives;
use fileengine_remote::config::{self, ConfigSource};
use fileengine_remote::state::{backend_from_config, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "fileengine_remote=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("File-Engine remote, built {}", env!("BUILD_TIME"));

    // Load configuration / 加载配置
    let app_config = config::load_config().map_err(anyhow::Error::msg)?;
    tracing::info!("Server will listen on {}:{}", app_config.server.host, app_config.port());
    if app_config.server.cors_enabled {
        tracing::info!("CORS headers enabled");
    }

    // Temporary archive directory / 临时压缩包目录
    let temp_dir = app_config.temp_path();
    if !temp_dir.exists() {
        std::fs::create_dir_all(&temp_dir)?;
        tracing::info!("Created temp directory: {:?}", temp_dir);
    }
    match purge_stale_archives(&temp_dir) {
        Ok(0) => {}
        Ok(n) => tracing::info!("Removed {} stale archives from {:?}", n, temp_dir),
        Err(e) => tracing::warn!("Failed to clean temp directory {:?}: {}", temp_dir, e),
    }

    let backend = backend_from_config(&app_config)?;
    tracing::info!("Using {} search backend", backend.name());

    let bind_addr = app_config.get_bind_address();
    let state = Arc::new(AppState::new(app_config, backend));
    let app = build_router(state);

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
