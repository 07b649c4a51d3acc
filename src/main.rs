use anyhow::Context;
use chat_relay::{
    config::Config,
    proxy::UpstreamClient,
    server::{create_router, AppState},
};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 初始化日志，支持通过环境变量配置，默认info级别
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("Starting chat relay...");

    // 加载配置，CHAT_RELAY_CONFIG 可指定配置文件路径
    let config_path =
        std::env::var("CHAT_RELAY_CONFIG").unwrap_or_else(|_| "config.yaml".to_string());
    let config = Config::from_file(&config_path)
        .with_context(|| format!("failed to load config from {}", config_path))?;

    let upstream =
        Arc::new(UpstreamClient::new(&config.upstream).context("failed to build upstream client")?);
    info!("Upstream endpoint: {}", upstream.url());

    let app = create_router(AppState::new(upstream, config.model.clone()));

    let addr = config.listen_addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    info!("Server listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
