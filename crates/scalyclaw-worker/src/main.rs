use std::net::SocketAddr;
use std::sync::Arc;

use tokio::sync::watch;
use tracing::info;

use scalyclaw_kv::KvStore;
use scalyclaw_queue::fabric::QueueFabric;

mod app;
mod error;
mod http;
mod logs;
mod processor;
mod skills;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _log_guard = logs::init_logging()?;

    let config_path = std::env::var("SCALYCLAW_CONFIG").ok();
    let config = scalyclaw_core::config::ScalyClawConfig::load(config_path.as_deref())
        .unwrap_or_else(|e| {
            tracing::warn!("Config load failed ({}), using defaults", e);
            scalyclaw_core::config::ScalyClawConfig::default()
        });

    let bind = config.worker.bind.clone();
    let port = config.worker.port;
    let concurrency = config.queue.tools_concurrency as usize;

    let kv = KvStore::connect(&config.kv.url).await?;
    let queue = QueueFabric::new(kv);

    let tools_processor = processor::build_processor(
        config.worker.workspace_dir.clone(),
        config.worker.skills_dir.clone(),
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let state = Arc::new(app::AppState::new(
        tools_processor.clone(),
        config.worker.auth_token.clone(),
        config.worker.workspace_dir.clone(),
        config.worker.skills_dir.clone(),
        shutdown_tx,
    ));

    tokio::spawn({
        let fabric = Arc::new(queue);
        let rx = shutdown_rx.clone();
        async move {
            fabric.run_consumer("tools".to_string(), concurrency, tools_processor, rx).await;
        }
    });

    let router = app::build_router(state.clone());

    let addr: SocketAddr = format!("{}:{}", bind, port).parse()?;
    info!("ScalyClaw worker listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router)
        .with_graceful_shutdown(async move {
            let mut rx = shutdown_rx.clone();
            let _ = rx.changed().await;
        })
        .await?;

    Ok(())
}
