use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use tokio::sync::watch;
use tracing::info;

use scalyclaw_agent::prompt::PromptBuilder;
use scalyclaw_agent::runtime::AgentRuntime;
use scalyclaw_kv::KvStore;
use scalyclaw_memory::manager::MemoryManager;
use scalyclaw_queue::fabric::QueueFabric;
use scalyclaw_scheduler::SchedulerManager;
use scalyclaw_sessions::SessionManager;
use scalyclaw_terminal::manager::TerminalManager;
use scalyclaw_users::resolver::UserResolver;
use scalyclaw_vault::VaultManager;

mod app;
mod http;
mod provider_build;
mod queue_consumers;
mod stop;
mod update;
mod ws;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "scalyclaw_gateway=info,tower_http=debug".into()),
        )
        .init();

    // load config: explicit path > SCALYCLAW_CONFIG env > ~/.scalyclaw/scalyclaw.toml
    let config_path = std::env::var("SCALYCLAW_CONFIG").ok();
    let config = scalyclaw_core::config::ScalyClawConfig::load(config_path.as_deref())
        .unwrap_or_else(|e| {
            tracing::warn!("Config load failed ({}), using defaults", e);
            scalyclaw_core::config::ScalyClawConfig::default()
        });

    let bind = config.gateway.bind.clone();
    let port = config.gateway.port;
    let messages_concurrency = config.queue.messages_concurrency as usize;
    let internal_concurrency = config.queue.internal_concurrency as usize;

    let kv = KvStore::connect(&config.kv.url).await?;
    let queue = QueueFabric::new(kv.clone());
    let sessions = SessionManager::new(kv.clone());
    let scheduler = SchedulerManager::new(kv.clone(), queue.clone());

    let vault_password_path = {
        let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
        std::path::PathBuf::from(home).join(".scalyclaw/vault.key")
    };
    let vault = VaultManager::new(kv.clone(), vault_password_path)?;
    let terminal = TerminalManager::new();

    let memory_conn = scalyclaw_memory::db::open(&config.database.path)?;
    let memory = MemoryManager::new(
        memory_conn,
        config.memory.embedding_dim as usize,
        config.memory.vector_score_threshold,
    );

    let users_conn = rusqlite::Connection::open(&config.database.path)?;
    scalyclaw_users::db::init_db(&users_conn)?;
    let users = UserResolver::new(Arc::new(Mutex::new(users_conn)));

    let provider = provider_build::build_provider(&config.providers);
    let prompt = PromptBuilder::load(config.agent.soul_path.as_deref(), None);
    let agent = AgentRuntime::new(provider, prompt, config.agent.model.clone())
        .with_model_pools(config.orchestrator.models.clone(), config.providers.models.clone())
        .with_orchestrator_tuning(config.orchestrator.max_iterations, config.budget.clone());

    let state = Arc::new(app::AppState::new(
        config, agent, users, memory, sessions, scheduler, queue, vault, terminal,
    ));

    let (_shutdown_tx, shutdown_rx) = watch::channel(false);

    let message_processor = Arc::new(queue_consumers::MessageProcessor { app: state.clone() });
    tokio::spawn({
        let fabric = Arc::new(state.queue.clone());
        let rx = shutdown_rx.clone();
        async move {
            fabric.run_consumer("messages".to_string(), messages_concurrency, message_processor, rx).await;
        }
    });

    let internal_processor = Arc::new(queue_consumers::InternalProcessor { app: state.clone() });
    tokio::spawn({
        let fabric = Arc::new(state.queue.clone());
        let rx = shutdown_rx.clone();
        async move {
            fabric.run_consumer("internal".to_string(), internal_concurrency, internal_processor, rx).await;
        }
    });

    let router = app::build_router(state.clone());

    let addr: SocketAddr = format!("{}:{}", bind, port).parse()?;
    info!("ScalyClaw gateway listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router).await?;

    Ok(())
}
