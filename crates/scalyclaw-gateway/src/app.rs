use axum::{
    routing::{delete, get, patch, post, put},
    Router,
};
use dashmap::DashMap;
use scalyclaw_agent::runtime::AgentRuntime;
use scalyclaw_core::config::ScalyClawConfig;
use scalyclaw_core::types::ChannelOutbound;
use scalyclaw_memory::manager::MemoryManager;
use scalyclaw_queue::fabric::QueueFabric;
use scalyclaw_scheduler::SchedulerManager;
use scalyclaw_sessions::SessionManager;
use scalyclaw_terminal::manager::TerminalManager;
use scalyclaw_users::resolver::UserResolver;
use scalyclaw_vault::VaultManager;
use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc, RwLock,
};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::ws::broadcast::EventBroadcaster;

/// Central shared state — passed as Arc<AppState> to all Axum handlers.
pub struct AppState {
    /// `std::sync::RwLock` rather than a plain value: `PUT /api/config` and
    /// `POST /api/config/reload` mutate it at runtime (spec.md §6 "config").
    pub config: RwLock<ScalyClawConfig>,
    pub event_seq: AtomicU64,
    #[allow(dead_code)]
    pub presence_version: AtomicU64,
    pub broadcaster: EventBroadcaster,
    pub agent: AgentRuntime,
    pub users: UserResolver,
    pub memory: MemoryManager,
    pub sessions: SessionManager,
    pub scheduler: SchedulerManager,
    pub queue: QueueFabric,
    pub vault: VaultManager,
    /// Terminal subsystem — tokio::sync::Mutex because create_session, kill,
    /// exec_background, and job_kill are async and must be awaited while the
    /// lock is held.
    pub terminal: tokio::sync::Mutex<TerminalManager>,
    /// Active WS connections: conn_id -> message sender.
    pub ws_clients: DashMap<String, mpsc::Sender<String>>,
    /// Notification queue for HTTP/terminal clients: session_key -> pending messages.
    /// Drained by `GET /notifications`.
    pub notifications: DashMap<String, Vec<String>>,
    /// Active pipeline operations: session_key -> CancellationToken.
    /// `/stop` cancels all tokens to abort running tool loops.
    pub active_operations: DashMap<String, CancellationToken>,
    /// Outbound channel senders for cross-channel messaging.
    /// Key: channel name (e.g. "discord"), Value: sender for `ChannelOutbound` messages.
    pub channel_senders: DashMap<String, mpsc::Sender<ChannelOutbound>>,
}

impl AppState {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: ScalyClawConfig,
        agent: AgentRuntime,
        users: UserResolver,
        memory: MemoryManager,
        sessions: SessionManager,
        scheduler: SchedulerManager,
        queue: QueueFabric,
        vault: VaultManager,
        terminal: TerminalManager,
    ) -> Self {
        Self {
            config: RwLock::new(config),
            event_seq: AtomicU64::new(0),
            presence_version: AtomicU64::new(0),
            broadcaster: EventBroadcaster::new(),
            agent,
            users,
            memory,
            sessions,
            scheduler,
            queue,
            vault,
            terminal: tokio::sync::Mutex::new(terminal),
            ws_clients: DashMap::new(),
            notifications: DashMap::new(),
            active_operations: DashMap::new(),
            channel_senders: DashMap::new(),
        }
    }

    /// Monotonically increasing sequence for broadcast events.
    pub fn next_seq(&self) -> u64 {
        self.event_seq.fetch_add(1, Ordering::Relaxed)
    }
}

impl scalyclaw_agent::pipeline::MessageContext for AppState {
    fn agent(&self) -> &scalyclaw_agent::runtime::AgentRuntime {
        &self.agent
    }

    fn memory(&self) -> &scalyclaw_memory::manager::MemoryManager {
        &self.memory
    }

    fn terminal(&self) -> &tokio::sync::Mutex<scalyclaw_terminal::manager::TerminalManager> {
        &self.terminal
    }

    fn scheduler(&self) -> &scalyclaw_scheduler::SchedulerManager {
        &self.scheduler
    }
}

impl AppState {
    /// Outbound channel adapters currently registered (e.g. `"discord"`, `"telegram"`).
    pub fn connected_channels(&self) -> Vec<String> {
        self.channel_senders
            .iter()
            .map(|entry| entry.key().clone())
            .collect()
    }

    /// Route a message to a connected channel adapter for delivery.
    pub fn send_to_channel(&self, channel: &str, recipient: &str, message: &str) -> Result<(), String> {
        let sender = self
            .channel_senders
            .get(channel)
            .ok_or_else(|| format!("channel '{}' is not connected", channel))?;
        sender
            .try_send(ChannelOutbound {
                recipient: recipient.to_string(),
                message: message.to_string(),
            })
            .map_err(|e| format!("failed to send to '{}': {}", channel, e))
    }

    pub fn gateway_port(&self) -> Option<u16> {
        Some(self.config.read().unwrap().gateway.port)
    }

    pub fn database_path(&self) -> Option<String> {
        Some(self.config.read().unwrap().database.path.clone())
    }
}

/// Assemble the full Axum router.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(crate::http::ui::ui_handler))
        .route("/health", get(crate::http::health::health_handler))
        .route("/chat", post(crate::http::chat::chat_handler))
        .route(
            "/notifications",
            get(crate::http::notifications::notifications_handler),
        )
        .route("/ws", get(crate::ws::connection::ws_handler))
        .route(
            "/v1/chat/completions",
            post(crate::http::openai_compat::chat_completions),
        )
        .route(
            "/webhooks/{source}",
            post(crate::http::webhooks::webhook_handler),
        )
        // ── management HTTP surface (spec.md §6) ────────────────────────────
        .route("/api/chat", post(crate::http::chat::api_chat_handler))
        .route(
            "/api/messages",
            get(crate::http::chat::list_messages_handler).delete(crate::http::chat::clear_messages_handler),
        )
        .route(
            "/api/buffered-responses",
            get(crate::http::chat::buffered_responses_handler),
        )
        .route(
            "/api/config",
            get(crate::http::config::get_config_handler).put(crate::http::config::put_config_handler),
        )
        .route(
            "/api/config/reload",
            post(crate::http::config::reload_config_handler),
        )
        .route("/api/models", get(crate::http::models::list_models_handler))
        .route(
            "/api/models/{id}",
            patch(crate::http::models::patch_model_handler),
        )
        .route(
            "/api/models/test",
            post(crate::http::models::test_model_handler),
        )
        .route(
            "/api/agents",
            get(crate::http::agents::list_agents_handler).post(crate::http::agents::create_agent_handler),
        )
        .route(
            "/api/agents/eligible-tools",
            get(crate::http::agents::eligible_tools_handler),
        )
        .route(
            "/api/agents/{id}",
            get(crate::http::agents::get_agent_handler)
                .put(crate::http::agents::update_agent_handler)
                .patch(crate::http::agents::update_agent_handler)
                .delete(crate::http::agents::delete_agent_handler),
        )
        .route(
            "/api/skills",
            get(crate::http::skills::list_skills_handler).post(crate::http::skills::upload_skill_handler),
        )
        .route(
            "/api/skills/{id}",
            patch(crate::http::skills::patch_skill_handler).delete(crate::http::skills::delete_skill_handler),
        )
        .route(
            "/api/skills/{id}/invoke",
            post(crate::http::skills::invoke_skill_handler),
        )
        .route(
            "/api/skills/{id}/readme",
            get(crate::http::skills::get_readme_handler).put(crate::http::skills::put_readme_handler),
        )
        .route("/api/skills/{id}/zip", get(crate::http::skills::zip_skill_handler))
        .route(
            "/api/memory",
            get(crate::http::memory::list_memory_handler).post(crate::http::memory::create_memory_handler),
        )
        .route("/api/memory/search", get(crate::http::memory::search_memory_handler))
        .route("/api/memory/{id}", delete(crate::http::memory::delete_memory_handler))
        .route(
            "/api/vault",
            get(crate::http::vault::list_vault_handler).post(crate::http::vault::set_vault_handler),
        )
        .route(
            "/api/vault/{name}",
            get(crate::http::vault::get_vault_handler).delete(crate::http::vault::delete_vault_handler),
        )
        .route("/api/jobs", get(crate::http::jobs::list_jobs_handler))
        .route("/api/jobs/counts", get(crate::http::jobs::job_counts_handler))
        .route(
            "/api/jobs/{queue}/{id}",
            get(crate::http::jobs::get_job_handler).delete(crate::http::jobs::delete_job_handler),
        )
        .route(
            "/api/jobs/{queue}/{id}/retry",
            post(crate::http::jobs::retry_job_handler),
        )
        .route(
            "/api/jobs/{queue}/{id}/complete",
            post(crate::http::jobs::complete_job_handler),
        )
        .route(
            "/api/jobs/{queue}/{id}/fail",
            post(crate::http::jobs::fail_job_handler),
        )
        .route(
            "/api/scheduler",
            get(crate::http::scheduler::list_scheduled_handler),
        )
        .route(
            "/api/scheduler/reminder",
            post(crate::http::scheduler::create_reminder_handler),
        )
        .route(
            "/api/scheduler/recurrent-reminder",
            post(crate::http::scheduler::create_recurrent_reminder_handler),
        )
        .route(
            "/api/scheduler/task",
            post(crate::http::scheduler::create_task_handler),
        )
        .route(
            "/api/scheduler/recurrent-task",
            post(crate::http::scheduler::create_recurrent_task_handler),
        )
        .route(
            "/api/scheduler/{id}",
            delete(crate::http::scheduler::delete_scheduled_handler),
        )
        .route(
            "/api/scheduler/{id}/complete",
            post(crate::http::scheduler::complete_scheduled_handler),
        )
        .route(
            "/api/scheduler/{id}/purge",
            delete(crate::http::scheduler::purge_scheduled_handler),
        )
        .with_state(state)
        .layer(tower_http::trace::TraceLayer::new_for_http())
}
