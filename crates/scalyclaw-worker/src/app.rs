//! Worker process state and router (spec.md §6 "Worker HTTP surface").

use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

use crate::processor::ToolsProcessor;

pub struct AppState {
    pub processor: Arc<ToolsProcessor>,
    pub auth_token: Option<String>,
    pub workspace_dir: String,
    pub skills_dir: String,
    pub started_at: std::time::Instant,
    /// Set by `POST /api/shutdown`; the main loop watches this to stop serving.
    pub shutdown: tokio::sync::watch::Sender<bool>,
}

impl AppState {
    pub fn new(
        processor: Arc<ToolsProcessor>,
        auth_token: Option<String>,
        workspace_dir: String,
        skills_dir: String,
        shutdown: tokio::sync::watch::Sender<bool>,
    ) -> Self {
        Self {
            processor,
            auth_token,
            workspace_dir,
            skills_dir,
            started_at: std::time::Instant::now(),
            shutdown,
        }
    }
}

pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(crate::http::health_handler))
        .route("/status", get(crate::http::status_handler))
        .route("/api/logs", get(crate::http::logs_handler))
        .route("/api/files", get(crate::http::files_handler))
        .route("/api/shutdown", post(crate::http::shutdown_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
