//! Worker HTTP surface (spec.md §6): `GET /health` (no auth), `GET
//! /status`, `GET /api/logs?lines=N`, `GET /api/files?path=...` (denies
//! path traversal), `POST /api/shutdown`. Bearer token required on every
//! route except `/health`.

use std::path::{Component, Path};
use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::app::AppState;
use crate::logs::tail_lines;

fn extract_bearer(headers: &HeaderMap) -> Option<&str> {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
}

fn check_auth(state: &AppState, headers: &HeaderMap) -> bool {
    match &state.auth_token {
        None => true,
        Some(expected) => extract_bearer(headers).map(|t| t == expected).unwrap_or(false),
    }
}

fn unauthorized() -> (StatusCode, Json<Value>) {
    (StatusCode::UNAUTHORIZED, Json(json!({"error": "unauthorized"})))
}

fn bad_request(msg: &str) -> (StatusCode, Json<Value>) {
    (StatusCode::BAD_REQUEST, Json(json!({"error": msg})))
}

fn internal_error(msg: String) -> (StatusCode, Json<Value>) {
    (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({"error": msg})))
}

/// `GET /health` — no auth required, matches the gateway's liveness shape.
pub async fn health_handler(State(state): State<Arc<AppState>>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "uptime_secs": state.started_at.elapsed().as_secs(),
    }))
}

/// `GET /status` — process metadata, bearer-gated.
pub async fn status_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    if !check_auth(&state, &headers) {
        return Err(unauthorized());
    }
    Ok(Json(json!({
        "version": env!("CARGO_PKG_VERSION"),
        "uptime_secs": state.started_at.elapsed().as_secs(),
        "workspace_dir": state.workspace_dir,
        "skills_dir": state.skills_dir,
    })))
}

#[derive(Deserialize)]
pub struct LogsQuery {
    #[serde(default = "default_lines")]
    pub lines: usize,
}

fn default_lines() -> usize {
    200
}

/// `GET /api/logs?lines=N` — tails the worker's own rolling log file.
pub async fn logs_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(query): Query<LogsQuery>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    if !check_auth(&state, &headers) {
        return Err(unauthorized());
    }
    let lines = tail_lines(query.lines).map_err(|e| internal_error(e.to_string()))?;
    Ok(Json(json!({ "lines": lines })))
}

#[derive(Deserialize)]
pub struct FilesQuery {
    pub path: String,
}

/// `GET /api/files?path=<workspace-or-skills-relative>` — denies path
/// traversal by resolving against both roots and rejecting `..` components.
pub async fn files_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(query): Query<FilesQuery>,
) -> Result<Vec<u8>, (StatusCode, Json<Value>)> {
    if !check_auth(&state, &headers) {
        return Err(unauthorized());
    }
    let rel = Path::new(&query.path);
    if rel
        .components()
        .any(|c| matches!(c, Component::ParentDir | Component::RootDir | Component::Prefix(_)))
    {
        return Err(bad_request("path escapes the worker root"));
    }

    let workspace_candidate = Path::new(&state.workspace_dir).join(rel);
    let skills_candidate = Path::new(&state.skills_dir).join(rel);
    let resolved = if workspace_candidate.is_file() {
        workspace_candidate
    } else if skills_candidate.is_file() {
        skills_candidate
    } else {
        return Err((StatusCode::NOT_FOUND, Json(json!({"error": "file not found"}))));
    };

    tokio::fs::read(&resolved)
        .await
        .map_err(|e| internal_error(e.to_string()))
}

/// `POST /api/shutdown` — signals the main loop's graceful-shutdown watch
/// channel and returns before the listener actually stops accepting.
pub async fn shutdown_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    if !check_auth(&state, &headers) {
        return Err(unauthorized());
    }
    let _ = state.shutdown.send(true);
    Ok(Json(json!({ "shutting_down": true })))
}
