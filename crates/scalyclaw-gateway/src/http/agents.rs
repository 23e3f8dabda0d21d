//! Agent registry HTTP surface (spec.md §3 "Agent", §6 "agents"): a named
//! persona bundle on disk (manifest + system prompt), with registered state
//! `{id, enabled, maxIterations, models, skills, tools, mcpServers}` kept
//! in the KV store, the same way `scalyclaw-scheduler` keeps `ScheduledJob`
//! hashes next to their queue jobs.

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;

use scalyclaw_agent::tools::build::{build_tools, tool_definitions};
use scalyclaw_kv::keys;

use crate::app::AppState;
use crate::http::chat::check_auth;

/// One built-in agent id, immutable (spec.md §3 "one built-in agent is
/// immutable").
const BUILTIN_AGENT_ID: &str = "default-agent";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentProfile {
    pub id: String,
    pub name: String,
    pub description: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u32,
    #[serde(default)]
    pub models: Vec<String>,
    #[serde(default)]
    pub skills: Vec<String>,
    #[serde(default)]
    pub tools: Vec<String>,
    #[serde(default)]
    pub mcp_servers: Vec<String>,
}

fn default_true() -> bool {
    true
}
fn default_max_iterations() -> u32 {
    25
}

pub async fn list_agents_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    if !check_auth(&state, &headers) {
        return Err(unauthorized());
    }
    let ids = state
        .sessions
        .kv()
        .smembers(keys::agent_index())
        .await
        .map_err(|e| internal_error(e.to_string()))?;
    let mut agents = Vec::with_capacity(ids.len());
    for id in ids {
        if let Some(a) = get_profile(&state, &id).await.map_err(|e| internal_error(e.to_string()))? {
            agents.push(a);
        }
    }
    Ok(Json(json!({ "agents": agents })))
}

pub async fn get_agent_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    if !check_auth(&state, &headers) {
        return Err(unauthorized());
    }
    match get_profile(&state, &id).await.map_err(|e| internal_error(e.to_string()))? {
        Some(a) => Ok(Json(json!(a))),
        None => Err(not_found(&id)),
    }
}

#[derive(Deserialize)]
pub struct CreateAgentRequest {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u32,
    #[serde(default)]
    pub models: Vec<String>,
    #[serde(default)]
    pub skills: Vec<String>,
    #[serde(default)]
    pub tools: Vec<String>,
    #[serde(default)]
    pub mcp_servers: Vec<String>,
}

pub async fn create_agent_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(req): Json<CreateAgentRequest>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    if !check_auth(&state, &headers) {
        return Err(unauthorized());
    }
    let id = format!("{}-agent", uuid::Uuid::new_v4());
    let profile = AgentProfile {
        id: id.clone(),
        name: req.name,
        description: req.description,
        enabled: true,
        max_iterations: req.max_iterations,
        models: req.models,
        skills: req.skills,
        tools: req.tools,
        mcp_servers: req.mcp_servers,
    };
    save_profile(&state, &profile).await.map_err(|e| internal_error(e.to_string()))?;
    Ok(Json(json!(profile)))
}

#[derive(Deserialize)]
pub struct UpdateAgentRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub enabled: Option<bool>,
    #[serde(default)]
    pub max_iterations: Option<u32>,
    #[serde(default)]
    pub models: Option<Vec<String>>,
    #[serde(default)]
    pub skills: Option<Vec<String>>,
    #[serde(default)]
    pub tools: Option<Vec<String>>,
    #[serde(default)]
    pub mcp_servers: Option<Vec<String>>,
}

pub async fn update_agent_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(req): Json<UpdateAgentRequest>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    if !check_auth(&state, &headers) {
        return Err(unauthorized());
    }
    let Some(mut profile) = get_profile(&state, &id).await.map_err(|e| internal_error(e.to_string()))? else {
        return Err(not_found(&id));
    };
    if let Some(v) = req.name {
        profile.name = v;
    }
    if let Some(v) = req.description {
        profile.description = v;
    }
    if let Some(v) = req.enabled {
        profile.enabled = v;
    }
    if let Some(v) = req.max_iterations {
        profile.max_iterations = v;
    }
    if let Some(v) = req.models {
        profile.models = v;
    }
    if let Some(v) = req.skills {
        profile.skills = v;
    }
    if let Some(v) = req.tools {
        profile.tools = v;
    }
    if let Some(v) = req.mcp_servers {
        profile.mcp_servers = v;
    }
    save_profile(&state, &profile).await.map_err(|e| internal_error(e.to_string()))?;
    Ok(Json(json!(profile)))
}

pub async fn delete_agent_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    if !check_auth(&state, &headers) {
        return Err(unauthorized());
    }
    if id == BUILTIN_AGENT_ID {
        return Err(bad_request("the built-in agent cannot be deleted"));
    }
    let kv = state.sessions.kv();
    kv.del(&keys::agent_profile(&id)).await.map_err(|e| internal_error(e.to_string()))?;
    kv.srem(keys::agent_index(), &id).await.map_err(|e| internal_error(e.to_string()))?;
    Ok(Json(json!({ "deleted": true })))
}

/// GET /api/agents/eligible-tools — the full tool catalog an agent's
/// `tools` allow-list may reference (spec.md §4.8).
pub async fn eligible_tools_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    if !check_auth(&state, &headers) {
        return Err(unauthorized());
    }
    let tools = build_tools(state.clone(), "http", None, None);
    let names: Vec<String> = tool_definitions(&tools).into_iter().map(|t| t.name).collect();
    Ok(Json(json!({ "tools": names })))
}

async fn get_profile(state: &AppState, id: &str) -> scalyclaw_kv::error::Result<Option<AgentProfile>> {
    state.sessions.kv().get_json(&keys::agent_profile(id)).await
}

async fn save_profile(state: &AppState, profile: &AgentProfile) -> scalyclaw_kv::error::Result<()> {
    let kv = state.sessions.kv();
    kv.set_json(&keys::agent_profile(&profile.id), profile).await?;
    kv.sadd(keys::agent_index(), &profile.id).await
}

fn unauthorized() -> (StatusCode, Json<Value>) {
    (StatusCode::UNAUTHORIZED, Json(json!({"error": "unauthorized"})))
}

fn not_found(id: &str) -> (StatusCode, Json<Value>) {
    (StatusCode::NOT_FOUND, Json(json!({"error": format!("agent '{id}' not found")})))
}

fn bad_request(msg: &str) -> (StatusCode, Json<Value>) {
    (StatusCode::BAD_REQUEST, Json(json!({"error": msg})))
}

fn internal_error(msg: String) -> (StatusCode, Json<Value>) {
    (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({"error": msg})))
}
