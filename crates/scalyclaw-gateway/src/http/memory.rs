//! Memory HTTP surface (spec.md §6 "memory"): `GET /api/memory`, `GET
//! /api/memory/search`, `POST /api/memory`, `DELETE /api/memory/:id`.

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

use scalyclaw_memory::types::{MemoryInput, SearchOptions};

use crate::app::AppState;
use crate::http::chat::check_auth;

#[derive(Deserialize)]
pub struct ListMemoryQuery {
    #[serde(default = "default_top_k")]
    pub top_k: usize,
}

fn default_top_k() -> usize {
    50
}

/// GET /api/memory — most relevant stored memories (empty-query search).
pub async fn list_memory_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(q): Query<ListMemoryQuery>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    if !check_auth(&state, &headers) {
        return Err(unauthorized());
    }
    let results = state
        .memory
        .search_memory("", SearchOptions { top_k: q.top_k, ..Default::default() })
        .map_err(|e| internal_error(e.to_string()))?;
    Ok(Json(json!({ "memories": results })))
}

#[derive(Deserialize)]
pub struct SearchMemoryQuery {
    #[serde(default)]
    pub q: String,
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    #[serde(default)]
    pub memory_type: Option<String>,
}

pub async fn search_memory_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(q): Query<SearchMemoryQuery>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    if !check_auth(&state, &headers) {
        return Err(unauthorized());
    }
    let results = state
        .memory
        .search_memory(
            &q.q,
            SearchOptions { top_k: q.top_k, memory_type: q.memory_type, ..Default::default() },
        )
        .map_err(|e| internal_error(e.to_string()))?;
    Ok(Json(json!({ "results": results })))
}

#[derive(Deserialize)]
pub struct CreateMemoryRequest {
    pub subject: String,
    pub content: String,
    #[serde(default)]
    pub memory_type: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

pub async fn create_memory_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(req): Json<CreateMemoryRequest>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    if !check_auth(&state, &headers) {
        return Err(unauthorized());
    }
    let memory = state
        .memory
        .store_memory(MemoryInput {
            subject: req.subject,
            content: req.content,
            memory_type: req.memory_type,
            tags: req.tags,
            expires_at: None,
        })
        .map_err(|e| internal_error(e.to_string()))?;
    Ok(Json(json!(memory)))
}

pub async fn delete_memory_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    if !check_auth(&state, &headers) {
        return Err(unauthorized());
    }
    state
        .memory
        .delete_memory(&id)
        .map_err(|e| internal_error(e.to_string()))?;
    Ok(Json(json!({ "deleted": true })))
}

fn unauthorized() -> (StatusCode, Json<Value>) {
    (StatusCode::UNAUTHORIZED, Json(json!({"error": "unauthorized"})))
}

fn internal_error(msg: String) -> (StatusCode, Json<Value>) {
    (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({"error": msg})))
}
