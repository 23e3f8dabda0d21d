//! Model registry HTTP surface (spec.md §6 "models"): `GET /api/models`,
//! `PATCH /api/models/:id`, `POST /api/models/test`.

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

use crate::app::AppState;
use crate::http::chat::check_auth;

/// GET /api/models — the weighted model pool configured for the orchestrator.
pub async fn list_models_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    if !check_auth(&state, &headers) {
        return Err(unauthorized());
    }
    let models = state.config.read().unwrap().providers.models.clone();
    Ok(Json(json!({ "models": models })))
}

#[derive(Deserialize)]
pub struct PatchModelRequest {
    #[serde(default)]
    pub priority: Option<u32>,
    #[serde(default)]
    pub weight: Option<u32>,
}

/// PATCH /api/models/:id — adjust a configured model's priority/weight.
pub async fn patch_model_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(req): Json<PatchModelRequest>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    if !check_auth(&state, &headers) {
        return Err(unauthorized());
    }
    let mut config = state.config.write().unwrap();
    let entry = config
        .providers
        .models
        .iter_mut()
        .find(|m| m.model == id)
        .ok_or_else(|| not_found(&id))?;
    if let Some(p) = req.priority {
        entry.priority = p;
    }
    if let Some(w) = req.weight {
        entry.weight = w;
    }
    Ok(Json(json!({ "model": entry })))
}

#[derive(Deserialize)]
pub struct TestModelRequest {
    pub model: String,
}

/// POST /api/models/test — one cheap round trip through the configured
/// provider to confirm a model ID is reachable.
pub async fn test_model_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(req): Json<TestModelRequest>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    if !check_auth(&state, &headers) {
        return Err(unauthorized());
    }
    match state.agent.chat_with_context("ping", None, None, Some(&req.model)).await {
        Ok(_) => Ok(Json(json!({ "ok": true, "model": req.model }))),
        Err(e) => Ok(Json(json!({ "ok": false, "model": req.model, "error": e.to_string() }))),
    }
}

fn unauthorized() -> (StatusCode, Json<Value>) {
    (StatusCode::UNAUTHORIZED, Json(json!({"error": "unauthorized"})))
}

fn not_found(id: &str) -> (StatusCode, Json<Value>) {
    (StatusCode::NOT_FOUND, Json(json!({"error": format!("model '{id}' not found")})))
}
