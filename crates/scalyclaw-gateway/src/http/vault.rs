//! Vault HTTP surface (spec.md §6 "vault"): `GET /api/vault`, `GET
//! /api/vault/:name`, `POST /api/vault`, `DELETE /api/vault/:name`.
//!
//! Secret values are write-only over this surface past creation — `GET
//! /api/vault` lists names only, `GET /api/vault/:name` returns the
//! decrypted value (an authenticated caller is, by definition, trusted with
//! it — same trust boundary as the rest of `/api/*`).

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

pub async fn list_vault_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    if !check_auth(&state, &headers) {
        return Err(unauthorized());
    }
    let names = state.vault.list_names().await.map_err(|e| internal_error(e.to_string()))?;
    Ok(Json(json!({ "names": names })))
}

pub async fn get_vault_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(name): Path<String>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    if !check_auth(&state, &headers) {
        return Err(unauthorized());
    }
    let value = state
        .vault
        .get_secret(&name)
        .await
        .map_err(|e| not_found_or_internal(&name, e.to_string()))?;
    Ok(Json(json!({ "name": name, "value": value })))
}

#[derive(Deserialize)]
pub struct SetSecretRequest {
    pub name: String,
    pub value: String,
}

pub async fn set_vault_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(req): Json<SetSecretRequest>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    if !check_auth(&state, &headers) {
        return Err(unauthorized());
    }
    state
        .vault
        .set_secret(&req.name, &req.value)
        .await
        .map_err(|e| internal_error(e.to_string()))?;
    Ok(Json(json!({ "name": req.name, "set": true })))
}

pub async fn delete_vault_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(name): Path<String>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    if !check_auth(&state, &headers) {
        return Err(unauthorized());
    }
    state
        .vault
        .delete_secret(&name)
        .await
        .map_err(|e| internal_error(e.to_string()))?;
    Ok(Json(json!({ "deleted": true })))
}

fn unauthorized() -> (StatusCode, Json<Value>) {
    (StatusCode::UNAUTHORIZED, Json(json!({"error": "unauthorized"})))
}

fn not_found_or_internal(name: &str, msg: String) -> (StatusCode, Json<Value>) {
    if msg.to_lowercase().contains("not found") {
        (StatusCode::NOT_FOUND, Json(json!({"error": format!("secret '{name}' not found")})))
    } else {
        internal_error(msg)
    }
}

fn internal_error(msg: String) -> (StatusCode, Json<Value>) {
    (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({"error": msg})))
}
