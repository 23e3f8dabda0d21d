//! Scheduler HTTP surface (spec.md §6 "scheduler"): list, create
//! reminders/tasks (one-shot and recurrent), and lifecycle transitions.

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

use scalyclaw_scheduler::Recurrence;

use crate::app::AppState;
use crate::http::chat::check_auth;

pub async fn list_scheduled_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    if !check_auth(&state, &headers) {
        return Err(unauthorized());
    }
    let jobs = state.scheduler.list_all_scheduled_jobs().await.map_err(|e| internal_error(e.to_string()))?;
    Ok(Json(json!({ "scheduled": jobs })))
}

#[derive(Deserialize)]
pub struct OneShotRequest {
    pub channel_id: String,
    pub text: String,
    pub delay_ms: u64,
}

pub async fn create_reminder_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(req): Json<OneShotRequest>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    if !check_auth(&state, &headers) {
        return Err(unauthorized());
    }
    let job = state
        .scheduler
        .create_reminder(&req.channel_id, &req.text, req.delay_ms)
        .await
        .map_err(|e| internal_error(e.to_string()))?;
    Ok(Json(json!(job)))
}

pub async fn create_task_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(req): Json<OneShotRequest>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    if !check_auth(&state, &headers) {
        return Err(unauthorized());
    }
    let job = state
        .scheduler
        .create_task(&req.channel_id, &req.text, req.delay_ms)
        .await
        .map_err(|e| internal_error(e.to_string()))?;
    Ok(Json(json!(job)))
}

#[derive(Deserialize)]
pub struct RecurrentRequest {
    pub channel_id: String,
    pub text: String,
    pub recurrence: Recurrence,
}

pub async fn create_recurrent_reminder_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(req): Json<RecurrentRequest>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    if !check_auth(&state, &headers) {
        return Err(unauthorized());
    }
    let job = state
        .scheduler
        .create_recurrent_reminder(&req.channel_id, &req.text, req.recurrence)
        .await
        .map_err(|e| internal_error(e.to_string()))?;
    Ok(Json(json!(job)))
}

pub async fn create_recurrent_task_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(req): Json<RecurrentRequest>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    if !check_auth(&state, &headers) {
        return Err(unauthorized());
    }
    let job = state
        .scheduler
        .create_recurrent_task(&req.channel_id, &req.text, req.recurrence)
        .await
        .map_err(|e| internal_error(e.to_string()))?;
    Ok(Json(json!(job)))
}

/// Soft-cancel: keeps the terminal-retention hash around so admin surfaces
/// can still show it happened.
pub async fn delete_scheduled_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    if !check_auth(&state, &headers) {
        return Err(unauthorized());
    }
    state.scheduler.cancel_scheduled_job_admin(&id).await.map_err(|e| internal_error(e.to_string()))?;
    Ok(Json(json!({ "cancelled": true })))
}

pub async fn complete_scheduled_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    if !check_auth(&state, &headers) {
        return Err(unauthorized());
    }
    state.scheduler.complete_scheduled_job_admin(&id).await.map_err(|e| internal_error(e.to_string()))?;
    Ok(Json(json!({ "completed": true })))
}

/// Hard delete: removes the hash and index entry entirely.
pub async fn purge_scheduled_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    if !check_auth(&state, &headers) {
        return Err(unauthorized());
    }
    state.scheduler.delete_scheduled_job(&id).await.map_err(|e| internal_error(e.to_string()))?;
    Ok(Json(json!({ "purged": true })))
}

fn unauthorized() -> (StatusCode, Json<Value>) {
    (StatusCode::UNAUTHORIZED, Json(json!({"error": "unauthorized"})))
}

fn internal_error(msg: String) -> (StatusCode, Json<Value>) {
    (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({"error": msg})))
}
