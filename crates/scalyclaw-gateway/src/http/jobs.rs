//! Job admin HTTP surface (spec.md §6 "jobs"): `GET /api/jobs`, `GET
//! /api/jobs/counts`, and per-job retry/fail/complete/delete.

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

use crate::app::AppState;
use crate::http::chat::check_auth;

/// Queues the admin surface knows how to inspect (spec.md §4.5's three
/// named queues plus `internal`).
const KNOWN_QUEUES: &[&str] = &["messages", "agents", "internal", "tools"];

#[derive(Deserialize)]
pub struct JobsQuery {
    #[serde(default)]
    pub queue: Option<String>,
}

fn queues_to_scan(q: &Option<String>) -> Vec<&str> {
    match q.as_deref() {
        Some(one) => vec![one.trim_end_matches('\0')],
        None => KNOWN_QUEUES.to_vec(),
    }
}

pub async fn list_jobs_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(q): Query<JobsQuery>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    if !check_auth(&state, &headers) {
        return Err(unauthorized());
    }
    let mut jobs = Vec::new();
    for queue in queues_to_scan(&q.queue) {
        jobs.extend(state.queue.list_jobs(queue).await.map_err(|e| internal_error(e.to_string()))?);
    }
    Ok(Json(json!({ "jobs": jobs })))
}

pub async fn job_counts_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(q): Query<JobsQuery>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    if !check_auth(&state, &headers) {
        return Err(unauthorized());
    }
    let mut counts = std::collections::HashMap::new();
    for queue in queues_to_scan(&q.queue) {
        let per_queue = state.queue.job_counts(queue).await.map_err(|e| internal_error(e.to_string()))?;
        for (state_name, n) in per_queue {
            *counts.entry(state_name).or_insert(0usize) += n;
        }
    }
    Ok(Json(json!({ "counts": counts })))
}

pub async fn get_job_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path((queue, id)): Path<(String, String)>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    if !check_auth(&state, &headers) {
        return Err(unauthorized());
    }
    match state.queue.get_job(&queue, &id).await.map_err(|e| internal_error(e.to_string()))? {
        Some(job) => Ok(Json(json!(job))),
        None => Err(not_found(&id)),
    }
}

pub async fn delete_job_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path((queue, id)): Path<(String, String)>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    if !check_auth(&state, &headers) {
        return Err(unauthorized());
    }
    state.queue.delete_job(&queue, &id).await.map_err(|e| internal_error(e.to_string()))?;
    Ok(Json(json!({ "deleted": true })))
}

pub async fn retry_job_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path((queue, id)): Path<(String, String)>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    if !check_auth(&state, &headers) {
        return Err(unauthorized());
    }
    state.queue.retry_job(&queue, &id).await.map_err(|e| internal_error(e.to_string()))?;
    Ok(Json(json!({ "retried": true })))
}

pub async fn complete_job_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path((queue, id)): Path<(String, String)>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    if !check_auth(&state, &headers) {
        return Err(unauthorized());
    }
    state.queue.complete_job_admin(&queue, &id).await.map_err(|e| internal_error(e.to_string()))?;
    Ok(Json(json!({ "completed": true })))
}

#[derive(Deserialize)]
pub struct FailJobRequest {
    #[serde(default = "default_reason")]
    pub reason: String,
}

fn default_reason() -> String {
    "failed via admin surface".to_string()
}

pub async fn fail_job_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path((queue, id)): Path<(String, String)>,
    body: Option<Json<FailJobRequest>>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    if !check_auth(&state, &headers) {
        return Err(unauthorized());
    }
    let reason = body.map(|Json(b)| b.reason).unwrap_or_else(default_reason);
    state
        .queue
        .fail_job_admin(&queue, &id, &reason)
        .await
        .map_err(|e| internal_error(e.to_string()))?;
    Ok(Json(json!({ "failed": true })))
}

fn unauthorized() -> (StatusCode, Json<Value>) {
    (StatusCode::UNAUTHORIZED, Json(json!({"error": "unauthorized"})))
}

fn not_found(id: &str) -> (StatusCode, Json<Value>) {
    (StatusCode::NOT_FOUND, Json(json!({"error": format!("job '{id}' not found")})))
}

fn internal_error(msg: String) -> (StatusCode, Json<Value>) {
    (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({"error": msg})))
}
