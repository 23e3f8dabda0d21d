//! Config management HTTP surface (spec.md §6 "config"): `GET /api/config`
//! (redacted), `PUT /api/config` (rejects `gateway.authType`/`authValue`,
//! rejects unknown top-level keys, preserves `"***"` fields), `POST
//! /api/config/reload`.

use axum::{extract::State, http::StatusCode, Json};
use scalyclaw_core::config::redact_config;
use serde_json::{json, Value};
use std::sync::Arc;

use crate::app::AppState;
use crate::http::chat::check_auth;

const REDACTED: &str = "***";

/// Top-level keys a `PUT /api/config` body may contain. Anything else is
/// rejected outright (spec.md §6 "rejects unknown top-level keys").
const KNOWN_TOP_LEVEL_KEYS: &[&str] = &[
    "gateway", "agent", "database", "providers", "channels", "webhooks", "update", "kv",
    "orchestrator", "queue", "guards", "budget", "proactive", "memory", "worker",
];

pub async fn get_config_handler(
    State(state): State<Arc<AppState>>,
    headers: axum::http::HeaderMap,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    if !check_auth(&state, &headers) {
        return Err(unauthorized());
    }
    let redacted = redact_config(&state.config.read().unwrap());
    serde_json::to_value(&redacted)
        .map(Json)
        .map_err(|e| internal_error(e.to_string()))
}

/// `gateway.authType`/`gateway.authValue` are legacy field names from the
/// original config format; this surface only ever accepts the native
/// `gateway.auth.mode`/`gateway.auth.token` shape.
pub async fn put_config_handler(
    State(state): State<Arc<AppState>>,
    headers: axum::http::HeaderMap,
    Json(body): Json<Value>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    if !check_auth(&state, &headers) {
        return Err(unauthorized());
    }

    let Value::Object(fields) = &body else {
        return Err(bad_request("config body must be a JSON object"));
    };

    if let Some(gw) = fields.get("gateway").and_then(|v| v.as_object()) {
        if gw.contains_key("authType") || gw.contains_key("authValue") {
            return Err(bad_request(
                "gateway.authType/authValue are not accepted; use gateway.auth.mode/token",
            ));
        }
    }

    for key in fields.keys() {
        if !KNOWN_TOP_LEVEL_KEYS.contains(&key.as_str()) {
            return Err(bad_request(&format!("unknown top-level config key '{key}'")));
        }
    }

    let mut current = state.config.read().unwrap().clone();
    let mut current_json = serde_json::to_value(&current).map_err(|e| internal_error(e.to_string()))?;
    merge_preserving_redacted(&mut current_json, &body);

    current = serde_json::from_value(current_json).map_err(|e| bad_request(&e.to_string()))?;
    *state.config.write().unwrap() = current;

    let redacted = redact_config(&state.config.read().unwrap());
    serde_json::to_value(&redacted)
        .map(Json)
        .map_err(|e| internal_error(e.to_string()))
}

/// Recursively merges `patch` into `base`, skipping any leaf whose patch
/// value is the literal redaction marker `"***"` so a read-then-write round
/// trip never overwrites a real secret with the placeholder.
fn merge_preserving_redacted(base: &mut Value, patch: &Value) {
    match (base, patch) {
        (Value::Object(base_map), Value::Object(patch_map)) => {
            for (k, v) in patch_map {
                if v.as_str() == Some(REDACTED) {
                    continue;
                }
                merge_preserving_redacted(base_map.entry(k.clone()).or_insert(Value::Null), v);
            }
        }
        (base_slot, patch_value) => {
            *base_slot = patch_value.clone();
        }
    }
}

/// `POST /api/config/reload` — re-reads the config file from disk.
pub async fn reload_config_handler(
    State(state): State<Arc<AppState>>,
    headers: axum::http::HeaderMap,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    if !check_auth(&state, &headers) {
        return Err(unauthorized());
    }
    let config_path = std::env::var("SCALYCLAW_CONFIG").ok();
    let reloaded = scalyclaw_core::config::ScalyClawConfig::load(config_path.as_deref())
        .map_err(|e| internal_error(e.to_string()))?;
    *state.config.write().unwrap() = reloaded;
    let redacted = redact_config(&state.config.read().unwrap());
    Ok(Json(json!({ "reloaded": true, "config": redacted })))
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
