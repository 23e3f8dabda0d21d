//! Skill bundle HTTP surface (spec.md §3 "Skill", §6 "skills"): an on-disk
//! bundle rooted at the user skills directory, identified by an id ending
//! in `-skill`. Manifest frontmatter `{name, description, script, language,
//! install}`; registered state `{id, enabled}` lives alongside it in the KV
//! store (same pattern as `agents.rs`).

use axum::{
    extract::{Multipart, Path, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;

use scalyclaw_queue::EnqueueOptions;
use scalyclaw_terminal::{manager::TerminalManager, ExecOptions};

use crate::app::AppState;
use crate::http::chat::check_auth;

fn skills_dir() -> std::path::PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    std::path::PathBuf::from(home).join(".scalyclaw/skills")
}

fn registered_key(id: &str) -> String {
    format!("scalyclaw:skill-registered:{id}")
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct SkillFrontmatter {
    name: String,
    description: String,
    #[serde(default)]
    script: Option<String>,
    #[serde(default = "default_language")]
    language: String,
    #[serde(default)]
    install: Option<String>,
}

fn default_language() -> String {
    "bash".to_string()
}

fn read_manifest(dir: &std::path::Path) -> Option<SkillFrontmatter> {
    let raw = std::fs::read_to_string(dir.join("SKILL.md")).ok()?;
    let trimmed = raw.trim_start();
    let after_first = trimmed.strip_prefix("---")?;
    let closing_idx = after_first.find("\n---")?;
    serde_yaml::from_str(&after_first[..closing_idx]).ok()
}

#[derive(Serialize)]
struct SkillSummary {
    id: String,
    name: String,
    description: String,
    enabled: bool,
}

pub async fn list_skills_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    if !check_auth(&state, &headers) {
        return Err(unauthorized());
    }
    let dir = skills_dir();
    let mut out = Vec::new();
    if let Ok(entries) = std::fs::read_dir(&dir) {
        for entry in entries.flatten() {
            let path = entry.path();
            if !path.is_dir() {
                continue;
            }
            let id = entry.file_name().to_string_lossy().to_string();
            if let Some(meta) = read_manifest(&path) {
                let enabled = is_enabled(&state, &id).await.map_err(|e| internal_error(e.to_string()))?;
                out.push(SkillSummary { id, name: meta.name, description: meta.description, enabled });
            }
        }
    }
    Ok(Json(json!({ "skills": out })))
}

/// POST /api/skills/upload — multipart: `id` field + `bundle` zip field, or
/// a bare `SKILL.md` file field for a single-file skill.
pub async fn upload_skill_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    if !check_auth(&state, &headers) {
        return Err(unauthorized());
    }

    let mut id: Option<String> = None;
    let mut skill_md: Option<Vec<u8>> = None;

    while let Ok(Some(field)) = multipart.next_field().await {
        match field.name().unwrap_or_default() {
            "id" => {
                id = Some(field.text().await.map_err(|e| bad_request(&e.to_string()))?);
            }
            "skill" | "manifest" => {
                skill_md = Some(field.bytes().await.map_err(|e| bad_request(&e.to_string()))?.to_vec());
            }
            _ => {}
        }
    }

    let skill_md = skill_md.ok_or_else(|| bad_request("missing 'skill' field (SKILL.md contents)"))?;
    let content = String::from_utf8(skill_md).map_err(|e| bad_request(&e.to_string()))?;
    let meta = {
        let trimmed = content.trim_start();
        let after_first = trimmed.strip_prefix("---").ok_or_else(|| bad_request("missing frontmatter"))?;
        let closing_idx = after_first.find("\n---").ok_or_else(|| bad_request("unterminated frontmatter"))?;
        serde_yaml::from_str::<SkillFrontmatter>(&after_first[..closing_idx])
            .map_err(|e| bad_request(&format!("invalid frontmatter: {e}")))?
    };

    let id = id.unwrap_or_else(|| format!("{}-skill", uuid::Uuid::new_v4()));
    if !id.ends_with("-skill") {
        return Err(bad_request("skill id must end in '-skill'"));
    }

    let dir = skills_dir().join(&id);
    std::fs::create_dir_all(&dir).map_err(|e| internal_error(e.to_string()))?;
    std::fs::write(dir.join("SKILL.md"), &content).map_err(|e| internal_error(e.to_string()))?;

    set_enabled(&state, &id, true).await.map_err(|e| internal_error(e.to_string()))?;
    Ok(Json(json!({ "id": id, "name": meta.name })))
}

#[derive(Deserialize)]
pub struct PatchSkillRequest {
    pub enabled: bool,
}

pub async fn patch_skill_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(req): Json<PatchSkillRequest>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    if !check_auth(&state, &headers) {
        return Err(unauthorized());
    }
    if !skills_dir().join(&id).is_dir() {
        return Err(not_found(&id));
    }
    set_enabled(&state, &id, req.enabled).await.map_err(|e| internal_error(e.to_string()))?;
    Ok(Json(json!({ "id": id, "enabled": req.enabled })))
}

pub async fn delete_skill_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    if !check_auth(&state, &headers) {
        return Err(unauthorized());
    }
    let dir = skills_dir().join(&id);
    if !dir.is_dir() {
        return Err(not_found(&id));
    }
    std::fs::remove_dir_all(&dir).map_err(|e| internal_error(e.to_string()))?;
    state
        .sessions
        .kv()
        .del(&registered_key(&id))
        .await
        .map_err(|e| internal_error(e.to_string()))?;
    Ok(Json(json!({ "deleted": true })))
}

#[derive(Deserialize)]
pub struct InvokeSkillRequest {
    #[serde(default)]
    pub args: Value,
}

/// POST /api/skills/:id/invoke — enqueues an `execute_skill` job on the
/// `tools` queue (processed by the worker's `ToolsProcessor`) and awaits it.
pub async fn invoke_skill_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(req): Json<InvokeSkillRequest>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    if !check_auth(&state, &headers) {
        return Err(unauthorized());
    }
    if !is_enabled(&state, &id).await.map_err(|e| internal_error(e.to_string()))? {
        return Err(bad_request("skill is disabled"));
    }
    let job_id = state
        .queue
        .enqueue(
            "tools",
            "execute_skill",
            json!({ "skill_id": id, "args": req.args }),
            EnqueueOptions::default(),
        )
        .await
        .map_err(|e| internal_error(e.to_string()))?;
    let result = state
        .queue
        .wait_until_finished("tools", &job_id, 60_000)
        .await
        .map_err(|e| internal_error(e.to_string()))?;
    Ok(Json(result))
}

pub async fn get_readme_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    if !check_auth(&state, &headers) {
        return Err(unauthorized());
    }
    let path = skills_dir().join(&id).join("README.md");
    let content = std::fs::read_to_string(&path).unwrap_or_default();
    Ok(Json(json!({ "readme": content })))
}

#[derive(Deserialize)]
pub struct PutReadmeRequest {
    pub readme: String,
}

pub async fn put_readme_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(req): Json<PutReadmeRequest>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    if !check_auth(&state, &headers) {
        return Err(unauthorized());
    }
    let dir = skills_dir().join(&id);
    if !dir.is_dir() {
        return Err(not_found(&id));
    }
    std::fs::write(dir.join("README.md"), &req.readme).map_err(|e| internal_error(e.to_string()))?;
    Ok(Json(json!({ "saved": true })))
}

/// GET /api/skills/:id/zip — streams the bundle directory as a zip archive,
/// built via the system `zip` binary through `TerminalManager` (spec.md §4.11
/// "one-shot command execution" — reused here instead of a dedicated archive
/// crate, the same way `execute_command` shells out today).
pub async fn zip_skill_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, (StatusCode, Json<Value>)> {
    if !check_auth(&state, &headers) {
        return Err(unauthorized());
    }
    let dir = skills_dir().join(&id);
    if !dir.is_dir() {
        return Err(not_found(&id));
    }
    let out_path = std::env::temp_dir().join(format!("{id}-{}.zip", uuid::Uuid::new_v4()));
    let command = format!(
        "cd {} && zip -r -q {} .",
        shell_quote(&dir.display().to_string()),
        shell_quote(&out_path.display().to_string()),
    );
    let terminal = TerminalManager::new();
    let result = terminal
        .exec(&command, ExecOptions::default())
        .await
        .map_err(|e| internal_error(e.to_string()))?;
    if result.exit_code != 0 {
        return Err(internal_error(result.stderr));
    }
    let bytes = std::fs::read(&out_path).map_err(|e| internal_error(e.to_string()))?;
    let _ = std::fs::remove_file(&out_path);
    Ok((
        [(axum::http::header::CONTENT_TYPE, "application/zip")],
        bytes,
    ))
}

fn shell_quote(s: &str) -> String {
    format!("'{}'", s.replace('\'', "'\\''"))
}

async fn is_enabled(state: &AppState, id: &str) -> scalyclaw_kv::error::Result<bool> {
    Ok(state
        .sessions
        .kv()
        .get(&registered_key(id))
        .await?
        .map(|v| v == "1")
        .unwrap_or(true))
}

async fn set_enabled(state: &AppState, id: &str, enabled: bool) -> scalyclaw_kv::error::Result<()> {
    state
        .sessions
        .kv()
        .set(&registered_key(id), if enabled { "1" } else { "0" })
        .await
}

fn unauthorized() -> (StatusCode, Json<Value>) {
    (StatusCode::UNAUTHORIZED, Json(json!({"error": "unauthorized"})))
}

fn not_found(id: &str) -> (StatusCode, Json<Value>) {
    (StatusCode::NOT_FOUND, Json(json!({"error": format!("skill '{id}' not found")})))
}

fn bad_request(msg: &str) -> (StatusCode, Json<Value>) {
    (StatusCode::BAD_REQUEST, Json(json!({"error": msg})))
}

fn internal_error(msg: String) -> (StatusCode, Json<Value>) {
    (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({"error": msg})))
}
