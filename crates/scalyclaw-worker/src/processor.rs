//! The worker's `Processor` for the `tools` queue (spec.md §4.11): runs
//! `execute_skill`, `execute_code`, and `execute_command` jobs enqueued by
//! the node's tool handlers, via `TerminalManager` one-shot exec.

use std::sync::Arc;

use async_trait::async_trait;
use scalyclaw_queue::{Processor, QueueJob};
use scalyclaw_terminal::{ExecOptions, manager::TerminalManager};
use tokio::sync::Mutex;
use tracing::info;

use crate::skills::{interpreter_for, load_bundle};

const DEFAULT_TIMEOUT_SECS: u64 = 60;

pub struct ToolsProcessor {
    terminal: Mutex<TerminalManager>,
    workspace_dir: String,
    skills_dir: String,
}

impl ToolsProcessor {
    pub fn new(workspace_dir: String, skills_dir: String) -> Self {
        Self {
            terminal: Mutex::new(TerminalManager::new()),
            workspace_dir,
            skills_dir,
        }
    }

    async fn exec_and_report(&self, command: &str, timeout_secs: u64) -> Result<serde_json::Value, String> {
        let opts = ExecOptions {
            timeout_secs,
            ..ExecOptions::default()
        };
        let result = self
            .terminal
            .lock()
            .await
            .exec(command, opts)
            .await
            .map_err(|e| e.to_string())?;
        if result.exit_code != 0 {
            return Err(format!(
                "exit code {}: {}",
                result.exit_code,
                if result.stderr.is_empty() { &result.stdout } else { &result.stderr }
            ));
        }
        Ok(serde_json::json!({
            "stdout": result.stdout,
            "stderr": result.stderr,
            "exit_code": result.exit_code,
        }))
    }

    async fn process_execute_command(&self, payload: &serde_json::Value) -> Result<serde_json::Value, String> {
        let command = payload
            .get("command")
            .and_then(|v| v.as_str())
            .ok_or_else(|| "missing 'command' field".to_string())?;
        let timeout = payload
            .get("timeout_secs")
            .and_then(|v| v.as_u64())
            .unwrap_or(DEFAULT_TIMEOUT_SECS);
        self.exec_and_report(command, timeout).await
    }

    async fn process_execute_code(&self, payload: &serde_json::Value) -> Result<serde_json::Value, String> {
        let code = payload
            .get("code")
            .and_then(|v| v.as_str())
            .ok_or_else(|| "missing 'code' field".to_string())?;
        let language = payload.get("language").and_then(|v| v.as_str()).unwrap_or("bash");
        let timeout = payload
            .get("timeout_secs")
            .and_then(|v| v.as_u64())
            .unwrap_or(DEFAULT_TIMEOUT_SECS);

        std::fs::create_dir_all(&self.workspace_dir).map_err(|e| e.to_string())?;
        let ext = match language {
            "python" | "python3" => "py",
            "node" | "javascript" | "js" => "js",
            "ruby" => "rb",
            _ => "sh",
        };
        let file_path = std::path::Path::new(&self.workspace_dir)
            .join(format!("job-{}.{ext}", uuid::Uuid::new_v4()));
        std::fs::write(&file_path, code).map_err(|e| e.to_string())?;

        let interpreter = interpreter_for(language);
        let command = format!("{interpreter} {}", file_path.display());
        let result = self.exec_and_report(&command, timeout).await;
        let _ = std::fs::remove_file(&file_path);
        result
    }

    async fn process_execute_skill(&self, payload: &serde_json::Value) -> Result<serde_json::Value, String> {
        let skill_id = payload
            .get("skill_id")
            .and_then(|v| v.as_str())
            .ok_or_else(|| "missing 'skill_id' field".to_string())?;
        let bundle = load_bundle(&self.skills_dir, skill_id).map_err(|e| e.to_string())?;

        if let Some(install) = &bundle.manifest.install {
            self.exec_and_report(install, DEFAULT_TIMEOUT_SECS).await?;
        }

        let Some(script) = &bundle.manifest.script else {
            return Err(format!("skill '{skill_id}' has no 'script' entry to execute"));
        };
        let script_path = bundle.dir.join(script);
        let interpreter = interpreter_for(&bundle.manifest.language);
        let args = payload
            .get("args")
            .map(|v| v.to_string())
            .unwrap_or_else(|| "{}".to_string());
        let command = format!(
            "cd {} && SKILL_ARGS={} {interpreter} {}",
            shell_quote(&bundle.dir.display().to_string()),
            shell_quote(&args),
            shell_quote(&script_path.display().to_string()),
        );
        self.exec_and_report(&command, DEFAULT_TIMEOUT_SECS).await
    }
}

fn shell_quote(s: &str) -> String {
    format!("'{}'", s.replace('\'', "'\\''"))
}

#[async_trait]
impl Processor for ToolsProcessor {
    async fn process(&self, job: &QueueJob) -> std::result::Result<serde_json::Value, String> {
        info!(job_id = %job.id, name = %job.name, "worker processing tools job");
        match job.name.as_str() {
            "execute_command" => self.process_execute_command(&job.payload).await,
            "execute_code" => self.process_execute_code(&job.payload).await,
            "execute_skill" => self.process_execute_skill(&job.payload).await,
            other => Err(format!("unsupported job name: {other}")),
        }
    }
}

pub fn build_processor(workspace_dir: String, skills_dir: String) -> Arc<ToolsProcessor> {
    Arc::new(ToolsProcessor::new(workspace_dir, skills_dir))
}
