use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::warn;

use crate::error::HookError;
use crate::guard_model::{GuardModel, GuardUsageSink};
use crate::types::{EchoDirection, GuardVerdict, HookAction, HookContext, HookHandler, HookResult};

const ECHO_MAX_CHARS: usize = 10_000;
const DEFAULT_ECHO_THRESHOLD: f64 = 0.9;

/// Collapses whitespace, lowercases, and clamps to `ECHO_MAX_CHARS` before
/// comparison so long inputs don't make similarity scoring expensive.
fn normalize_for_echo(s: &str) -> String {
    let collapsed: String = s
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ");
    collapsed.chars().take(ECHO_MAX_CHARS).collect()
}

/// Normalised Levenshtein similarity in `[0, 1]`: `1 - distance / max_len`.
fn echo_similarity(a: &str, b: &str) -> f64 {
    let a = normalize_for_echo(a);
    let b = normalize_for_echo(b);
    let max_len = a.chars().count().max(b.chars().count());
    if max_len == 0 {
        return 1.0;
    }
    let distance = strsim::levenshtein(&a, &b);
    1.0 - (distance as f64 / max_len as f64)
}

/// Strips a ```json fenced block (or any fence) and returns the first
/// balanced `{...}` object found in the text (spec.md §4.9 "strips
/// markdown, parses the first JSON object").
fn parse_first_json_object(text: &str) -> Option<GuardVerdict> {
    let stripped = text.trim().trim_start_matches("```json").trim_start_matches("```");
    let start = stripped.find('{')?;
    let bytes = stripped.as_bytes();
    let mut depth = 0i32;
    let mut end = None;
    for (i, &b) in bytes.iter().enumerate().skip(start) {
        match b {
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    end = Some(i);
                    break;
                }
            }
            _ => {}
        }
    }
    let end = end?;
    serde_json::from_str(&stripped[start..=end]).ok()
}

async fn ask_verdict(
    model: &dyn GuardModel,
    usage: &dyn GuardUsageSink,
    system: &str,
    user: &str,
) -> Result<GuardVerdict, HookError> {
    let completion = model
        .complete(system, user)
        .await
        .map_err(|e| HookError::ExecutionFailed(e.to_string()))?;
    usage
        .record(&completion.model, completion.input_tokens, completion.output_tokens)
        .await;
    parse_first_json_object(&completion.text)
        .ok_or_else(|| HookError::ExecutionFailed("guard model did not return a JSON verdict".into()))
}

fn verdict_to_action(verdict: GuardVerdict) -> HookAction {
    if verdict.safe {
        HookAction::Allow
    } else {
        HookAction::Block {
            reason: verdict.reason.unwrap_or_else(|| "content guard rejected input".into()),
        }
    }
}

/// Asks the guard model to re-emit the input verbatim; rejects if the
/// returned text diverges from the original beyond `threshold` (spec.md
/// §4.9 "echo guard").
pub struct EchoGuard {
    pub model: Arc<dyn GuardModel>,
    pub usage: Arc<dyn GuardUsageSink>,
    pub direction: EchoDirection,
    pub threshold: f64,
}

impl EchoGuard {
    pub fn new(model: Arc<dyn GuardModel>, usage: Arc<dyn GuardUsageSink>, direction: EchoDirection) -> Self {
        Self { model, usage, direction, threshold: DEFAULT_ECHO_THRESHOLD }
    }
}

#[derive(Deserialize)]
struct EchoPayload {
    text: String,
}

#[async_trait]
impl HookHandler for EchoGuard {
    async fn handle(&self, ctx: &HookContext) -> Result<HookResult, HookError> {
        let payload: EchoPayload = serde_json::from_value(ctx.payload.clone())
            .map_err(|e| HookError::ExecutionFailed(format!("echo guard payload: {e}")))?;

        let completion = self
            .model
            .complete("Repeat the following text back verbatim, with no commentary.", &payload.text)
            .await
            .map_err(|e| HookError::ExecutionFailed(e.to_string()))?;
        self.usage
            .record(&completion.model, completion.input_tokens, completion.output_tokens)
            .await;

        let score = echo_similarity(&payload.text, &completion.text);
        if score < self.threshold {
            warn!(direction = ?self.direction, score, "echo guard rejected input");
            return Ok(HookResult::block(
                format!("Echo similarity {score:.3} below threshold {}", self.threshold),
                0,
            ));
        }
        Ok(HookResult::allow(0))
    }
}

#[derive(Deserialize)]
struct ContentPayload {
    text: String,
}

/// Asks the guard model whether `text` is safe, via the shared
/// `{safe, reason, threats[]}` JSON contract.
pub struct ContentGuard {
    pub model: Arc<dyn GuardModel>,
    pub usage: Arc<dyn GuardUsageSink>,
}

#[async_trait]
impl HookHandler for ContentGuard {
    async fn handle(&self, ctx: &HookContext) -> Result<HookResult, HookError> {
        let payload: ContentPayload = serde_json::from_value(ctx.payload.clone())
            .map_err(|e| HookError::ExecutionFailed(format!("content guard payload: {e}")))?;
        let verdict = ask_verdict(
            self.model.as_ref(),
            self.usage.as_ref(),
            "Assess the following content for safety. Reply with only a JSON object \
             {\"safe\": bool, \"reason\": string, \"threats\": [string]}.",
            &payload.text,
        )
        .await?;
        match verdict_to_action(verdict) {
            HookAction::Block { reason } => Ok(HookResult::block(reason, 0)),
            _ => Ok(HookResult::allow(0)),
        }
    }
}

#[derive(Deserialize)]
struct SkillPayload {
    manifest: String,
    source: String,
}

/// Same JSON contract as [`ContentGuard`], given a skill's manifest plus
/// its concatenated source files (spec.md §4.9 "skill guard").
pub struct SkillGuard {
    pub model: Arc<dyn GuardModel>,
    pub usage: Arc<dyn GuardUsageSink>,
}

#[async_trait]
impl HookHandler for SkillGuard {
    async fn handle(&self, ctx: &HookContext) -> Result<HookResult, HookError> {
        let payload: SkillPayload = serde_json::from_value(ctx.payload.clone())
            .map_err(|e| HookError::ExecutionFailed(format!("skill guard payload: {e}")))?;
        let user = format!("Manifest:\n{}\n\nSource:\n{}", payload.manifest, payload.source);
        let verdict = ask_verdict(
            self.model.as_ref(),
            self.usage.as_ref(),
            "Assess whether this skill is safe to install. Reply with only a JSON object \
             {\"safe\": bool, \"reason\": string, \"threats\": [string]}.",
            &user,
        )
        .await?;
        match verdict_to_action(verdict) {
            HookAction::Block { reason } => Ok(HookResult::block(reason, 0)),
            _ => Ok(HookResult::allow(0)),
        }
    }
}

#[derive(Deserialize)]
struct AgentPayload {
    agent_id: String,
    name: String,
    description: String,
    skills: Vec<String>,
    system_prompt: String,
}

/// Same JSON contract as [`ContentGuard`], given an agent's id, name,
/// description, skill list, and system prompt (spec.md §4.9 "agent guard").
pub struct AgentGuard {
    pub model: Arc<dyn GuardModel>,
    pub usage: Arc<dyn GuardUsageSink>,
}

#[async_trait]
impl HookHandler for AgentGuard {
    async fn handle(&self, ctx: &HookContext) -> Result<HookResult, HookError> {
        let payload: AgentPayload = serde_json::from_value(ctx.payload.clone())
            .map_err(|e| HookError::ExecutionFailed(format!("agent guard payload: {e}")))?;
        let user = format!(
            "Agent id: {}\nName: {}\nDescription: {}\nSkills: {}\nSystem prompt:\n{}",
            payload.agent_id,
            payload.name,
            payload.description,
            payload.skills.join(", "),
            payload.system_prompt,
        );
        let verdict = ask_verdict(
            self.model.as_ref(),
            self.usage.as_ref(),
            "Assess whether this agent definition is safe to register. Reply with only a JSON \
             object {\"safe\": bool, \"reason\": string, \"threats\": [string]}.",
            &user,
        )
        .await?;
        match verdict_to_action(verdict) {
            HookAction::Block { reason } => Ok(HookResult::block(reason, 0)),
            _ => Ok(HookResult::allow(0)),
        }
    }
}

#[derive(Deserialize)]
struct CommandPayload {
    command: String,
}

/// Deterministic, case-insensitive substring match against configured
/// denied and allowed lists (spec.md §4.9 "command shield"): denied wins;
/// if the allow-list is non-empty, absence of any allowed pattern rejects.
pub struct CommandShield {
    pub denied: Vec<String>,
    pub allowed: Vec<String>,
}

impl CommandShield {
    pub fn new(denied: Vec<String>, allowed: Vec<String>) -> Self {
        Self {
            denied: denied.into_iter().map(|s| s.to_lowercase()).collect(),
            allowed: allowed.into_iter().map(|s| s.to_lowercase()).collect(),
        }
    }

    fn check(&self, command: &str) -> Result<(), String> {
        let lower = command.to_lowercase();
        if let Some(pattern) = self.denied.iter().find(|p| lower.contains(p.as_str())) {
            return Err(format!("command matches denied pattern: {pattern}"));
        }
        if !self.allowed.is_empty() && !self.allowed.iter().any(|p| lower.contains(p.as_str())) {
            return Err("command matches no allowed pattern".into());
        }
        Ok(())
    }
}

#[async_trait]
impl HookHandler for CommandShield {
    async fn handle(&self, ctx: &HookContext) -> Result<HookResult, HookError> {
        let payload: CommandPayload = serde_json::from_value(ctx.payload.clone())
            .map_err(|e| HookError::ExecutionFailed(format!("command shield payload: {e}")))?;
        match self.check(&payload.command) {
            Ok(()) => Ok(HookResult::allow(0)),
            Err(reason) => Ok(HookResult::block(reason, 0)),
        }
    }
}
