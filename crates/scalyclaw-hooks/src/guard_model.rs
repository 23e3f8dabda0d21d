use async_trait::async_trait;

/// Minimal LLM call surface the guard pipeline needs: a system prompt, a
/// user turn, and the raw text reply plus token counts for usage
/// accounting. Kept separate from the full provider/router stack so this
/// crate never depends on `scalyclaw-agent` — callers wire in whichever
/// model they've configured as the guard model.
#[async_trait]
pub trait GuardModel: Send + Sync {
    async fn complete(&self, system: &str, user: &str) -> Result<GuardCompletion, GuardModelError>;
}

pub struct GuardCompletion {
    pub text: String,
    pub input_tokens: u32,
    pub output_tokens: u32,
    pub model: String,
}

#[derive(Debug, thiserror::Error)]
#[error("guard model call failed: {0}")]
pub struct GuardModelError(pub String);

/// Records guard-model usage (spec.md §4.9 "All LLM guards record usage
/// with `type = guard`"). Implemented by whatever owns the memory engine —
/// kept as a trait here for the same reason as `GuardModel`.
#[async_trait]
pub trait GuardUsageSink: Send + Sync {
    async fn record(&self, model: &str, input_tokens: u32, output_tokens: u32);
}
