//! Resolves the configured `ProvidersConfig` into the single `LlmProvider`
//! `AgentRuntime` drives (spec.md §4.7 "Model registry"). Picks the first
//! configured provider in a fixed priority order; the scheduler and module
//! table elsewhere allow per-call model overrides within that provider.

use scalyclaw_agent::provider::LlmProvider;
use scalyclaw_agent::{anthropic::AnthropicProvider, ollama::OllamaProvider, openai::OpenAiProvider};
use scalyclaw_core::config::ProvidersConfig;

/// Build the runtime's LLM provider from whichever provider block is
/// configured first: anthropic, then openai, then ollama. Falls back to
/// Anthropic reading `ANTHROPIC_API_KEY` from the environment so a bare
/// `scalyclaw.toml` still starts (requests then fail at call time if the
/// env var is unset, same as a misconfigured API key would).
pub fn build_provider(providers: &ProvidersConfig) -> Box<dyn LlmProvider> {
    if let Some(cfg) = &providers.anthropic {
        return Box::new(AnthropicProvider::new(cfg.api_key.clone(), Some(cfg.base_url.clone())));
    }
    if let Some(cfg) = &providers.openai {
        return Box::new(OpenAiProvider::new(cfg.api_key.clone(), Some(cfg.base_url.clone())));
    }
    if let Some(cfg) = &providers.ollama {
        return Box::new(OllamaProvider::new(Some(cfg.base_url.clone())));
    }
    Box::new(AnthropicProvider::new(
        std::env::var("ANTHROPIC_API_KEY").unwrap_or_default(),
        None,
    ))
}
