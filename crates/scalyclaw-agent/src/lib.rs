//! `scalyclaw-agent` — LLM providers, the orchestrator loop, and the tool
//! system (spec.md §4.7, §4.8, §4.11, §4.12, §4.15).

pub mod anthropic;
pub mod anthropic_stream;
pub mod bedrock;
pub mod budget;
pub mod claude_cli;
pub mod copilot;
pub mod health;
pub mod model_pool;
pub mod ollama;
pub mod openai;
pub mod pipeline;
pub mod prompt;
pub mod provider;
pub mod qwen_oauth;
pub mod registry;
pub mod router;
pub mod runtime;
pub mod stream;
pub mod thinking;
pub mod tools;
pub mod vertex;

pub use provider::{ChatRequest, ChatResponse, LlmProvider, ProviderError};
pub use prompt::{PromptBuilder, SessionInfo, SystemPrompt};
pub use router::ProviderRouter;
pub use runtime::AgentRuntime;
