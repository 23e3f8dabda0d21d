use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

// Protocol constants — must match OpenClaw wire protocol exactly
pub const PROTOCOL_VERSION: u32 = 3;
pub const DEFAULT_PORT: u16 = 18789;
pub const DEFAULT_BIND: &str = "127.0.0.1";
pub const MAX_PAYLOAD_BYTES: usize = 128 * 1024; // 128 KB hard cap per frame
pub const MAX_BUFFERED_BYTES: usize = 1024 * 1024; // 1 MB: slow consumer threshold
pub const HANDSHAKE_TIMEOUT_MS: u64 = 10_000; // close if client doesn't auth in 10s
pub const HEARTBEAT_INTERVAL_SECS: u64 = 30; // tick event cadence

/// Top-level config (scalyclaw.toml + SCALYCLAW_* env overrides).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScalyClawConfig {
    pub gateway: GatewayConfig,
    pub agent: AgentConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub providers: ProvidersConfig,
    #[serde(default)]
    pub channels: ChannelsConfig,
    #[serde(default)]
    pub webhooks: WebhooksConfig,
    #[serde(default)]
    pub update: UpdateConfig,
    #[serde(default)]
    pub kv: KvConfig,
    #[serde(default)]
    pub orchestrator: OrchestratorConfig,
    #[serde(default)]
    pub queue: QueueConfig,
    #[serde(default)]
    pub guards: GuardsConfig,
    #[serde(default)]
    pub budget: BudgetConfig,
    #[serde(default)]
    pub proactive: ProactiveConfig,
    #[serde(default)]
    pub memory: MemoryConfig,
    #[serde(default)]
    pub worker: WorkerConfig,
}

/// Connection info for the key-value fabric (session/rate/queue/scheduler state).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KvConfig {
    #[serde(default = "default_redis_url")]
    pub url: String,
}

impl Default for KvConfig {
    fn default() -> Self {
        Self {
            url: default_redis_url(),
        }
    }
}

fn default_redis_url() -> String {
    "redis://127.0.0.1:6379".to_string()
}

/// Orchestrator tuning (spec.md §4.7).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u32,
    /// Model pool scoped to the orchestrator; falls back to the global
    /// enabled pool (see `ProvidersConfig`) when empty.
    #[serde(default)]
    pub models: Vec<WeightedModel>,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            max_iterations: default_max_iterations(),
            models: Vec::new(),
        }
    }
}

fn default_max_iterations() -> u32 {
    25
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeightedModel {
    pub model: String,
    #[serde(default = "default_priority")]
    pub priority: u32,
    #[serde(default = "default_weight")]
    pub weight: u32,
}

fn default_priority() -> u32 {
    0
}
fn default_weight() -> u32 {
    1
}

/// Per-queue concurrency and retry defaults (spec.md §4.5).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueConfig {
    #[serde(default = "default_concurrency")]
    pub messages_concurrency: u32,
    #[serde(default = "default_concurrency")]
    pub agents_concurrency: u32,
    #[serde(default = "default_concurrency")]
    pub internal_concurrency: u32,
    #[serde(default = "default_concurrency")]
    pub tools_concurrency: u32,
    #[serde(default = "default_attempts")]
    pub default_attempts: u32,
    #[serde(default = "default_backoff_ms")]
    pub default_backoff_ms: u64,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            messages_concurrency: default_concurrency(),
            agents_concurrency: default_concurrency(),
            internal_concurrency: default_concurrency(),
            tools_concurrency: default_concurrency(),
            default_attempts: default_attempts(),
            default_backoff_ms: default_backoff_ms(),
        }
    }
}

fn default_concurrency() -> u32 {
    4
}
fn default_attempts() -> u32 {
    3
}
fn default_backoff_ms() -> u64 {
    1_000
}

/// Guard pipeline tuning (spec.md §4.9).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GuardsConfig {
    #[serde(default = "default_echo_threshold")]
    pub echo_threshold: f64,
    #[serde(default)]
    pub command_denied: Vec<String>,
    #[serde(default)]
    pub command_allowed: Vec<String>,
}

impl Default for GuardsConfig {
    fn default() -> Self {
        Self {
            echo_threshold: default_echo_threshold(),
            command_denied: Vec::new(),
            command_allowed: Vec::new(),
        }
    }
}

fn default_echo_threshold() -> f64 {
    0.9
}

/// Optional spend caps (spec.md §4.15).
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct BudgetConfig {
    pub daily_limit_usd: Option<f64>,
    pub monthly_limit_usd: Option<f64>,
    #[serde(default)]
    pub hard_limit: bool,
    #[serde(default)]
    pub alert_thresholds_pct: Vec<u32>,
}

/// Idle-channel follow-up tuning (spec.md §4.16).
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ProactiveConfig {
    pub idle_threshold_minutes: Option<u32>,
    pub quiet_hours_start: Option<u8>,
    pub quiet_hours_end: Option<u8>,
    pub quiet_hours_tz: Option<String>,
    pub max_per_day: Option<u32>,
    pub cooldown_minutes: Option<u32>,
}

/// Memory engine tuning (spec.md §4.3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryConfig {
    #[serde(default = "default_embedding_dim")]
    pub embedding_dim: u32,
    #[serde(default = "default_vector_score_threshold")]
    pub vector_score_threshold: f64,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            embedding_dim: default_embedding_dim(),
            vector_score_threshold: default_vector_score_threshold(),
        }
    }
}

fn default_embedding_dim() -> u32 {
    256
}
fn default_vector_score_threshold() -> f64 {
    0.2
}

/// Update subsystem configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateConfig {
    /// Check for updates on server start (default: true).
    /// Override with env var: SCALYCLAW_UPDATE_CHECK_ON_START=false
    #[serde(default = "bool_true")]
    pub check_on_start: bool,
}

impl Default for UpdateConfig {
    fn default() -> Self {
        Self {
            check_on_start: true,
        }
    }
}

impl Default for ScalyClawConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig::default(),
            gateway: GatewayConfig {
                port: DEFAULT_PORT,
                bind: DEFAULT_BIND.to_string(),
                auth: AuthConfig {
                    mode: AuthMode::Token,
                    token: Some("change-me".to_string()),
                    password: None,
                },
            },
            agent: AgentConfig {
                model: "claude-sonnet-4-6".to_string(),
                soul_path: None,
            },
            providers: ProvidersConfig::default(),
            channels: ChannelsConfig::default(),
            webhooks: WebhooksConfig::default(),
            update: UpdateConfig::default(),
            kv: KvConfig::default(),
            orchestrator: OrchestratorConfig::default(),
            queue: QueueConfig::default(),
            guards: GuardsConfig::default(),
            budget: BudgetConfig::default(),
            proactive: ProactiveConfig::default(),
            memory: MemoryConfig::default(),
            worker: WorkerConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_bind")]
    pub bind: String,
    pub auth: AuthConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    pub mode: AuthMode,
    pub token: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum AuthMode {
    Token,
    Password,
    Tailscale,
    DeviceToken,
    TrustedProxy,
    None,
}

/// Stateless execution worker (spec.md §2 "Worker", §6 "Worker HTTP surface").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerConfig {
    #[serde(default = "default_worker_port")]
    pub port: u16,
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Bearer token required on every worker HTTP route except `/health`.
    pub auth_token: Option<String>,
    /// Root directory the worker may read/write for `execute_code`/`execute_skill` jobs.
    #[serde(default = "default_worker_workspace")]
    pub workspace_dir: String,
    /// Directory skill bundles are fetched from on demand.
    #[serde(default = "default_worker_skills_dir")]
    pub skills_dir: String,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            port: default_worker_port(),
            bind: default_bind(),
            auth_token: None,
            workspace_dir: default_worker_workspace(),
            skills_dir: default_worker_skills_dir(),
        }
    }
}

fn default_worker_port() -> u16 {
    18790
}
fn default_worker_workspace() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    format!("{}/.scalyclaw/workspace", home)
}
fn default_worker_skills_dir() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    format!("{}/.scalyclaw/skills", home)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    #[serde(default = "default_model")]
    pub model: String,
    pub soul_path: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ProvidersConfig {
    pub anthropic: Option<AnthropicConfig>,
    pub openai: Option<OpenAiProviderConfig>,
    pub ollama: Option<OllamaConfig>,
    pub copilot: Option<CopilotConfig>,
    pub qwen_oauth: Option<QwenOAuthConfig>,
    pub bedrock: Option<BedrockConfig>,
    pub vertex: Option<VertexConfig>,
    /// Additional OpenAI-compatible providers. Each entry can reference a
    /// well-known provider ID (e.g. "groq", "deepseek") or define a fully
    /// custom endpoint. Providers are tried in order after the primary slots.
    #[serde(default)]
    pub openai_compat: Vec<OpenAiCompatEntry>,
    /// Global enabled model pool (spec.md §4.7 "then from the global enabled
    /// pool"). Consulted when the orchestrator-scoped pool in
    /// `OrchestratorConfig::models` is empty or yields no pick.
    #[serde(default)]
    pub models: Vec<WeightedModel>,
}

/// A single OpenAI-compatible provider entry.
///
/// Well-known provider IDs are resolved automatically:
/// `groq`, `deepseek`, `openrouter`, `xai`, `mistral`, `perplexity`,
/// `together`, `fireworks`, `cerebras`, `sambanova`, `hyperbolic`,
/// `novita`, `lepton`, `corethink`, `featherless`, `requesty`, `glama`,
/// `chutes`, `cohere`, `moonshot`, `glm`, `doubao`, `qwen`, `zai`,
/// `yi`, `minimax`, `hunyuan`, `stepfun`, `lmstudio`, `llamacpp`,
/// `localai`, `litellm`.
///
/// For unknown IDs, `base_url` is required.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAiCompatEntry {
    /// Provider identifier — matches a known ID or a custom label.
    pub id: String,
    /// API key for this provider.
    pub api_key: String,
    /// Base URL (without trailing slash). Auto-filled from registry for known IDs.
    /// Required for custom/unknown providers.
    pub base_url: Option<String>,
    /// Override the chat completions path. Auto-filled from registry.
    /// Defaults to "/v1/chat/completions" when not in registry.
    pub chat_path: Option<String>,
    /// Override the model for requests routed to this provider.
    /// Falls back to `agent.model` when not set.
    pub model: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAiProviderConfig {
    pub api_key: String,
    #[serde(default = "default_openai_base_url")]
    pub base_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OllamaConfig {
    #[serde(default = "default_ollama_base_url")]
    pub base_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnthropicConfig {
    pub api_key: String,
    #[serde(default = "default_anthropic_base_url")]
    pub base_url: String,
}

/// GitHub Copilot provider — reads a long-lived GitHub access token from file.
/// The token is exchanged for short-lived Copilot API keys at runtime.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CopilotConfig {
    /// Path to file containing the GitHub access token (written by setup.sh).
    pub token_path: String,
}

/// Qwen OAuth provider — reads OAuth credentials (access + refresh token) from file.
/// Tokens are auto-refreshed at runtime when expired.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QwenOAuthConfig {
    /// Path to JSON credentials file (written by setup.sh).
    pub credentials_path: String,
}

/// AWS Bedrock provider — uses SigV4 authentication.
/// Credentials from AWS_ACCESS_KEY_ID/AWS_SECRET_ACCESS_KEY env vars
/// or ~/.aws/credentials file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BedrockConfig {
    /// AWS region (e.g. "us-east-1").
    pub region: String,
    /// Optional AWS credentials profile name (default: "default").
    pub profile: Option<String>,
}

/// Google Vertex AI provider — uses service account JWT authentication.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VertexConfig {
    /// Path to GCP service account JSON key file.
    pub key_file: String,
    /// GCP project ID. Auto-detected from key file if not set.
    pub project_id: Option<String>,
    /// GCP region (default: "us-central1").
    pub location: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ChannelsConfig {
    pub telegram: Option<TelegramConfig>,
    pub discord: Option<DiscordConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramConfig {
    pub bot_token: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscordConfig {
    pub bot_token: String,
    /// When true, guild messages are only processed when the bot is @mentioned.
    /// Defaults to false (respond to all messages in channels).
    #[serde(default)]
    pub require_mention: bool,
    /// When true, direct messages (DMs) are accepted.
    /// Defaults to true.
    #[serde(default = "bool_true")]
    pub dm_allowed: bool,
}

fn bool_true() -> bool {
    true
}

/// Authentication mode for an incoming webhook source.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum WebhookAuthMode {
    /// HMAC-SHA256 over the raw request body (GitHub-style X-Hub-Signature-256).
    HmacSha256,
    /// Static bearer token in the Authorization header.
    BearerToken,
    /// No authentication — use only for internal/trusted networks.
    None,
}

/// Configuration for a single webhook source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookSourceConfig {
    /// Identifier used in the route, e.g. "github" → POST /webhooks/github.
    pub name: String,
    /// HMAC signing secret or bearer token value.
    pub secret: Option<String>,
    /// How the incoming request should be authenticated.
    pub auth_mode: WebhookAuthMode,
}

/// Top-level webhooks subsystem configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct WebhooksConfig {
    /// When false the /webhooks/:source route returns 404.
    #[serde(default)]
    pub enabled: bool,
    /// List of allowed webhook sources and their auth settings.
    #[serde(default)]
    pub sources: Vec<WebhookSourceConfig>,
}

fn default_port() -> u16 {
    DEFAULT_PORT
}
fn default_bind() -> String {
    DEFAULT_BIND.to_string()
}
fn default_model() -> String {
    "claude-sonnet-4-6".to_string()
}
fn default_anthropic_base_url() -> String {
    "https://api.anthropic.com".to_string()
}
fn default_openai_base_url() -> String {
    "https://api.openai.com".to_string()
}
fn default_ollama_base_url() -> String {
    "http://localhost:11434".to_string()
}
fn default_db_path() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    format!("{}/.scalyclaw/scalyclaw.db", home)
}

impl ScalyClawConfig {
    /// Load config from a TOML file with SCALYCLAW_* env var overrides.
    ///
    /// Checks in order:
    ///   1. Explicit path argument
    ///   2. ~/.scalyclaw/scalyclaw.toml  (native)
    ///   3. ~/.openclaw/openclaw.json  (migration path — Phase 2)
    pub fn load(config_path: Option<&str>) -> crate::error::Result<Self> {
        let path = config_path
            .map(String::from)
            .unwrap_or_else(default_config_path);

        let config: ScalyClawConfig = Figment::new()
            .merge(Toml::file(&path))
            .merge(Env::prefixed("SCALYCLAW_").split("_"))
            .extract()
            .map_err(|e| crate::error::ScalyClawError::Config(e.to_string()))?;

        Ok(config)
    }
}

fn default_config_path() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    format!("{}/.scalyclaw/scalyclaw.toml", home)
}

const REDACTED: &str = "***";

/// Mask provider API keys and gateway auth values before a config document is
/// handed back over the HTTP management surface (spec.md §4.4, §8 property 5).
///
/// `updateConfig`/`PUT /api/config` callers never see real secret values in a
/// read-back, and a write that re-submits `"***"` for one of these fields must
/// be treated as "leave unchanged" by the caller (the config store, not this
/// pure function, is responsible for that merge).
pub fn redact_config(config: &ScalyClawConfig) -> ScalyClawConfig {
    let mut redacted = config.clone();

    if redacted.gateway.auth.token.is_some() {
        redacted.gateway.auth.token = Some(REDACTED.to_string());
    }
    if redacted.gateway.auth.password.is_some() {
        redacted.gateway.auth.password = Some(REDACTED.to_string());
    }
    if redacted.worker.auth_token.is_some() {
        redacted.worker.auth_token = Some(REDACTED.to_string());
    }

    if let Some(p) = redacted.providers.anthropic.as_mut() {
        p.api_key = REDACTED.to_string();
    }
    if let Some(p) = redacted.providers.openai.as_mut() {
        p.api_key = REDACTED.to_string();
    }
    for entry in redacted.providers.openai_compat.iter_mut() {
        entry.api_key = REDACTED.to_string();
    }

    for source in redacted.webhooks.sources.iter_mut() {
        if source.secret.is_some() {
            source.secret = Some(REDACTED.to_string());
        }
    }

    redacted
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn redact_masks_provider_keys_and_gateway_auth() {
        let mut config = ScalyClawConfig::default();
        config.providers.anthropic = Some(AnthropicConfig {
            api_key: "sk-ant-real-secret".to_string(),
            base_url: default_anthropic_base_url(),
        });

        let redacted = redact_config(&config);

        assert_eq!(redacted.gateway.auth.token.as_deref(), Some(REDACTED));
        assert_eq!(
            redacted.providers.anthropic.unwrap().api_key,
            REDACTED.to_string()
        );
        // Original is untouched.
        assert_eq!(config.providers.anthropic.unwrap().api_key, "sk-ant-real-secret");
    }

    #[test]
    fn redact_leaves_absent_fields_absent() {
        let config = ScalyClawConfig::default();
        let redacted = redact_config(&config);
        assert!(redacted.providers.openai.is_none());
    }
}
