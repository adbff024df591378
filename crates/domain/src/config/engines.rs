use serde::{Deserialize, Serialize};

use crate::engine::EngineTarget;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Engines
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnginesConfig {
    /// Targets served by the OpenAI chat-completions protocol.
    #[serde(default = "d_openai_compat")]
    pub openai_compat: Vec<OpenAiCompatConfig>,
    /// Dialogflow adapter. `None` leaves the `dialogflow` target
    /// unregistered.
    #[serde(default)]
    pub dialogflow: Option<DialogflowConfig>,
}

impl Default for EnginesConfig {
    fn default() -> Self {
        Self {
            openai_compat: d_openai_compat(),
            dialogflow: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAiCompatConfig {
    pub target: EngineTarget,
    pub base_url: String,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default = "d_60000")]
    pub timeout_ms: u64,
    /// Sampling temperature sent with every request.
    #[serde(default)]
    pub temperature: Option<f32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DialogflowConfig {
    /// Override for the API host; the default is derived from the region
    /// (`https://{region}-dialogflow.googleapis.com`).
    #[serde(default)]
    pub base_url: Option<String>,
    /// Bearer token source (an OAuth access token).
    #[serde(default = "d_dialogflow_auth")]
    pub auth: AuthConfig,
    #[serde(default = "d_30000")]
    pub timeout_ms: u64,
    #[serde(default)]
    pub backoff: BackoffConfig,
}

impl Default for DialogflowConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            auth: d_dialogflow_auth(),
            timeout_ms: d_30000(),
            backoff: BackoffConfig::default(),
        }
    }
}

/// Exponential backoff envelope for synchronous engine calls.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackoffConfig {
    #[serde(default = "d_1000")]
    pub initial_interval_ms: u64,
    #[serde(default = "d_10000")]
    pub max_interval_ms: u64,
    #[serde(default = "d_60000")]
    pub max_elapsed_ms: u64,
    #[serde(default = "d_multiplier")]
    pub multiplier: f64,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            initial_interval_ms: d_1000(),
            max_interval_ms: d_10000(),
            max_elapsed_ms: d_60000(),
            multiplier: d_multiplier(),
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Auth
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AuthConfig {
    #[serde(default)]
    pub mode: AuthMode,
    /// Header name (e.g. "Authorization").
    #[serde(default)]
    pub header: Option<String>,
    /// Header value prefix (e.g. "Bearer ").
    #[serde(default)]
    pub prefix: Option<String>,
    /// Env var containing the key.
    #[serde(default)]
    pub env: Option<String>,
    /// Direct key (for config-only setups; prefer env or keychain).
    #[serde(default)]
    pub key: Option<String>,
    /// Keychain service name (e.g., "aicall").
    #[serde(default)]
    pub service: Option<String>,
    /// Keychain account name (e.g., "openai-api-key").
    #[serde(default)]
    pub account: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AuthMode {
    #[default]
    ApiKey,
    Keychain,
    None,
}

// ── serde default helpers ───────────────────────────────────────────

fn d_openai_compat() -> Vec<OpenAiCompatConfig> {
    vec![OpenAiCompatConfig {
        target: EngineTarget::Openai,
        base_url: "https://api.openai.com/v1".into(),
        auth: AuthConfig {
            env: Some("OPENAI_API_KEY".into()),
            ..Default::default()
        },
        timeout_ms: d_60000(),
        temperature: None,
    }]
}
fn d_dialogflow_auth() -> AuthConfig {
    AuthConfig {
        env: Some("DIALOGFLOW_ACCESS_TOKEN".into()),
        ..Default::default()
    }
}
fn d_1000() -> u64 {
    1_000
}
fn d_10000() -> u64 {
    10_000
}
fn d_30000() -> u64 {
    30_000
}
fn d_60000() -> u64 {
    60_000
}
fn d_multiplier() -> f64 {
    1.5
}
