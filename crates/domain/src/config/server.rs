use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Server
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "d_8640")]
    pub port: u16,
    #[serde(default = "d_host")]
    pub host: String,
    #[serde(default)]
    pub cors: CorsConfig,
    /// Environment variable holding the API bearer token.
    /// If the env var is set and non-empty, every endpoint except `/health`
    /// requires `Authorization: Bearer <token>`.
    #[serde(default = "d_api_token_env")]
    pub api_token_env: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: d_8640(),
            host: d_host(),
            cors: CorsConfig::default(),
            api_token_env: d_api_token_env(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorsConfig {
    /// Origins allowed for CORS. `["*"]` is permissive.
    #[serde(default = "d_cors_origins")]
    pub allowed_origins: Vec<String>,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origins: d_cors_origins(),
        }
    }
}

// ── serde default helpers ───────────────────────────────────────────

fn d_8640() -> u16 {
    8640
}
fn d_host() -> String {
    "127.0.0.1".into()
}
fn d_cors_origins() -> Vec<String> {
    vec!["http://localhost:*".into(), "http://127.0.0.1:*".into()]
}
fn d_api_token_env() -> String {
    "AC_API_TOKEN".into()
}
