use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Remote collaborator services
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Base URLs of the sibling services the aicall core talks to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServicesConfig {
    #[serde(default = "d_call_manager")]
    pub call_manager_url: String,
    #[serde(default = "d_transcribe_manager")]
    pub transcribe_manager_url: String,
    #[serde(default = "d_tts_manager")]
    pub tts_manager_url: String,
    #[serde(default = "d_flow_manager")]
    pub flow_manager_url: String,
    #[serde(default = "d_message_manager")]
    pub message_manager_url: String,
    #[serde(default = "d_email_manager")]
    pub email_manager_url: String,
    /// Webhook sink. `None` logs events instead of posting them.
    #[serde(default)]
    pub webhook_url: Option<String>,
    #[serde(default = "d_10000")]
    pub timeout_ms: u64,
    /// Retries on transport errors and 5xx responses.
    #[serde(default = "d_2")]
    pub max_retries: u32,
}

impl Default for ServicesConfig {
    fn default() -> Self {
        Self {
            call_manager_url: d_call_manager(),
            transcribe_manager_url: d_transcribe_manager(),
            tts_manager_url: d_tts_manager(),
            flow_manager_url: d_flow_manager(),
            message_manager_url: d_message_manager(),
            email_manager_url: d_email_manager(),
            webhook_url: None,
            timeout_ms: d_10000(),
            max_retries: d_2(),
        }
    }
}

impl ServicesConfig {
    /// `(field, url)` pairs, for validation.
    pub fn urls(&self) -> [(&'static str, &str); 6] {
        [
            ("call_manager_url", &self.call_manager_url),
            ("transcribe_manager_url", &self.transcribe_manager_url),
            ("tts_manager_url", &self.tts_manager_url),
            ("flow_manager_url", &self.flow_manager_url),
            ("message_manager_url", &self.message_manager_url),
            ("email_manager_url", &self.email_manager_url),
        ]
    }
}

// ── serde default helpers ───────────────────────────────────────────

fn d_call_manager() -> String {
    "http://call-manager:8080".into()
}
fn d_transcribe_manager() -> String {
    "http://transcribe-manager:8080".into()
}
fn d_tts_manager() -> String {
    "http://tts-manager:8080".into()
}
fn d_flow_manager() -> String {
    "http://flow-manager:8080".into()
}
fn d_message_manager() -> String {
    "http://message-manager:8080".into()
}
fn d_email_manager() -> String {
    "http://email-manager:8080".into()
}
fn d_10000() -> u64 {
    10_000
}
fn d_2() -> u32 {
    2
}
