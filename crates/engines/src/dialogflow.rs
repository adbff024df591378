//! Dialogflow engine adapter (CX and ES).
//!
//! Dialogflow is turn-based: each call sends only the latest message and the
//! agent keeps conversation state under a session path derived from the
//! aicall id. The request runs inside the exponential backoff envelope.

use std::time::Instant;

use ac_domain::aicall::Aicall;
use ac_domain::config::DialogflowConfig;
use ac_domain::engine::EngineTarget;
use ac_domain::error::{Error, Result};
use ac_domain::message::Message;
use ac_domain::trace::TraceEvent;
use serde::Deserialize;
use serde_json::Value;

use crate::backoff::{self, BackoffPolicy};
use crate::traits::{EngineAdapter, EngineReply};
use crate::util::{auth_header, from_reqwest, resolve_api_key};

const ENGINE: &str = "dialogflow";

/// Dialogflow API flavour, selected by the model half of the engine model
/// (`dialogflow.cx` / `dialogflow.es`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Edition {
    Cx,
    Es,
}

impl Edition {
    pub fn parse(model: &str) -> Result<Self> {
        match model {
            "cx" => Ok(Edition::Cx),
            "es" => Ok(Edition::Es),
            other => Err(Error::Validation(format!(
                "unknown dialogflow edition '{other}', expected 'cx' or 'es'"
            ))),
        }
    }
}

/// Per-aicall Dialogflow settings, read from the engine data blob.
#[derive(Debug, Clone, Deserialize)]
pub struct DialogflowSettings {
    pub project_id: String,
    #[serde(default = "d_region")]
    pub region: String,
    /// Required for CX.
    #[serde(default)]
    pub agent_id: Option<String>,
    /// Overrides the aicall language.
    #[serde(default)]
    pub language: Option<String>,
}

fn d_region() -> String {
    "global".into()
}

impl DialogflowSettings {
    pub fn from_engine_data(data: &serde_json::Map<String, Value>) -> Result<Self> {
        serde_json::from_value(Value::Object(data.clone()))
            .map_err(|e| Error::Validation(format!("invalid dialogflow engine data: {e}")))
    }

    fn is_global(&self) -> bool {
        self.region.is_empty() || self.region == "global"
    }

    /// Session resource name for `session_id`.
    pub fn session_path(&self, edition: Edition, session_id: &str) -> Result<String> {
        match edition {
            Edition::Cx => {
                let agent = self.agent_id.as_deref().filter(|a| !a.is_empty()).ok_or_else(|| {
                    Error::Validation("dialogflow cx requires 'agent_id' in engine data".into())
                })?;
                Ok(format!(
                    "projects/{}/locations/{}/agents/{}/sessions/{}",
                    self.project_id, self.region, agent, session_id
                ))
            }
            Edition::Es if self.is_global() => Ok(format!(
                "projects/{}/agent/sessions/{}",
                self.project_id, session_id
            )),
            Edition::Es => Ok(format!(
                "projects/{}/locations/{}/agent/sessions/{}",
                self.project_id, self.region, session_id
            )),
        }
    }

    fn default_host(&self) -> String {
        if self.is_global() {
            "https://dialogflow.googleapis.com".into()
        } else {
            format!("https://{}-dialogflow.googleapis.com", self.region)
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Adapter
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub struct DialogflowEngine {
    base_url: Option<String>,
    auth: Option<(String, String)>,
    backoff: BackoffPolicy,
    client: reqwest::Client,
}

impl DialogflowEngine {
    pub fn from_config(cfg: &DialogflowConfig) -> Result<Self> {
        let token = resolve_api_key(&cfg.auth)?;
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_millis(cfg.timeout_ms))
            .build()
            .map_err(from_reqwest)?;
        Ok(Self {
            base_url: cfg.base_url.as_ref().map(|u| u.trim_end_matches('/').to_string()),
            auth: auth_header(&cfg.auth, token.as_deref()),
            backoff: BackoffPolicy::from(&cfg.backoff),
            client,
        })
    }

    fn detect_intent_url(&self, settings: &DialogflowSettings, edition: Edition, session: &str) -> String {
        let host = self
            .base_url
            .clone()
            .unwrap_or_else(|| settings.default_host());
        let version = match edition {
            Edition::Cx => "v3",
            Edition::Es => "v2",
        };
        format!("{host}/{version}/{session}:detectIntent")
    }

    async fn detect_intent(&self, url: &str, body: &Value) -> Result<Value> {
        let mut req = self.client.post(url).json(body);
        if let Some((header, value)) = &self.auth {
            req = req.header(header.as_str(), value.as_str());
        }
        let resp = req.send().await.map_err(from_reqwest)?;
        let status = resp.status();
        let text = resp.text().await.map_err(from_reqwest)?;
        if !status.is_success() {
            return Err(Error::engine(
                ENGINE,
                format!("HTTP {} - {}", status.as_u16(), text),
            ));
        }
        Ok(serde_json::from_str(&text)?)
    }
}

fn request_body(edition: Edition, text: &str, language: &str) -> Value {
    match edition {
        Edition::Cx => serde_json::json!({
            "queryInput": {
                "text": { "text": text },
                "languageCode": language,
            }
        }),
        Edition::Es => serde_json::json!({
            "queryInput": {
                "text": { "text": text, "languageCode": language }
            }
        }),
    }
}

/// Pull the reply text out of a `detectIntent` response.
///
/// `fulfillmentText` first, then the first non-empty `fulfillmentMessages`
/// text, then the first non-empty CX `responseMessages` text. No text at all
/// is a legal empty reply.
pub fn extract_reply_text(resp: &Value) -> String {
    let Some(result) = resp.get("queryResult") else {
        return String::new();
    };

    if let Some(text) = result.get("fulfillmentText").and_then(|v| v.as_str()) {
        if !text.is_empty() {
            return text.to_string();
        }
    }

    ["fulfillmentMessages", "responseMessages"]
        .iter()
        .filter_map(|field| result.get(*field).and_then(|v| v.as_array()))
        .flatten()
        .filter_map(|msg| msg.get("text")?.get("text")?.as_array())
        .flatten()
        .filter_map(|t| t.as_str())
        .find(|t| !t.is_empty())
        .unwrap_or_default()
        .to_string()
}

#[async_trait::async_trait]
impl EngineAdapter for DialogflowEngine {
    fn target(&self) -> EngineTarget {
        EngineTarget::Dialogflow
    }

    async fn message_send(&self, aicall: &Aicall, history: &[Message]) -> Result<EngineReply> {
        let edition = Edition::parse(aicall.engine_model.model())?;
        let settings = DialogflowSettings::from_engine_data(&aicall.engine_data)?;
        let latest = history
            .last()
            .filter(|m| !m.content.is_empty())
            .ok_or_else(|| Error::Validation("no message to send to dialogflow".into()))?;

        let session = settings.session_path(edition, &aicall.id.to_string())?;
        let url = self.detect_intent_url(&settings, edition, &session);
        let language = settings.language.as_deref().unwrap_or(&aicall.language);
        let body = request_body(edition, &latest.content, language);

        tracing::debug!(aicall_id = %aicall.id, url = %url, "dialogflow detect intent");

        let started = Instant::now();
        let retried = backoff::retry(&self.backoff, ENGINE, || self.detect_intent(&url, &body)).await?;

        TraceEvent::EngineRequest {
            engine: ENGINE.into(),
            model: aicall.engine_model.model().to_string(),
            streaming: false,
            duration_ms: started.elapsed().as_millis() as u64,
            attempts: retried.attempts,
        }
        .emit();

        Ok(EngineReply {
            content: extract_reply_text(&retried.value),
            tool_calls: Vec::new(),
        })
    }
}
