//! HTTP implementation of every collaborator trait.
//!
//! `RemoteServices` wraps one `reqwest::Client` and translates each trait
//! method into a JSON call against the owning sibling service, with retry
//! and exponential back-off on transient (5xx / transport) failures.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use ac_domain::action::{Address, FlowAction};
use ac_domain::aicall::Gender;
use ac_domain::config::ServicesConfig;
use ac_domain::error::{Error, Result};
use ac_domain::event::WebhookEvent;
use ac_engines::util::from_reqwest;
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use crate::services::{
    CallControl, ConfbridgeRequest, EmailSender, Messaging, Notifier, TranscribeRequest, Transcriber,
    TtsRequest, TtsSession, TtsStreaming, Workflow,
};

#[derive(Deserialize)]
struct IdResponse {
    id: Uuid,
}

#[derive(Deserialize)]
struct VariablesResponse {
    #[serde(default)]
    variables: HashMap<String, String>,
}

#[derive(Deserialize)]
struct TextResponse {
    text: String,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Client
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone)]
pub struct RemoteServices {
    http: Client,
    config: ServicesConfig,
}

impl RemoteServices {
    pub fn new(config: &ServicesConfig) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(from_reqwest)?;
        Ok(Self {
            http,
            config: config.clone(),
        })
    }

    fn url(base: &str, path: &str) -> String {
        format!("{}{}", base.trim_end_matches('/'), path)
    }

    // ── retry engine ─────────────────────────────────────────────────

    /// Execute a request, retrying 5xx responses and transport errors.
    /// 4xx responses are permanent.
    async fn execute(
        &self,
        service: &'static str,
        endpoint: &str,
        build_request: impl Fn() -> RequestBuilder,
    ) -> Result<Response> {
        let mut last_err: Option<Error> = None;

        for attempt in 0..=self.config.max_retries {
            if attempt > 0 {
                let backoff = Duration::from_millis(100 * 2u64.pow(attempt - 1));
                tokio::time::sleep(backoff).await;
            }

            let start = Instant::now();
            let result = build_request()
                .header("X-Request-Id", Uuid::new_v4().to_string())
                .send()
                .await;
            let duration_ms = start.elapsed().as_millis() as u64;

            match result {
                Ok(resp) => {
                    let status = resp.status();
                    tracing::debug!(service, endpoint, status = status.as_u16(), duration_ms, "service call");

                    if status.is_server_error() {
                        let body = resp.text().await.unwrap_or_default();
                        last_err = Some(Error::service(
                            service,
                            format!("{endpoint} returned {}: {body}", status.as_u16()),
                        ));
                        continue;
                    }
                    if status.is_client_error() {
                        let body = resp.text().await.unwrap_or_default();
                        return Err(Error::service(
                            service,
                            format!("{endpoint} returned {}: {body}", status.as_u16()),
                        ));
                    }
                    return Ok(resp);
                }
                Err(e) => {
                    tracing::debug!(service, endpoint, duration_ms, error = %e, "service call failed");
                    last_err = Some(from_reqwest(e));
                }
            }
        }

        Err(last_err
            .unwrap_or_else(|| Error::service(service, format!("{endpoint}: all retries exhausted"))))
    }

    async fn call_json<T: DeserializeOwned>(
        &self,
        service: &'static str,
        endpoint: &str,
        build_request: impl Fn() -> RequestBuilder,
    ) -> Result<T> {
        let resp = self.execute(service, endpoint, build_request).await?;
        let body = resp.text().await.map_err(from_reqwest)?;
        serde_json::from_str(&body).map_err(|e| {
            Error::service(service, format!("failed to parse {endpoint} response: {e}: {body}"))
        })
    }

    async fn call_unit(
        &self,
        service: &'static str,
        endpoint: &str,
        build_request: impl Fn() -> RequestBuilder,
    ) -> Result<()> {
        self.execute(service, endpoint, build_request).await?;
        Ok(())
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Trait implementations
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

const CALL: &str = "call-manager";
const TRANSCRIBE: &str = "transcribe-manager";
const TTS: &str = "tts-manager";
const FLOW: &str = "flow-manager";
const MESSAGE: &str = "message-manager";
const EMAIL: &str = "email-manager";

#[async_trait]
impl CallControl for RemoteServices {
    async fn confbridge_create(&self, req: &ConfbridgeRequest) -> Result<Uuid> {
        let url = Self::url(&self.config.call_manager_url, "/v1/confbridges");
        let res: IdResponse = self
            .call_json(CALL, "POST /v1/confbridges", || self.http.post(&url).json(req))
            .await?;
        Ok(res.id)
    }

    async fn confbridge_terminate(&self, confbridge_id: Uuid) -> Result<()> {
        let url = Self::url(
            &self.config.call_manager_url,
            &format!("/v1/confbridges/{confbridge_id}/terminate"),
        );
        self.call_unit(CALL, "POST /v1/confbridges/{id}/terminate", || self.http.post(&url))
            .await
    }

    async fn confbridge_delete(&self, confbridge_id: Uuid) -> Result<()> {
        let url = Self::url(
            &self.config.call_manager_url,
            &format!("/v1/confbridges/{confbridge_id}"),
        );
        self.call_unit(CALL, "DELETE /v1/confbridges/{id}", || self.http.delete(&url))
            .await
    }

    async fn talk(&self, call_id: Uuid, text: &str, gender: Gender, language: &str) -> Result<()> {
        let url = Self::url(&self.config.call_manager_url, &format!("/v1/calls/{call_id}/talk"));
        let body = json!({ "text": text, "gender": gender, "language": language });
        self.call_unit(CALL, "POST /v1/calls/{id}/talk", || self.http.post(&url).json(&body))
            .await
    }

    async fn media_stop(&self, call_id: Uuid) -> Result<()> {
        let url = Self::url(
            &self.config.call_manager_url,
            &format!("/v1/calls/{call_id}/media_stop"),
        );
        self.call_unit(CALL, "POST /v1/calls/{id}/media_stop", || self.http.post(&url))
            .await
    }
}

#[async_trait]
impl Transcriber for RemoteServices {
    async fn start(&self, req: &TranscribeRequest) -> Result<Uuid> {
        let url = Self::url(&self.config.transcribe_manager_url, "/v1/transcribes");
        let res: IdResponse = self
            .call_json(TRANSCRIBE, "POST /v1/transcribes", || self.http.post(&url).json(req))
            .await?;
        Ok(res.id)
    }

    async fn stop(&self, transcribe_id: Uuid) -> Result<()> {
        let url = Self::url(
            &self.config.transcribe_manager_url,
            &format!("/v1/transcribes/{transcribe_id}/stop"),
        );
        self.call_unit(TRANSCRIBE, "POST /v1/transcribes/{id}/stop", || self.http.post(&url))
            .await
    }
}

impl RemoteServices {
    fn streaming_url(&self, pod_id: &str, streaming_id: Uuid, op: &str) -> String {
        Self::url(
            &self.config.tts_manager_url,
            &format!("/v1/pods/{pod_id}/streamings/{streaming_id}{op}"),
        )
    }
}

#[async_trait]
impl TtsStreaming for RemoteServices {
    async fn create(&self, req: &TtsRequest) -> Result<TtsSession> {
        let url = Self::url(&self.config.tts_manager_url, "/v1/streamings");
        self.call_json(TTS, "POST /v1/streamings", || self.http.post(&url).json(req))
            .await
    }

    async fn say(&self, pod_id: &str, streaming_id: Uuid, message_id: Uuid, text: &str) -> Result<()> {
        let url = self.streaming_url(pod_id, streaming_id, "/say");
        let body = json!({ "message_id": message_id, "text": text });
        self.call_unit(TTS, "POST streamings/{id}/say", || self.http.post(&url).json(&body))
            .await
    }

    async fn say_add(
        &self,
        pod_id: &str,
        streaming_id: Uuid,
        message_id: Uuid,
        text: &str,
    ) -> Result<()> {
        let url = self.streaming_url(pod_id, streaming_id, "/say_add");
        let body = json!({ "message_id": message_id, "text": text });
        self.call_unit(TTS, "POST streamings/{id}/say_add", || self.http.post(&url).json(&body))
            .await
    }

    async fn say_stop(&self, pod_id: &str, streaming_id: Uuid) -> Result<()> {
        let url = self.streaming_url(pod_id, streaming_id, "/say_stop");
        self.call_unit(TTS, "POST streamings/{id}/say_stop", || self.http.post(&url))
            .await
    }

    async fn delete(&self, pod_id: &str, streaming_id: Uuid) -> Result<()> {
        let url = self.streaming_url(pod_id, streaming_id, "");
        self.call_unit(TTS, "DELETE streamings/{id}", || self.http.delete(&url))
            .await
    }
}

#[async_trait]
impl Workflow for RemoteServices {
    async fn set_variables(
        &self,
        activeflow_id: Uuid,
        variables: &HashMap<String, String>,
    ) -> Result<()> {
        let url = Self::url(
            &self.config.flow_manager_url,
            &format!("/v1/activeflows/{activeflow_id}/variables"),
        );
        let body = json!({ "variables": variables });
        self.call_unit(FLOW, "PUT /v1/activeflows/{id}/variables", || {
            self.http.put(&url).json(&body)
        })
        .await
    }

    async fn get_variables(&self, activeflow_id: Uuid) -> Result<HashMap<String, String>> {
        let url = Self::url(
            &self.config.flow_manager_url,
            &format!("/v1/activeflows/{activeflow_id}/variables"),
        );
        let res: VariablesResponse = self
            .call_json(FLOW, "GET /v1/activeflows/{id}/variables", || self.http.get(&url))
            .await?;
        Ok(res.variables)
    }

    async fn substitute(&self, activeflow_id: Uuid, template: &str) -> Result<String> {
        let url = Self::url(
            &self.config.flow_manager_url,
            &format!("/v1/activeflows/{activeflow_id}/substitute"),
        );
        let body = json!({ "text": template });
        let res: TextResponse = self
            .call_json(FLOW, "POST /v1/activeflows/{id}/substitute", || {
                self.http.post(&url).json(&body)
            })
            .await?;
        Ok(res.text)
    }

    async fn add_actions(&self, activeflow_id: Uuid, actions: &[FlowAction]) -> Result<Uuid> {
        let url = Self::url(
            &self.config.flow_manager_url,
            &format!("/v1/activeflows/{activeflow_id}/actions"),
        );
        let body = json!({ "actions": actions });
        let res: IdResponse = self
            .call_json(FLOW, "POST /v1/activeflows/{id}/actions", || {
                self.http.post(&url).json(&body)
            })
            .await?;
        Ok(res.id)
    }

    async fn stop(&self, activeflow_id: Uuid) -> Result<Uuid> {
        let url = Self::url(
            &self.config.flow_manager_url,
            &format!("/v1/activeflows/{activeflow_id}/stop"),
        );
        let res: IdResponse = self
            .call_json(FLOW, "POST /v1/activeflows/{id}/stop", || self.http.post(&url))
            .await?;
        Ok(res.id)
    }
}

#[async_trait]
impl Messaging for RemoteServices {
    async fn send(
        &self,
        customer_id: Uuid,
        source: Option<&Address>,
        destinations: &[Address],
        text: &str,
    ) -> Result<Uuid> {
        let url = Self::url(&self.config.message_manager_url, "/v1/messages");
        let body = json!({
            "id": Uuid::new_v4(),
            "customer_id": customer_id,
            "source": source,
            "destinations": destinations,
            "text": text,
        });
        let res: IdResponse = self
            .call_json(MESSAGE, "POST /v1/messages", || self.http.post(&url).json(&body))
            .await?;
        Ok(res.id)
    }
}

#[async_trait]
impl EmailSender for RemoteServices {
    async fn send(
        &self,
        customer_id: Uuid,
        activeflow_id: Option<Uuid>,
        destinations: &[Address],
        subject: &str,
        content: &str,
    ) -> Result<Uuid> {
        let url = Self::url(&self.config.email_manager_url, "/v1/emails");
        let body = json!({
            "customer_id": customer_id,
            "activeflow_id": activeflow_id,
            "destinations": destinations,
            "subject": subject,
            "content": content,
        });
        let res: IdResponse = self
            .call_json(EMAIL, "POST /v1/emails", || self.http.post(&url).json(&body))
            .await?;
        Ok(res.id)
    }
}

#[async_trait]
impl Notifier for RemoteServices {
    async fn publish(&self, event: &WebhookEvent) -> Result<()> {
        let Some(webhook_url) = &self.config.webhook_url else {
            tracing::debug!(event = %event.kind, customer_id = %event.customer_id, "webhook event");
            return Ok(());
        };
        self.call_unit("webhook", "POST webhook", || self.http.post(webhook_url).json(event))
            .await
    }
}
