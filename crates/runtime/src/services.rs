//! Collaborator contracts consumed by the aicall runtime.
//!
//! Each sibling subsystem sits behind its own trait so the runtime can be
//! driven by [`RemoteServices`](crate::remote::RemoteServices) in production
//! and by in-process fakes in tests.

use std::collections::HashMap;
use std::sync::Arc;

use ac_domain::action::{Address, FlowAction};
use ac_domain::aicall::{Gender, ReferenceType};
use ac_domain::error::Result;
use ac_domain::event::{EventType, WebhookEvent};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Request / response shapes
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum StreamDirection {
    Incoming,
    Outgoing,
    #[default]
    Both,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscribeRequest {
    pub customer_id: Uuid,
    pub activeflow_id: Option<Uuid>,
    pub reference_type: ReferenceType,
    pub reference_id: Uuid,
    pub language: String,
    pub direction: StreamDirection,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TtsRequest {
    pub customer_id: Uuid,
    pub activeflow_id: Option<Uuid>,
    pub reference_type: ReferenceType,
    pub reference_id: Uuid,
    pub language: String,
    pub gender: Gender,
    pub provider: String,
    pub voice_id: String,
}

/// Handles of a TTS streaming session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TtsSession {
    pub id: Uuid,
    pub pod_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfbridgeRequest {
    pub customer_id: Uuid,
    pub activeflow_id: Option<Uuid>,
    pub reference_type: ReferenceType,
    pub reference_id: Option<Uuid>,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Traits
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[async_trait]
pub trait CallControl: Send + Sync {
    /// Create a conference bridge; returns its id.
    async fn confbridge_create(&self, req: &ConfbridgeRequest) -> Result<Uuid>;
    async fn confbridge_terminate(&self, confbridge_id: Uuid) -> Result<()>;
    async fn confbridge_delete(&self, confbridge_id: Uuid) -> Result<()>;
    /// Synthesize and play `text` on a call outside the streaming path.
    async fn talk(&self, call_id: Uuid, text: &str, gender: Gender, language: &str) -> Result<()>;
    /// Stop media still playing on a call.
    async fn media_stop(&self, call_id: Uuid) -> Result<()>;
}

#[async_trait]
pub trait Transcriber: Send + Sync {
    /// Start transcription; returns the transcribe id.
    async fn start(&self, req: &TranscribeRequest) -> Result<Uuid>;
    async fn stop(&self, transcribe_id: Uuid) -> Result<()>;
}

#[async_trait]
pub trait TtsStreaming: Send + Sync {
    async fn create(&self, req: &TtsRequest) -> Result<TtsSession>;
    /// Speak a complete utterance.
    async fn say(&self, pod_id: &str, streaming_id: Uuid, message_id: Uuid, text: &str)
        -> Result<()>;
    /// Append text to the utterance currently playing.
    async fn say_add(
        &self,
        pod_id: &str,
        streaming_id: Uuid,
        message_id: Uuid,
        text: &str,
    ) -> Result<()>;
    /// Interrupt whatever is playing.
    async fn say_stop(&self, pod_id: &str, streaming_id: Uuid) -> Result<()>;
    async fn delete(&self, pod_id: &str, streaming_id: Uuid) -> Result<()>;
}

#[async_trait]
pub trait Workflow: Send + Sync {
    async fn set_variables(&self, activeflow_id: Uuid, variables: &HashMap<String, String>)
        -> Result<()>;
    async fn get_variables(&self, activeflow_id: Uuid) -> Result<HashMap<String, String>>;
    /// Expand `{{variable}}` templates against the activeflow's variables.
    async fn substitute(&self, activeflow_id: Uuid, template: &str) -> Result<String>;
    /// Push actions to run next; returns the activeflow id.
    async fn add_actions(&self, activeflow_id: Uuid, actions: &[FlowAction]) -> Result<Uuid>;
    /// Stop the activeflow; returns its id.
    async fn stop(&self, activeflow_id: Uuid) -> Result<Uuid>;
}

#[async_trait]
pub trait Messaging: Send + Sync {
    /// Send a text message; returns the message id.
    async fn send(
        &self,
        customer_id: Uuid,
        source: Option<&Address>,
        destinations: &[Address],
        text: &str,
    ) -> Result<Uuid>;
}

#[async_trait]
pub trait EmailSender: Send + Sync {
    /// Send an email; returns the email id.
    async fn send(
        &self,
        customer_id: Uuid,
        activeflow_id: Option<Uuid>,
        destinations: &[Address],
        subject: &str,
        content: &str,
    ) -> Result<Uuid>;
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn publish(&self, event: &WebhookEvent) -> Result<()>;
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Bundle
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Clone)]
pub struct Services {
    pub call: Arc<dyn CallControl>,
    pub transcribe: Arc<dyn Transcriber>,
    pub tts: Arc<dyn TtsStreaming>,
    pub workflow: Arc<dyn Workflow>,
    pub messaging: Arc<dyn Messaging>,
    pub email: Arc<dyn EmailSender>,
    pub notifier: Arc<dyn Notifier>,
}

impl Services {
    /// Every collaborator served by one implementation.
    pub fn uniform<T>(all: Arc<T>) -> Self
    where
        T: CallControl + Transcriber + TtsStreaming + Workflow + Messaging + EmailSender + Notifier,
        T: 'static,
    {
        Self {
            call: all.clone(),
            transcribe: all.clone(),
            tts: all.clone(),
            workflow: all.clone(),
            messaging: all.clone(),
            email: all.clone(),
            notifier: all,
        }
    }

    /// Publish a webhook event. Delivery failures are logged only.
    pub async fn publish(&self, customer_id: Uuid, kind: EventType, entity: &impl Serialize) {
        let event = WebhookEvent::new(customer_id, kind, entity);
        if let Err(e) = self.notifier.publish(&event).await {
            tracing::warn!(event = %kind, error = %e, "webhook publish failed");
        }
    }
}
