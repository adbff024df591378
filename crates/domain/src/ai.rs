use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::aicall::EngineType;
use crate::engine::EngineModel;

/// AI configuration an aicall is started from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ai {
    pub id: Uuid,
    pub customer_id: Uuid,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub detail: String,

    #[serde(default)]
    pub engine_type: EngineType,
    pub engine_model: EngineModel,
    /// Opaque per-engine blob (Dialogflow project/region/agent, etc.).
    #[serde(default)]
    pub engine_data: serde_json::Map<String, serde_json::Value>,

    /// System prompt run as the first turn. May contain workflow
    /// variable templates.
    #[serde(default)]
    pub init_prompt: String,

    #[serde(default)]
    pub tts_type: String,
    #[serde(default)]
    pub tts_voice_id: String,
    #[serde(default)]
    pub stt_type: String,

    pub tm_create: Option<DateTime<Utc>>,
    pub tm_update: Option<DateTime<Utc>>,
    pub tm_delete: Option<DateTime<Utc>>,
}

impl Ai {
    pub fn is_deleted(&self) -> bool {
        self.tm_delete.is_some()
    }
}

/// Mutable fields of an [`Ai`], used for create and update requests.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AiFields {
    pub customer_id: Uuid,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub detail: String,
    #[serde(default)]
    pub engine_type: EngineType,
    /// Raw `<target>.<model>` string, validated by the AI handler.
    pub engine_model: String,
    #[serde(default)]
    pub engine_data: serde_json::Map<String, serde_json::Value>,
    #[serde(default)]
    pub init_prompt: String,
    #[serde(default)]
    pub tts_type: String,
    #[serde(default)]
    pub tts_voice_id: String,
    #[serde(default)]
    pub stt_type: String,
}
