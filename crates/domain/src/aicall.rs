//! The aicall session entity and its status graph.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::engine::EngineModel;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Enums
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ReferenceType {
    #[default]
    None,
    Call,
    Conversation,
    Task,
}

impl ReferenceType {
    pub fn as_str(self) -> &'static str {
        match self {
            ReferenceType::None => "none",
            ReferenceType::Call => "call",
            ReferenceType::Conversation => "conversation",
            ReferenceType::Task => "task",
        }
    }
}

impl fmt::Display for ReferenceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    Male,
    Female,
    #[default]
    Neutral,
}

impl Gender {
    pub fn as_str(self) -> &'static str {
        match self {
            Gender::Male => "male",
            Gender::Female => "female",
            Gender::Neutral => "neutral",
        }
    }
}

/// Engine family recorded on the session snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum EngineType {
    #[default]
    None,
    Chatbot,
}

/// Aicall lifecycle status.
///
/// ```text
/// initiating -> progressing -> pausing -> resuming -> progressing
///      |             |            |          |
///      +-------------+------------+----------+--> terminating -> terminated
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum AicallStatus {
    #[default]
    Initiating,
    Progressing,
    Pausing,
    Resuming,
    Terminating,
    Terminated,
}

impl AicallStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            AicallStatus::Initiating => "initiating",
            AicallStatus::Progressing => "progressing",
            AicallStatus::Pausing => "pausing",
            AicallStatus::Resuming => "resuming",
            AicallStatus::Terminating => "terminating",
            AicallStatus::Terminated => "terminated",
        }
    }

    /// Whether moving from `self` to `next` follows the status graph.
    /// Same-status moves are not edges; callers treat them as no-ops.
    pub fn can_transition_to(self, next: AicallStatus) -> bool {
        use AicallStatus::*;
        matches!(
            (self, next),
            (Initiating, Progressing)
                | (Progressing, Pausing)
                | (Pausing, Resuming)
                | (Resuming, Progressing)
                | (Initiating | Progressing | Pausing | Resuming, Terminating)
                | (Terminating, Terminated)
        )
    }

    pub fn is_final(self) -> bool {
        matches!(self, AicallStatus::Terminated)
    }
}

impl fmt::Display for AicallStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Aicall
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// A running AI conversation session.
///
/// The engine and voice fields are a snapshot of the AI configuration taken
/// at creation time, so later edits to the AI do not leak into a live call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Aicall {
    pub id: Uuid,
    pub customer_id: Uuid,
    pub ai_id: Uuid,

    pub engine_type: EngineType,
    pub engine_model: EngineModel,
    #[serde(default)]
    pub engine_data: serde_json::Map<String, serde_json::Value>,
    #[serde(default)]
    pub tts_type: String,
    #[serde(default)]
    pub tts_voice_id: String,
    #[serde(default)]
    pub stt_type: String,

    #[serde(default)]
    pub activeflow_id: Option<Uuid>,
    pub reference_type: ReferenceType,
    #[serde(default)]
    pub reference_id: Option<Uuid>,

    #[serde(default)]
    pub confbridge_id: Option<Uuid>,
    #[serde(default)]
    pub pipecatcall_id: Option<Uuid>,
    #[serde(default)]
    pub tts_streaming_id: Option<Uuid>,
    #[serde(default)]
    pub tts_streaming_pod_id: Option<String>,
    #[serde(default)]
    pub transcribe_id: Option<Uuid>,

    pub status: AicallStatus,
    pub gender: Gender,
    pub language: String,

    pub tm_create: Option<DateTime<Utc>>,
    pub tm_update: Option<DateTime<Utc>>,
    pub tm_end: Option<DateTime<Utc>>,
    pub tm_delete: Option<DateTime<Utc>>,
}

impl Aicall {
    pub fn is_deleted(&self) -> bool {
        self.tm_delete.is_some()
    }

    /// Streaming playback handles, when a TTS streaming session is bound.
    pub fn tts_stream(&self) -> Option<(&str, Uuid)> {
        match (&self.tts_streaming_pod_id, self.tts_streaming_id) {
            (Some(pod), Some(id)) => Some((pod.as_str(), id)),
            _ => None,
        }
    }

    /// Check that the bound resources agree with reference type and status.
    ///
    /// Returns a description of the first violation found.
    pub fn check_resources(&self) -> Result<(), String> {
        if self.reference_type == ReferenceType::Call && self.confbridge_id.is_none() {
            return Err("call-bound aicall has no confbridge".into());
        }
        if self.status == AicallStatus::Terminated && self.transcribe_id.is_some() {
            return Err("terminated aicall still holds a transcribe".into());
        }
        Ok(())
    }
}
