//! Workflow actions the tool dispatcher pushes onto an activeflow, and the
//! option payloads the engine supplies as tool-call arguments.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A communication endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
    #[serde(rename = "type")]
    pub kind: AddressType,
    pub target: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub target_name: String,
}

impl Address {
    pub fn tel(number: impl Into<String>) -> Self {
        Self {
            kind: AddressType::Tel,
            target: number.into(),
            target_name: String::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AddressType {
    Tel,
    Sip,
    Email,
    Extension,
    Agent,
    Conference,
    Line,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlowActionType {
    Connect,
    MessageSend,
    EmailSend,
}

/// A platform action appended to a running activeflow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowAction {
    pub id: Uuid,
    #[serde(rename = "type")]
    pub kind: FlowActionType,
    pub option: serde_json::Value,
}

impl FlowAction {
    pub fn new(kind: FlowActionType, option: impl Serialize) -> serde_json::Result<Self> {
        Ok(Self {
            id: Uuid::new_v4(),
            kind,
            option: serde_json::to_value(option)?,
        })
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tool-call option payloads
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectOption {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<Address>,
    pub destinations: Vec<Address>,
    #[serde(default)]
    pub early_media: bool,
    #[serde(default)]
    pub relay_reason: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageSendOption {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<Address>,
    pub destinations: Vec<Address>,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmailSendOption {
    pub destinations: Vec<Address>,
    pub subject: String,
    pub content: String,
}
