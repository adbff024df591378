use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Message ledger entry
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// One turn in an aicall's conversation ledger.
///
/// Messages are append-only; the only mutation is a soft delete.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: Uuid,
    pub customer_id: Uuid,
    pub aicall_id: Uuid,
    pub direction: Direction,
    pub role: Role,
    #[serde(default)]
    pub content: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
    pub tm_create: Option<DateTime<Utc>>,
    #[serde(default)]
    pub tm_delete: Option<DateTime<Utc>>,
}

impl Message {
    pub fn is_deleted(&self) -> bool {
        self.tm_delete.is_some()
    }
}

/// Direction relative to the platform.
///
/// `Outgoing` is platform → engine (caller speech, system prompts);
/// `Incoming` is engine → platform (assistant replies, tool requests).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Incoming,
    Outgoing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    None,
    System,
    User,
    Assistant,
    Function,
    Tool,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::None => "none",
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::Function => "function",
            Role::Tool => "tool",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tool calls
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// A tool invocation requested by the engine, embedded in an assistant
/// message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    #[serde(rename = "type", default)]
    pub kind: ToolType,
    pub function: FunctionCall,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ToolType {
    #[default]
    Function,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionCall {
    pub name: String,
    /// JSON-encoded argument object, exactly as produced by the engine.
    #[serde(default)]
    pub arguments: String,
}

impl FunctionCall {
    pub fn new(name: impl Into<String>, arguments: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            arguments: arguments.into(),
        }
    }

    /// The closed-set action this call names, if any.
    pub fn action(&self) -> Option<FunctionCallName> {
        FunctionCallName::from_name(&self.name)
    }
}

/// Actions the tool dispatcher knows how to execute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FunctionCallName {
    Connect,
    MessageSend,
    EmailSend,
    StopService,
    StopFlow,
    StopMedia,
    SetVariables,
    GetVariables,
    GetAicallMessages,
}

impl FunctionCallName {
    pub const ALL: [FunctionCallName; 9] = [
        FunctionCallName::Connect,
        FunctionCallName::MessageSend,
        FunctionCallName::EmailSend,
        FunctionCallName::StopService,
        FunctionCallName::StopFlow,
        FunctionCallName::StopMedia,
        FunctionCallName::SetVariables,
        FunctionCallName::GetVariables,
        FunctionCallName::GetAicallMessages,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            FunctionCallName::Connect => "connect",
            FunctionCallName::MessageSend => "message_send",
            FunctionCallName::EmailSend => "email_send",
            FunctionCallName::StopService => "stop_service",
            FunctionCallName::StopFlow => "stop_flow",
            FunctionCallName::StopMedia => "stop_media",
            FunctionCallName::SetVariables => "set_variables",
            FunctionCallName::GetVariables => "get_variables",
            FunctionCallName::GetAicallMessages => "get_aicall_messages",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|n| n.as_str() == name)
    }

    /// Actions after which the AI session has nothing left to do.
    pub fn terminates_session(self) -> bool {
        matches!(self, FunctionCallName::Connect | FunctionCallName::StopService)
    }
}

impl fmt::Display for FunctionCallName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
