//! The fixed tool-definition set offered to LLM engines on every turn.

use ac_domain::message::FunctionCallName;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Tool definition exposed to the LLM.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    /// JSON Schema for the tool's parameters.
    pub parameters: Value,
}

impl ToolDefinition {
    /// OpenAI `tools[]` entry.
    pub fn to_openai(&self) -> Value {
        json!({
            "type": "function",
            "function": {
                "name": self.name,
                "description": self.description,
                "parameters": self.parameters,
            }
        })
    }
}

/// Definitions for every action the dispatcher executes.
pub fn all() -> Vec<ToolDefinition> {
    FunctionCallName::ALL.into_iter().map(definition).collect()
}

fn definition(name: FunctionCallName) -> ToolDefinition {
    let (description, parameters) = match name {
        FunctionCallName::Connect => (
            "Transfer the caller to another endpoint (person, department, or \
             phone number). Use only when the caller asks to be connected. \
             The AI session ends once the transfer starts.",
            json!({
                "type": "object",
                "properties": {
                    "run_llm": run_llm(),
                    "source": address("Source endpoint: agent, conference, extension, sip or tel"),
                    "destinations": {
                        "type": "array",
                        "items": address(
                            "Destination type: agent, conference, extension, line, sip or tel"
                        ),
                    },
                },
                "required": ["destinations"],
            }),
        ),
        FunctionCallName::MessageSend => (
            "Send an SMS text message to one or more phone numbers. Ask first \
             when the caller did not say whether they want a text or an email.",
            json!({
                "type": "object",
                "properties": {
                    "run_llm": run_llm(),
                    "source": address("Must be 'tel'; +E.164 sender number"),
                    "destinations": {
                        "type": "array",
                        "items": address("Must be 'tel'; +E.164 recipient number"),
                    },
                    "text": { "type": "string", "description": "Message body" },
                },
                "required": ["destinations", "text"],
            }),
        ),
        FunctionCallName::EmailSend => (
            "Send an email to one or more addresses.",
            json!({
                "type": "object",
                "properties": {
                    "run_llm": run_llm(),
                    "destinations": {
                        "type": "array",
                        "items": address("Must be 'email'"),
                    },
                    "subject": { "type": "string" },
                    "content": { "type": "string", "description": "HTML or plain text body" },
                },
                "required": ["destinations", "subject", "content"],
            }),
        ),
        FunctionCallName::StopService => (
            "End the AI conversation and let the flow continue with its next \
             action. Use when the caller is done.",
            empty_object(),
        ),
        FunctionCallName::StopFlow => (
            "Terminate the whole flow and the call immediately. Use only when \
             the caller explicitly asks to hang up.",
            empty_object(),
        ),
        FunctionCallName::StopMedia => (
            "Stop media still playing from a previous flow action (hold music, \
             announcements) before speaking.",
            json!({
                "type": "object",
                "properties": { "run_llm": run_llm() },
                "required": [],
            }),
        ),
        FunctionCallName::SetVariables => (
            "Save key-value data to the flow context for later flow actions.",
            json!({
                "type": "object",
                "properties": {
                    "run_llm": run_llm(),
                    "variables": {
                        "type": "object",
                        "additionalProperties": { "type": "string" },
                    },
                },
                "required": ["variables"],
            }),
        ),
        FunctionCallName::GetVariables => (
            "Read the variables saved in the flow context.",
            json!({
                "type": "object",
                "properties": { "run_llm": run_llm() },
                "required": [],
            }),
        ),
        FunctionCallName::GetAicallMessages => (
            "Read the message history of another AI call by id.",
            json!({
                "type": "object",
                "properties": {
                    "run_llm": run_llm(),
                    "aicall_id": { "type": "string", "description": "UUID of the AI call" },
                },
                "required": ["aicall_id"],
            }),
        ),
    };

    ToolDefinition {
        name: name.as_str().to_string(),
        description: description.to_string(),
        parameters,
    }
}

fn run_llm() -> Value {
    json!({
        "type": "boolean",
        "description": "Speak after the action completes (true) or act silently (false).",
        "default": false,
    })
}

fn address(type_description: &str) -> Value {
    json!({
        "type": "object",
        "properties": {
            "type": { "type": "string", "description": type_description },
            "target": { "type": "string" },
            "target_name": { "type": "string" },
        },
        "required": ["type", "target"],
    })
}

fn empty_object() -> Value {
    json!({ "type": "object", "properties": {}, "required": [] })
}
