//! Tool-call dispatcher.
//!
//! The engine asks for a tool; the dispatcher records the request on the
//! ledger, runs the matching in-platform action and records the result as a
//! `tool` message so the next turn can replay both.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use ac_domain::action::{ConnectOption, EmailSendOption, FlowAction, FlowActionType, MessageSendOption};
use ac_domain::aicall::{Aicall, ReferenceType};
use ac_domain::error::{Error, Result};
use ac_domain::message::{Direction, FunctionCall, FunctionCallName, Role, ToolCall, ToolType};
use ac_domain::trace::TraceEvent;
use ac_store::{MessageFilter, Page};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::handler::AicallHandler;

/// Upper bound on messages returned by `get_aicall_messages`.
const MESSAGE_LOOKUP_LIMIT: usize = 1_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolStatus {
    Success,
    Failed,
}

/// Body of the `tool` message answering a tool call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResult {
    pub tool_call_id: String,
    pub result: ToolStatus,
    pub message: String,
    #[serde(default)]
    pub resource_type: String,
    #[serde(default)]
    pub resource_id: String,
}

impl ToolResult {
    fn success(resource_type: &str, resource_id: impl ToString, message: impl Into<String>) -> Self {
        Self {
            tool_call_id: String::new(),
            result: ToolStatus::Success,
            message: message.into(),
            resource_type: resource_type.to_string(),
            resource_id: resource_id.to_string(),
        }
    }

    fn failed(message: impl Into<String>) -> Self {
        Self {
            tool_call_id: String::new(),
            result: ToolStatus::Failed,
            message: message.into(),
            resource_type: String::new(),
            resource_id: String::new(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.result == ToolStatus::Success
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ToolResponse {
    pub payload: Map<String, Value>,
    /// The session is ending; the controller stops acting on engine output.
    pub terminating: bool,
}

#[derive(Deserialize)]
struct SetVariablesArgs {
    variables: HashMap<String, String>,
}

#[derive(Deserialize)]
struct GetAicallMessagesArgs {
    aicall_id: Uuid,
}

fn parse_args<T: DeserializeOwned>(function: &FunctionCall) -> std::result::Result<T, ToolResult> {
    let raw = if function.arguments.trim().is_empty() {
        "{}"
    } else {
        function.arguments.as_str()
    };
    serde_json::from_str(raw)
        .map_err(|e| ToolResult::failed(format!("invalid arguments for {}: {e}", function.name)))
}

macro_rules! try_tool {
    ($e:expr) => {
        match $e {
            Ok(v) => v,
            Err(failed) => return failed,
        }
    };
}

fn require_activeflow(aicall: &Aicall) -> std::result::Result<Uuid, ToolResult> {
    aicall
        .activeflow_id
        .ok_or_else(|| ToolResult::failed("aicall has no activeflow"))
}

impl AicallHandler {
    /// Execute one tool call requested by the engine.
    ///
    /// Unknown names fail with [`Error::UnknownTool`] after the request is
    /// recorded; no tool message is written for them. Bad arguments and
    /// collaborator failures become `failed` results the engine can read.
    pub async fn dispatch(
        self: &Arc<Self>,
        aicall_id: Uuid,
        tool_call_id: &str,
        tool_type: ToolType,
        function: FunctionCall,
    ) -> Result<ToolResponse> {
        let aicall = self.get(aicall_id).await?;

        self.messages
            .create(
                aicall.customer_id,
                aicall.id,
                Direction::Incoming,
                Role::Assistant,
                String::new(),
                vec![ToolCall {
                    id: tool_call_id.to_string(),
                    kind: tool_type,
                    function: function.clone(),
                }],
                None,
            )
            .await?;

        let Some(name) = function.action() else {
            tracing::warn!(aicall_id = %aicall.id, tool = %function.name, "unknown tool call");
            self.metrics.tool_executed(&function.name, false);
            return Err(Error::UnknownTool(function.name));
        };

        let mut result = self.run_tool(&aicall, name, &function).await;
        result.tool_call_id = tool_call_id.to_string();
        let success = result.is_success();

        self.messages
            .create(
                aicall.customer_id,
                aicall.id,
                Direction::Outgoing,
                Role::Tool,
                serde_json::to_string(&result)?,
                Vec::new(),
                Some(tool_call_id.to_string()),
            )
            .await?;

        tracing::info!(
            aicall_id = %aicall.id,
            tool_call_id,
            tool = %name,
            success,
            "tool executed"
        );
        TraceEvent::ToolExecuted {
            aicall_id: aicall.id.to_string(),
            tool_call_id: tool_call_id.to_string(),
            name: name.to_string(),
            success,
        }
        .emit();
        self.metrics.tool_executed(name.as_str(), success);

        let terminating = success && name.terminates_session();
        if terminating {
            match name {
                FunctionCallName::Connect => {
                    let delay = Duration::from_millis(self.config.connect_terminate_delay_ms);
                    self.terminate_with_delay(aicall.id, delay);
                }
                _ => {
                    if let Err(e) = self.process_end(aicall.id).await {
                        tracing::error!(aicall_id = %aicall.id, error = %e, "terminate after tool failed");
                    }
                }
            }
        }

        let payload = match serde_json::to_value(&result)? {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        Ok(ToolResponse {
            payload,
            terminating,
        })
    }

    async fn run_tool(&self, aicall: &Aicall, name: FunctionCallName, function: &FunctionCall) -> ToolResult {
        match name {
            FunctionCallName::Connect => self.tool_connect(aicall, function).await,
            FunctionCallName::MessageSend => self.tool_message_send(aicall, function).await,
            FunctionCallName::EmailSend => self.tool_email_send(aicall, function).await,
            FunctionCallName::StopService => {
                ToolResult::success("aicall", aicall.id, "Service stopped successfully.")
            }
            FunctionCallName::StopFlow => self.tool_stop_flow(aicall).await,
            FunctionCallName::StopMedia => self.tool_stop_media(aicall).await,
            FunctionCallName::SetVariables => self.tool_set_variables(aicall, function).await,
            FunctionCallName::GetVariables => self.tool_get_variables(aicall).await,
            FunctionCallName::GetAicallMessages => self.tool_get_aicall_messages(aicall, function).await,
        }
    }

    async fn tool_connect(&self, aicall: &Aicall, function: &FunctionCall) -> ToolResult {
        let activeflow_id = try_tool!(require_activeflow(aicall));
        let opt: ConnectOption = try_tool!(parse_args(function));
        let action = match FlowAction::new(FlowActionType::Connect, &opt) {
            Ok(a) => a,
            Err(e) => return ToolResult::failed(e.to_string()),
        };
        match self.services.workflow.add_actions(activeflow_id, &[action]).await {
            Ok(id) => ToolResult::success("activeflow", id, "Added connect action successfully."),
            Err(e) => ToolResult::failed(e.to_string()),
        }
    }

    async fn tool_message_send(&self, aicall: &Aicall, function: &FunctionCall) -> ToolResult {
        let opt: MessageSendOption = try_tool!(parse_args(function));
        match self
            .services
            .messaging
            .send(aicall.customer_id, opt.source.as_ref(), &opt.destinations, &opt.text)
            .await
        {
            Ok(id) => ToolResult::success("message", id, "Message sent successfully."),
            Err(e) => ToolResult::failed(e.to_string()),
        }
    }

    async fn tool_email_send(&self, aicall: &Aicall, function: &FunctionCall) -> ToolResult {
        let opt: EmailSendOption = try_tool!(parse_args(function));
        match self
            .services
            .email
            .send(
                aicall.customer_id,
                aicall.activeflow_id,
                &opt.destinations,
                &opt.subject,
                &opt.content,
            )
            .await
        {
            Ok(id) => ToolResult::success("email", id, "Email sent successfully."),
            Err(e) => ToolResult::failed(e.to_string()),
        }
    }

    async fn tool_stop_flow(&self, aicall: &Aicall) -> ToolResult {
        let activeflow_id = try_tool!(require_activeflow(aicall));
        match self.services.workflow.stop(activeflow_id).await {
            Ok(id) => ToolResult::success("activeflow", id, "Activeflow stopped successfully."),
            Err(e) => ToolResult::failed(e.to_string()),
        }
    }

    async fn tool_stop_media(&self, aicall: &Aicall) -> ToolResult {
        let call_id = match (aicall.reference_type, aicall.reference_id) {
            (ReferenceType::Call, Some(id)) => id,
            _ => return ToolResult::failed("media can only be stopped on a call"),
        };
        match self.services.call.media_stop(call_id).await {
            Ok(()) => ToolResult::success("call", call_id, "Media stopped successfully."),
            Err(e) => ToolResult::failed(e.to_string()),
        }
    }

    async fn tool_set_variables(&self, aicall: &Aicall, function: &FunctionCall) -> ToolResult {
        let activeflow_id = try_tool!(require_activeflow(aicall));
        let args: SetVariablesArgs = try_tool!(parse_args(function));
        match self
            .services
            .workflow
            .set_variables(activeflow_id, &args.variables)
            .await
        {
            Ok(()) => ToolResult::success("activeflow", activeflow_id, "Variables set successfully."),
            Err(e) => ToolResult::failed(e.to_string()),
        }
    }

    async fn tool_get_variables(&self, aicall: &Aicall) -> ToolResult {
        let activeflow_id = try_tool!(require_activeflow(aicall));
        let variables = match self.services.workflow.get_variables(activeflow_id).await {
            Ok(v) => v,
            Err(e) => return ToolResult::failed(e.to_string()),
        };
        match serde_json::to_string(&variables) {
            Ok(body) => ToolResult::success("activeflow", activeflow_id, body),
            Err(e) => ToolResult::failed(e.to_string()),
        }
    }

    async fn tool_get_aicall_messages(&self, aicall: &Aicall, function: &FunctionCall) -> ToolResult {
        let args: GetAicallMessagesArgs = try_tool!(parse_args(function));
        let target = match self.get(args.aicall_id).await {
            Ok(t) if t.customer_id == aicall.customer_id => t,
            Ok(_) | Err(Error::NotFound { .. }) => {
                return ToolResult::failed(format!("aicall not found: {}", args.aicall_id));
            }
            Err(e) => return ToolResult::failed(e.to_string()),
        };
        let messages = match self
            .messages
            .list(target.id, &MessageFilter::live(), &Page::first(MESSAGE_LOOKUP_LIMIT))
            .await
        {
            Ok(m) => m,
            Err(e) => return ToolResult::failed(e.to_string()),
        };
        match serde_json::to_string(&messages) {
            Ok(body) => ToolResult::success("aicall", target.id, body),
            Err(e) => ToolResult::failed(e.to_string()),
        }
    }
}
