//! OpenAI-compatible engine adapter.
//!
//! Serves every target that speaks the chat-completions protocol (OpenAI,
//! DeepSeek, Groq, Mistral). The whole chronological history and the fixed
//! tool set go out on every turn.

use std::time::Instant;

use ac_domain::aicall::Aicall;
use ac_domain::config::OpenAiCompatConfig;
use ac_domain::engine::EngineTarget;
use ac_domain::error::{Error, Result};
use ac_domain::message::{FunctionCall, Message, Role, ToolCall, ToolType};
use ac_domain::stream::{StreamEvent, Usage};
use ac_domain::trace::TraceEvent;
use serde_json::Value;

use crate::tool_defs::{self, ToolDefinition};
use crate::traits::{EngineAdapter, EngineReply, StreamOptions, StreamingReply};
use crate::util::{auth_header, from_reqwest, resolve_api_key};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Adapter struct
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub struct OpenAiCompatEngine {
    target: EngineTarget,
    base_url: String,
    auth: Option<(String, String)>,
    temperature: Option<f32>,
    tools: Vec<ToolDefinition>,
    client: reqwest::Client,
}

impl OpenAiCompatEngine {
    pub fn from_config(cfg: &OpenAiCompatConfig) -> Result<Self> {
        if !cfg.target.is_openai_compatible() {
            return Err(Error::Config(format!(
                "target '{}' cannot be served by the OpenAI adapter",
                cfg.target
            )));
        }
        let key = resolve_api_key(&cfg.auth)?;
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_millis(cfg.timeout_ms))
            .build()
            .map_err(from_reqwest)?;

        Ok(Self {
            target: cfg.target,
            base_url: cfg.base_url.trim_end_matches('/').to_string(),
            auth: auth_header(&cfg.auth, key.as_deref()),
            temperature: cfg.temperature,
            tools: tool_defs::all(),
            client,
        })
    }

    fn chat_url(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }

    fn post(&self, url: &str) -> reqwest::RequestBuilder {
        let req = self.client.post(url).header("Content-Type", "application/json");
        match &self.auth {
            Some((header, value)) => req.header(header.as_str(), value.as_str()),
            None => req,
        }
    }

    fn build_body(&self, aicall: &Aicall, history: &[Message], stream: bool) -> Value {
        let messages: Vec<Value> = history.iter().filter_map(msg_to_openai).collect();
        let mut body = serde_json::json!({
            "model": aicall.engine_model.model(),
            "messages": messages,
            "stream": stream,
        });
        if !self.tools.is_empty() {
            body["tools"] = Value::Array(self.tools.iter().map(ToolDefinition::to_openai).collect());
        }
        if let Some(temp) = self.temperature {
            body["temperature"] = serde_json::json!(temp);
        }
        if stream {
            body["stream_options"] = serde_json::json!({"include_usage": true});
        }
        body
    }

    async fn send_checked(&self, body: &Value) -> Result<reqwest::Response> {
        let url = self.chat_url();
        tracing::debug!(engine = %self.target, url = %url, "chat completion request");

        let resp = self.post(&url).json(body).send().await.map_err(from_reqwest)?;
        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.map_err(from_reqwest)?;
            return Err(Error::engine(
                self.target.as_str(),
                format!("HTTP {} - {}", status.as_u16(), text),
            ));
        }
        Ok(resp)
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Message serialization helpers
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

fn msg_to_openai(msg: &Message) -> Option<Value> {
    let v = match msg.role {
        Role::None => return None,
        Role::Assistant => {
            let mut obj = serde_json::json!({"role": "assistant"});
            obj["content"] = if msg.content.is_empty() {
                Value::Null
            } else {
                Value::String(msg.content.clone())
            };
            if !msg.tool_calls.is_empty() {
                obj["tool_calls"] = serde_json::to_value(&msg.tool_calls).unwrap_or(Value::Null);
            }
            obj
        }
        Role::Tool | Role::Function => serde_json::json!({
            "role": "tool",
            "tool_call_id": msg.tool_call_id.clone().unwrap_or_default(),
            "content": msg.content,
        }),
        Role::System | Role::User => serde_json::json!({
            "role": msg.role.as_str(),
            "content": msg.content,
        }),
    };
    Some(v)
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Response parsing
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

fn parse_chat_response(engine: EngineTarget, body: &Value) -> Result<EngineReply> {
    let message = body
        .get("choices")
        .and_then(|c| c.as_array())
        .and_then(|a| a.first())
        .and_then(|choice| choice.get("message"))
        .ok_or_else(|| Error::engine(engine.as_str(), "no message in response"))?;

    let content = message
        .get("content")
        .and_then(|v| v.as_str())
        .unwrap_or("")
        .to_string();

    let tool_calls = message
        .get("tool_calls")
        .and_then(|v| v.as_array())
        .map(|arr| {
            arr.iter()
                .filter_map(|tc| {
                    Some(ToolCall {
                        id: tc.get("id")?.as_str()?.to_string(),
                        kind: ToolType::Function,
                        function: FunctionCall {
                            name: tc.get("function")?.get("name")?.as_str()?.to_string(),
                            arguments: tc
                                .get("function")?
                                .get("arguments")
                                .and_then(|a| a.as_str())
                                .unwrap_or("{}")
                                .to_string(),
                        },
                    })
                })
                .collect()
        })
        .unwrap_or_default();

    Ok(EngineReply {
        content,
        tool_calls,
    })
}

fn parse_usage(v: &Value) -> Option<Usage> {
    Some(Usage {
        prompt_tokens: v.get("prompt_tokens")?.as_u64()? as u32,
        completion_tokens: v.get("completion_tokens")?.as_u64()? as u32,
        total_tokens: v.get("total_tokens")?.as_u64()? as u32,
    })
}

/// Decode one SSE `data:` payload into engine events.
///
/// A single chunk can carry a tool-call id, its name and the first argument
/// fragment at once, so all of them are emitted in order.
pub(crate) fn parse_sse_data(data: &str) -> Vec<Result<StreamEvent>> {
    if data.trim() == "[DONE]" {
        return vec![Ok(StreamEvent::Done {
            usage: None,
            finish_reason: None,
        })];
    }

    let v: Value = match serde_json::from_str(data) {
        Ok(v) => v,
        Err(e) => return vec![Err(Error::Json(e))],
    };

    if let Some(err) = v.get("error") {
        let message = err
            .get("message")
            .and_then(|m| m.as_str())
            .unwrap_or("unknown stream error")
            .to_string();
        return vec![Ok(StreamEvent::Error { message })];
    }

    let Some(choice) = v
        .get("choices")
        .and_then(|c| c.as_array())
        .and_then(|a| a.first())
    else {
        // Usage-only chunk (stream_options.include_usage).
        return match v.get("usage").and_then(parse_usage) {
            Some(usage) => vec![Ok(StreamEvent::Done {
                usage: Some(usage),
                finish_reason: None,
            })],
            None => Vec::new(),
        };
    };

    let mut events = Vec::new();
    let delta = choice.get("delta").unwrap_or(&Value::Null);

    if let Some(text) = delta.get("content").and_then(|v| v.as_str()) {
        if !text.is_empty() {
            events.push(Ok(StreamEvent::Token {
                text: text.to_string(),
            }));
        }
    }

    if let Some(tc_arr) = delta.get("tool_calls").and_then(|v| v.as_array()) {
        for tc in tc_arr {
            let index = tc.get("index").and_then(|v| v.as_u64()).unwrap_or(0).to_string();
            let function = tc.get("function");
            if let Some(id) = tc.get("id").and_then(|v| v.as_str()) {
                let name = function
                    .and_then(|f| f.get("name"))
                    .and_then(|v| v.as_str())
                    .unwrap_or("");
                events.push(Ok(StreamEvent::ToolCallStarted {
                    call_id: id.to_string(),
                    tool_name: name.to_string(),
                }));
            }
            if let Some(args) = function
                .and_then(|f| f.get("arguments"))
                .and_then(|v| v.as_str())
            {
                if !args.is_empty() {
                    events.push(Ok(StreamEvent::ToolCallDelta {
                        call_id: index,
                        delta: args.to_string(),
                    }));
                }
            }
        }
    }

    if let Some(fr) = choice.get("finish_reason").and_then(|f| f.as_str()) {
        events.push(Ok(StreamEvent::Done {
            usage: v.get("usage").and_then(parse_usage),
            finish_reason: Some(fr.to_string()),
        }));
    }

    events
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Trait implementation
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[async_trait::async_trait]
impl EngineAdapter for OpenAiCompatEngine {
    fn target(&self) -> EngineTarget {
        self.target
    }

    fn supports_streaming(&self) -> bool {
        true
    }

    async fn message_send(&self, aicall: &Aicall, history: &[Message]) -> Result<EngineReply> {
        let started = Instant::now();
        let body = self.build_body(aicall, history, false);
        let resp = self.send_checked(&body).await?;
        let json: Value = resp.json().await.map_err(from_reqwest)?;
        let reply = parse_chat_response(self.target, &json)?;

        TraceEvent::EngineRequest {
            engine: self.target.to_string(),
            model: aicall.engine_model.model().to_string(),
            streaming: false,
            duration_ms: started.elapsed().as_millis() as u64,
            attempts: 1,
        }
        .emit();
        Ok(reply)
    }

    async fn streaming_send(
        &self,
        aicall: &Aicall,
        history: &[Message],
        opts: StreamOptions,
    ) -> Result<StreamingReply> {
        let started = Instant::now();
        let body = self.build_body(aicall, history, true);
        let resp = self.send_checked(&body).await?;

        TraceEvent::EngineRequest {
            engine: self.target.to_string(),
            model: aicall.engine_model.model().to_string(),
            streaming: true,
            duration_ms: started.elapsed().as_millis() as u64,
            attempts: 1,
        }
        .emit();

        let events = crate::sse::sse_event_stream(resp, parse_sse_data);
        Ok(crate::pump::spawn_stream_pump(self.target.as_str(), events, opts))
    }
}
