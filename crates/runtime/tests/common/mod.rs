//! In-process collaborators and a scripted engine for runtime tests.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;

use ac_domain::action::{Address, FlowAction};
use ac_domain::ai::{Ai, AiFields};
use ac_domain::aicall::{Aicall, Gender};
use ac_domain::config::AicallConfig;
use ac_domain::engine::EngineTarget;
use ac_domain::error::{Error, Result};
use ac_domain::event::{EventType, WebhookEvent};
use ac_domain::message::{FunctionCall, Message, ToolCall, ToolType};
use ac_engines::pump::spawn_replay;
use ac_engines::{EngineAdapter, EngineRegistry, EngineReply, StreamOptions, StreamingReply};
use ac_runtime::services::{
    CallControl, ConfbridgeRequest, EmailSender, Messaging, Notifier, TranscribeRequest, Transcriber,
    TtsRequest, TtsSession, TtsStreaming, Workflow,
};
use ac_runtime::{AiHandler, AicallHandler, RuntimeMetrics, Services};
use ac_store::{MemoryPersistence, Persistence};
use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Collaborators
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Records every collaborator call as `"<op> <detail>"`. Ops listed in
/// `failing` return a service error instead.
#[derive(Default)]
pub struct FakeServices {
    pub calls: Mutex<Vec<String>>,
    pub failing: Mutex<HashSet<&'static str>>,
    pub actions: Mutex<Vec<(Uuid, FlowAction)>>,
    pub spoken: Mutex<Vec<String>>,
    pub variables: Mutex<HashMap<String, String>>,
    pub events: Mutex<Vec<WebhookEvent>>,
}

impl FakeServices {
    pub fn fail(&self, op: &'static str) {
        self.failing.lock().insert(op);
    }

    pub fn ops(&self) -> Vec<String> {
        self.calls
            .lock()
            .iter()
            .map(|c| c.split(' ').next().unwrap_or_default().to_string())
            .collect()
    }

    pub fn called(&self, op: &str) -> bool {
        self.ops().iter().any(|o| o == op)
    }

    pub fn event_kinds(&self) -> Vec<EventType> {
        self.events.lock().iter().map(|e| e.kind).collect()
    }

    fn record(&self, op: &'static str, detail: impl std::fmt::Display) -> Result<()> {
        self.calls.lock().push(format!("{op} {detail}"));
        if self.failing.lock().contains(op) {
            return Err(Error::service(op, "injected failure"));
        }
        Ok(())
    }
}

#[async_trait]
impl CallControl for FakeServices {
    async fn confbridge_create(&self, req: &ConfbridgeRequest) -> Result<Uuid> {
        self.record("confbridge_create", req.customer_id)?;
        Ok(Uuid::new_v4())
    }
    async fn confbridge_terminate(&self, confbridge_id: Uuid) -> Result<()> {
        self.record("confbridge_terminate", confbridge_id)
    }
    async fn confbridge_delete(&self, confbridge_id: Uuid) -> Result<()> {
        self.record("confbridge_delete", confbridge_id)
    }
    async fn talk(&self, call_id: Uuid, text: &str, _gender: Gender, _language: &str) -> Result<()> {
        self.record("talk", call_id)?;
        self.spoken.lock().push(text.to_string());
        Ok(())
    }
    async fn media_stop(&self, call_id: Uuid) -> Result<()> {
        self.record("media_stop", call_id)
    }
}

#[async_trait]
impl Transcriber for FakeServices {
    async fn start(&self, req: &TranscribeRequest) -> Result<Uuid> {
        self.record("transcribe_start", req.reference_id)?;
        Ok(Uuid::new_v4())
    }
    async fn stop(&self, transcribe_id: Uuid) -> Result<()> {
        self.record("transcribe_stop", transcribe_id)
    }
}

#[async_trait]
impl TtsStreaming for FakeServices {
    async fn create(&self, req: &TtsRequest) -> Result<TtsSession> {
        self.record("tts_create", req.reference_id)?;
        Ok(TtsSession {
            id: Uuid::new_v4(),
            pod_id: "tts-pod-1".into(),
        })
    }
    async fn say(&self, _pod_id: &str, streaming_id: Uuid, _message_id: Uuid, text: &str) -> Result<()> {
        self.record("tts_say", streaming_id)?;
        self.spoken.lock().push(text.to_string());
        Ok(())
    }
    async fn say_add(&self, _pod_id: &str, streaming_id: Uuid, _message_id: Uuid, text: &str) -> Result<()> {
        self.record("tts_say_add", streaming_id)?;
        self.spoken.lock().push(text.to_string());
        Ok(())
    }
    async fn say_stop(&self, _pod_id: &str, streaming_id: Uuid) -> Result<()> {
        self.record("tts_say_stop", streaming_id)
    }
    async fn delete(&self, _pod_id: &str, streaming_id: Uuid) -> Result<()> {
        self.record("tts_delete", streaming_id)
    }
}

#[async_trait]
impl Workflow for FakeServices {
    async fn set_variables(&self, activeflow_id: Uuid, variables: &HashMap<String, String>) -> Result<()> {
        self.record("set_variables", activeflow_id)?;
        self.variables
            .lock()
            .extend(variables.iter().map(|(k, v)| (k.clone(), v.clone())));
        Ok(())
    }
    async fn get_variables(&self, activeflow_id: Uuid) -> Result<HashMap<String, String>> {
        self.record("get_variables", activeflow_id)?;
        Ok(self.variables.lock().clone())
    }
    async fn substitute(&self, activeflow_id: Uuid, template: &str) -> Result<String> {
        self.record("substitute", activeflow_id)?;
        let mut out = template.to_string();
        for (k, v) in self.variables.lock().iter() {
            out = out.replace(&format!("{{{{{k}}}}}"), v);
        }
        Ok(out)
    }
    async fn add_actions(&self, activeflow_id: Uuid, actions: &[FlowAction]) -> Result<Uuid> {
        self.record("add_actions", activeflow_id)?;
        self.actions
            .lock()
            .extend(actions.iter().cloned().map(|a| (activeflow_id, a)));
        Ok(activeflow_id)
    }
    async fn stop(&self, activeflow_id: Uuid) -> Result<Uuid> {
        self.record("activeflow_stop", activeflow_id)?;
        Ok(activeflow_id)
    }
}

#[async_trait]
impl Messaging for FakeServices {
    async fn send(
        &self,
        customer_id: Uuid,
        _source: Option<&Address>,
        destinations: &[Address],
        _text: &str,
    ) -> Result<Uuid> {
        self.record("message_send", format!("{customer_id} {}", destinations.len()))?;
        Ok(Uuid::new_v4())
    }
}

#[async_trait]
impl EmailSender for FakeServices {
    async fn send(
        &self,
        customer_id: Uuid,
        _activeflow_id: Option<Uuid>,
        _destinations: &[Address],
        _subject: &str,
        _content: &str,
    ) -> Result<Uuid> {
        self.record("email_send", customer_id)?;
        Ok(Uuid::new_v4())
    }
}

#[async_trait]
impl Notifier for FakeServices {
    async fn publish(&self, event: &WebhookEvent) -> Result<()> {
        self.events.lock().push(event.clone());
        Ok(())
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Engine
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub enum Script {
    Reply(EngineReply),
    /// Never finishes on its own; closes its channels on cancellation.
    Hang,
}

/// Engine answering from a queue of scripted turns. An empty queue
/// answers with an empty reply.
pub struct ScriptedEngine {
    streaming: bool,
    script: Mutex<VecDeque<Script>>,
    pub histories: Mutex<Vec<Vec<Message>>>,
}

impl ScriptedEngine {
    pub fn new(streaming: bool) -> Self {
        Self {
            streaming,
            script: Mutex::new(VecDeque::new()),
            histories: Mutex::new(Vec::new()),
        }
    }

    pub fn push(&self, script: Script) {
        self.script.lock().push_back(script);
    }

    pub fn say(&self, content: &str) {
        self.push(Script::Reply(EngineReply {
            content: content.into(),
            tool_calls: Vec::new(),
        }));
    }

    pub fn call_tool(&self, content: &str, id: &str, name: &str, arguments: &str) {
        self.push(Script::Reply(EngineReply {
            content: content.into(),
            tool_calls: vec![ToolCall {
                id: id.into(),
                kind: ToolType::Function,
                function: FunctionCall::new(name, arguments),
            }],
        }));
    }

    /// One reply carrying several tool calls as `(id, name, arguments)`.
    pub fn call_tools(&self, content: &str, calls: &[(&str, &str, &str)]) {
        self.push(Script::Reply(EngineReply {
            content: content.into(),
            tool_calls: calls
                .iter()
                .map(|(id, name, arguments)| ToolCall {
                    id: (*id).into(),
                    kind: ToolType::Function,
                    function: FunctionCall::new(*name, *arguments),
                })
                .collect(),
        }));
    }

    fn next(&self, history: &[Message]) -> Script {
        self.histories.lock().push(history.to_vec());
        self.script
            .lock()
            .pop_front()
            .unwrap_or(Script::Reply(EngineReply::default()))
    }
}

#[async_trait]
impl EngineAdapter for ScriptedEngine {
    fn target(&self) -> EngineTarget {
        EngineTarget::Openai
    }

    fn supports_streaming(&self) -> bool {
        self.streaming
    }

    async fn message_send(&self, _aicall: &Aicall, history: &[Message]) -> Result<EngineReply> {
        match self.next(history) {
            Script::Reply(reply) => Ok(reply),
            Script::Hang => std::future::pending().await,
        }
    }

    async fn streaming_send(
        &self,
        _aicall: &Aicall,
        history: &[Message],
        opts: StreamOptions,
    ) -> Result<StreamingReply> {
        match self.next(history) {
            Script::Reply(reply) => Ok(spawn_replay(reply, opts)),
            Script::Hang => Ok(hanging_stream(opts.cancel)),
        }
    }
}

fn hanging_stream(cancel: CancellationToken) -> StreamingReply {
    let (sentence_tx, sentences) = mpsc::channel::<String>(1);
    let (tool_tx, tools) = mpsc::channel::<ToolCall>(1);
    let task = tokio::spawn(async move {
        cancel.cancelled().await;
        drop(sentence_tx);
        drop(tool_tx);
    });
    StreamingReply {
        sentences,
        tools,
        task,
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Harness
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub struct Harness {
    pub handler: Arc<AicallHandler>,
    pub ais: AiHandler,
    pub services: Arc<FakeServices>,
    pub engine: Arc<ScriptedEngine>,
    pub store: Arc<dyn Persistence>,
    pub shutdown: CancellationToken,
}

pub fn harness(streaming: bool, config: AicallConfig) -> Harness {
    let store: Arc<dyn Persistence> = Arc::new(MemoryPersistence::new());
    let services = Arc::new(FakeServices::default());
    let engine = Arc::new(ScriptedEngine::new(streaming));
    let mut registry = EngineRegistry::new();
    registry.register(engine.clone());
    let registry = Arc::new(registry);
    let shutdown = CancellationToken::new();
    let bundle = Services::uniform(services.clone());

    let handler = AicallHandler::new(
        store.clone(),
        registry.clone(),
        bundle.clone(),
        Arc::new(RuntimeMetrics::new()),
        config,
        shutdown.clone(),
    );
    let ais = AiHandler::new(store.clone(), registry, bundle);
    Harness {
        handler,
        ais,
        services,
        engine,
        store,
        shutdown,
    }
}

/// Config with no connect delay so delayed termination is observable.
pub fn quick_config() -> AicallConfig {
    AicallConfig {
        connect_terminate_delay_ms: 0,
        ..AicallConfig::default()
    }
}

impl Harness {
    pub async fn ai(&self, init_prompt: &str) -> Ai {
        self.ais
            .create(AiFields {
                customer_id: Uuid::new_v4(),
                name: "front desk".into(),
                detail: String::new(),
                engine_type: Default::default(),
                engine_model: "openai.gpt-4o".into(),
                engine_data: Default::default(),
                init_prompt: init_prompt.into(),
                tts_type: "elevenlabs".into(),
                tts_voice_id: "voice-1".into(),
                stt_type: String::new(),
            })
            .await
            .expect("create ai")
    }

    pub async fn messages(&self, aicall_id: Uuid) -> Vec<Message> {
        self.handler.messages().history(aicall_id).await.expect("history")
    }
}
