use std::collections::HashMap;
use std::sync::Arc;

use ac_domain::action::{Address, FlowAction};
use ac_domain::aicall::{Aicall, Gender};
use ac_domain::config::Config;
use ac_domain::engine::EngineTarget;
use ac_domain::error::Result;
use ac_domain::event::WebhookEvent;
use ac_domain::message::Message;
use ac_engines::{EngineAdapter, EngineRegistry, EngineReply};
use ac_runtime::services::{
    CallControl, ConfbridgeRequest, EmailSender, Messaging, Notifier, TranscribeRequest, Transcriber,
    TtsRequest, TtsSession, TtsStreaming, Workflow,
};
use ac_runtime::Services;
use ac_server::api;
use ac_server::bootstrap::{assemble, hash_token};
use ac_server::state::AppState;
use ac_store::MemoryPersistence;
use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;
use tower::ServiceExt;
use uuid::Uuid;

// ── fixtures ────────────────────────────────────────────────────────

/// Replies with the last ledger entry, prefixed.
struct EchoEngine;

#[async_trait::async_trait]
impl EngineAdapter for EchoEngine {
    fn target(&self) -> EngineTarget {
        EngineTarget::Openai
    }

    async fn message_send(&self, _aicall: &Aicall, history: &[Message]) -> Result<EngineReply> {
        let last = history.last().map(|m| m.content.clone()).unwrap_or_default();
        Ok(EngineReply {
            content: format!("echo: {last}"),
            tool_calls: Vec::new(),
        })
    }
}

/// Every collaborator succeeds and does nothing.
struct NoopServices;

#[async_trait::async_trait]
impl CallControl for NoopServices {
    async fn confbridge_create(&self, _req: &ConfbridgeRequest) -> Result<Uuid> {
        Ok(Uuid::new_v4())
    }
    async fn confbridge_terminate(&self, _confbridge_id: Uuid) -> Result<()> {
        Ok(())
    }
    async fn confbridge_delete(&self, _confbridge_id: Uuid) -> Result<()> {
        Ok(())
    }
    async fn talk(&self, _call_id: Uuid, _text: &str, _gender: Gender, _language: &str) -> Result<()> {
        Ok(())
    }
    async fn media_stop(&self, _call_id: Uuid) -> Result<()> {
        Ok(())
    }
}

#[async_trait::async_trait]
impl Transcriber for NoopServices {
    async fn start(&self, _req: &TranscribeRequest) -> Result<Uuid> {
        Ok(Uuid::new_v4())
    }
    async fn stop(&self, _transcribe_id: Uuid) -> Result<()> {
        Ok(())
    }
}

#[async_trait::async_trait]
impl TtsStreaming for NoopServices {
    async fn create(&self, _req: &TtsRequest) -> Result<TtsSession> {
        Ok(TtsSession {
            id: Uuid::new_v4(),
            pod_id: "pod-0".into(),
        })
    }
    async fn say(&self, _pod_id: &str, _streaming_id: Uuid, _message_id: Uuid, _text: &str) -> Result<()> {
        Ok(())
    }
    async fn say_add(&self, _pod_id: &str, _streaming_id: Uuid, _message_id: Uuid, _text: &str) -> Result<()> {
        Ok(())
    }
    async fn say_stop(&self, _pod_id: &str, _streaming_id: Uuid) -> Result<()> {
        Ok(())
    }
    async fn delete(&self, _pod_id: &str, _streaming_id: Uuid) -> Result<()> {
        Ok(())
    }
}

#[async_trait::async_trait]
impl Workflow for NoopServices {
    async fn set_variables(&self, _activeflow_id: Uuid, _variables: &HashMap<String, String>) -> Result<()> {
        Ok(())
    }
    async fn get_variables(&self, _activeflow_id: Uuid) -> Result<HashMap<String, String>> {
        Ok(HashMap::new())
    }
    async fn substitute(&self, _activeflow_id: Uuid, template: &str) -> Result<String> {
        Ok(template.to_string())
    }
    async fn add_actions(&self, activeflow_id: Uuid, _actions: &[FlowAction]) -> Result<Uuid> {
        Ok(activeflow_id)
    }
    async fn stop(&self, activeflow_id: Uuid) -> Result<Uuid> {
        Ok(activeflow_id)
    }
}

#[async_trait::async_trait]
impl Messaging for NoopServices {
    async fn send(
        &self,
        _customer_id: Uuid,
        _source: Option<&Address>,
        _destinations: &[Address],
        _text: &str,
    ) -> Result<Uuid> {
        Ok(Uuid::new_v4())
    }
}

#[async_trait::async_trait]
impl EmailSender for NoopServices {
    async fn send(
        &self,
        _customer_id: Uuid,
        _activeflow_id: Option<Uuid>,
        _destinations: &[Address],
        _subject: &str,
        _content: &str,
    ) -> Result<Uuid> {
        Ok(Uuid::new_v4())
    }
}

#[async_trait::async_trait]
impl Notifier for NoopServices {
    async fn publish(&self, _event: &WebhookEvent) -> Result<()> {
        Ok(())
    }
}

fn test_state(token: Option<&str>) -> AppState {
    let mut engines = EngineRegistry::new();
    engines.register(Arc::new(EchoEngine));
    assemble(
        Arc::new(Config::default()),
        Arc::new(MemoryPersistence::new()),
        Arc::new(engines),
        Services::uniform(Arc::new(NoopServices)),
        token.map(hash_token),
        CancellationToken::new(),
    )
}

fn app(state: AppState) -> Router {
    api::router(state.clone()).with_state(state)
}

async fn call(app: &Router, method: Method, uri: &str, token: Option<&str>, body: Option<Value>) -> (StatusCode, Value) {
    let mut req = Request::builder().method(method).uri(uri);
    if let Some(t) = token {
        req = req.header(header::AUTHORIZATION, format!("Bearer {t}"));
    }
    let req = match body {
        Some(b) => req
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(b.to_string()))
            .unwrap(),
        None => req.body(Body::empty()).unwrap(),
    };
    let resp = app.clone().oneshot(req).await.unwrap();
    let status = resp.status();
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

async fn create_ai(app: &Router, init_prompt: &str) -> Value {
    let (status, ai) = call(
        app,
        Method::POST,
        "/v1/ais",
        None,
        Some(json!({
            "customer_id": Uuid::new_v4(),
            "name": "support",
            "engine_type": "chatbot",
            "engine_model": "openai.gpt-4o",
            "init_prompt": init_prompt,
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{ai}");
    ai
}

// ── tests ───────────────────────────────────────────────────────────

#[tokio::test]
async fn health_is_public_when_auth_enabled() {
    let app = app(test_state(Some("secret")));
    let (status, body) = call(&app, Method::GET, "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["engines"], json!(["openai"]));
}

#[tokio::test]
async fn protected_routes_require_bearer_token() {
    let app = app(test_state(Some("secret")));

    let (status, body) = call(&app, Method::GET, "/v1/metrics", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(body["error"].is_string());

    let (status, _) = call(&app, Method::GET, "/v1/metrics", Some("wrong"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = call(&app, Method::GET, "/v1/metrics", Some("secret"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["turns"], 0);
}

#[tokio::test]
async fn ai_with_unserved_engine_is_rejected() {
    let app = app(test_state(None));
    let (status, body) = call(
        &app,
        Method::POST,
        "/v1/ais",
        None,
        Some(json!({
            "customer_id": Uuid::new_v4(),
            "engine_model": "dialogflow.cx",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("dialogflow"));
}

#[tokio::test]
async fn unknown_aicall_is_not_found() {
    let app = app(test_state(None));
    let uri = format!("/v1/aicalls/{}", Uuid::new_v4());
    let (status, body) = call(&app, Method::GET, &uri, None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn conversation_round_trip() {
    let state = test_state(None);
    let app = app(state.clone());
    let ai = create_ai(&app, "You are a support agent.").await;

    let (status, aicall) = call(
        &app,
        Method::POST,
        "/v1/aicalls",
        None,
        Some(json!({
            "ai_id": ai["id"],
            "reference_type": "conversation",
            "reference_id": Uuid::new_v4(),
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{aicall}");
    assert_eq!(aicall["status"], "progressing");
    let id = aicall["id"].as_str().unwrap().to_string();

    let (status, reply) = call(
        &app,
        Method::POST,
        &format!("/v1/aicalls/{id}/messages"),
        None,
        Some(json!({ "text": "hello", "return_response": true })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{reply}");
    assert_eq!(reply["role"], "assistant");
    assert_eq!(reply["content"], "echo: hello");

    let (status, page) = call(&app, Method::GET, &format!("/v1/aicalls/{id}/messages"), None, None).await;
    assert_eq!(status, StatusCode::OK);
    let roles: Vec<&str> = page["result"]
        .as_array()
        .unwrap()
        .iter()
        .map(|m| m["role"].as_str().unwrap())
        .collect();
    // Newest first.
    assert_eq!(roles, ["assistant", "user", "system"]);

    let (status, outcome) = call(&app, Method::POST, &format!("/v1/aicalls/{id}/terminate"), None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(outcome["aicall"]["status"], "terminated");
    assert_eq!(outcome["warnings"], json!([]));

    let (status, _) = call(
        &app,
        Method::POST,
        &format!("/v1/aicalls/{id}/messages"),
        None,
        Some(json!({ "text": "still there?" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = call(&app, Method::POST, &format!("/v1/aicalls/{id}/pause"), None, None).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let snapshot = state.metrics.snapshot();
    assert_eq!(snapshot.turns, 1);
    assert_eq!(snapshot.engine_requests.get("openai"), Some(&1));
}

#[tokio::test]
async fn empty_turn_text_is_rejected() {
    let app = app(test_state(None));
    let ai = create_ai(&app, "").await;
    let (_, aicall) = call(
        &app,
        Method::POST,
        "/v1/aicalls",
        None,
        Some(json!({ "ai_id": ai["id"], "reference_type": "conversation" })),
    )
    .await;
    let id = aicall["id"].as_str().unwrap();
    let (status, _) = call(
        &app,
        Method::POST,
        &format!("/v1/aicalls/{id}/messages"),
        None,
        Some(json!({ "text": "   " })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}
