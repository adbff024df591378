//! `aicall engine check`: one synchronous round trip against a configured
//! engine, outside any stored session.

use std::sync::Arc;

use ac_domain::aicall::{Aicall, AicallStatus, EngineType, Gender, ReferenceType};
use ac_domain::config::Config;
use ac_domain::message::{Direction, Message, Role};
use ac_engines::EngineRegistry;
use chrono::Utc;
use uuid::Uuid;

/// Resolve `model`, send `prompt` as a single user message, and print the
/// reply.
pub async fn check(config: Arc<Config>, model: String, prompt: String, json: bool) -> anyhow::Result<()> {
    let registry = EngineRegistry::from_config(&config.engines);
    let engine_model = registry.validate_model(&model)?;
    let engine = registry.resolve(&engine_model)?;

    let aicall = check_aicall(engine_model);
    let history = vec![Message {
        id: Uuid::new_v4(),
        customer_id: aicall.customer_id,
        aicall_id: aicall.id,
        direction: Direction::Outgoing,
        role: Role::User,
        content: prompt,
        tool_calls: Vec::new(),
        tool_call_id: None,
        tm_create: Some(Utc::now()),
        tm_delete: None,
    }];

    let started = std::time::Instant::now();
    let reply = engine.message_send(&aicall, &history).await?;
    let elapsed_ms = started.elapsed().as_millis() as u64;
    tracing::debug!(target_engine = %engine.target(), elapsed_ms, "engine check finished");

    if json {
        let out = serde_json::json!({
            "model": aicall.engine_model,
            "content": reply.content,
            "tool_calls": reply.tool_calls,
            "elapsed_ms": elapsed_ms,
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
    } else {
        println!("{}", reply.content);
        for call in &reply.tool_calls {
            println!("[tool] {} {}", call.function.name, call.function.arguments);
        }
    }
    Ok(())
}

/// A throwaway conversation-bound session; never persisted.
fn check_aicall(engine_model: ac_domain::engine::EngineModel) -> Aicall {
    let now = Utc::now();
    Aicall {
        id: Uuid::new_v4(),
        customer_id: Uuid::nil(),
        ai_id: Uuid::nil(),
        engine_type: EngineType::Chatbot,
        engine_model,
        engine_data: Default::default(),
        tts_type: String::new(),
        tts_voice_id: String::new(),
        stt_type: String::new(),
        activeflow_id: None,
        reference_type: ReferenceType::Conversation,
        reference_id: None,
        confbridge_id: None,
        pipecatcall_id: None,
        tts_streaming_id: None,
        tts_streaming_pod_id: None,
        transcribe_id: None,
        status: AicallStatus::Progressing,
        gender: Gender::default(),
        language: "en-US".into(),
        tm_create: Some(now),
        tm_update: Some(now),
        tm_end: None,
        tm_delete: None,
    }
}
