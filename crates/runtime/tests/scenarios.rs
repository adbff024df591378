mod common;

use std::time::Duration;

use ac_domain::action::FlowActionType;
use ac_domain::aicall::{AicallStatus, Gender, ReferenceType};
use ac_domain::config::AicallConfig;
use ac_domain::error::Error;
use ac_domain::event::EventType;
use ac_domain::message::{FunctionCall, Message, Role, ToolType};
use ac_runtime::{CleanupStep, ToolResult, ToolStatus};
use uuid::Uuid;

use common::{harness, quick_config, Harness, Script};

async fn start_call(h: &Harness, init_prompt: &str) -> ac_domain::aicall::Aicall {
    let ai = h.ai(init_prompt).await;
    let outcome = h
        .handler
        .start(
            ai.id,
            Some(Uuid::new_v4()),
            ReferenceType::Call,
            Some(Uuid::new_v4()),
            Gender::Female,
            "en-US",
        )
        .await
        .unwrap();
    outcome.init.expect("call start spawns init").join().await.unwrap()
}

async fn start_conversation(h: &Harness, activeflow: Option<Uuid>) -> ac_domain::aicall::Aicall {
    start_conversation_with(h, "", activeflow).await
}

async fn start_conversation_with(
    h: &Harness,
    init_prompt: &str,
    activeflow: Option<Uuid>,
) -> ac_domain::aicall::Aicall {
    let ai = h.ai(init_prompt).await;
    let outcome = h
        .handler
        .start(
            ai.id,
            activeflow,
            ReferenceType::Conversation,
            Some(Uuid::new_v4()),
            Gender::Neutral,
            "en-US",
        )
        .await
        .unwrap();
    assert!(outcome.init.is_none());
    outcome.aicall
}

async fn wait_for_status(h: &Harness, id: Uuid, status: AicallStatus) {
    for _ in 0..200 {
        if h.handler.get(id).await.unwrap().status == status {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("aicall {id} never reached {status}");
}

/// Every tool message answers exactly one earlier assistant tool call.
fn assert_tool_pairs(ledger: &[Message]) {
    for (i, msg) in ledger.iter().enumerate() {
        if msg.role != Role::Tool {
            continue;
        }
        let id = msg.tool_call_id.as_deref().expect("tool message carries its call id");
        let requests = ledger[..i]
            .iter()
            .filter(|m| m.role == Role::Assistant && m.tool_calls.iter().any(|tc| tc.id == id))
            .count();
        assert_eq!(requests, 1, "tool result {id} must follow exactly one request");
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Start-up
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[tokio::test]
async fn call_start_initializes_in_background() {
    let h = harness(true, quick_config());
    h.engine.say("Hello, how can I help?");
    let ai = h.ai("You are a helpful assistant.").await;
    let activeflow = Uuid::new_v4();

    let outcome = h
        .handler
        .start(
            ai.id,
            Some(activeflow),
            ReferenceType::Call,
            Some(Uuid::new_v4()),
            Gender::Female,
            "en-US",
        )
        .await
        .unwrap();
    assert!(outcome.aicall.confbridge_id.is_some());
    assert_eq!(outcome.aicall.engine_model, ai.engine_model);

    let aicall = outcome.init.unwrap().join().await.unwrap();
    assert_eq!(aicall.status, AicallStatus::Progressing);
    assert!(aicall.transcribe_id.is_some());
    assert!(aicall.tts_stream().is_some());

    let ledger = h.messages(aicall.id).await;
    let roles: Vec<_> = ledger.iter().map(|m| m.role).collect();
    assert_eq!(roles, vec![Role::System, Role::Assistant]);
    assert_eq!(ledger[0].content, "You are a helpful assistant.");
    assert_eq!(ledger[1].content, "Hello, how can I help?");
    assert_eq!(*h.services.spoken.lock(), vec!["Hello, how can I help?".to_string()]);

    let vars = h.services.variables.lock().clone();
    assert_eq!(vars["voipbin.aicall.id"], aicall.id.to_string());
    assert_eq!(vars["voipbin.aicall.ai_engine_model"], "openai.gpt-4o");

    let ops = h.services.ops();
    let pos = |op: &str| ops.iter().position(|o| o == op).unwrap();
    assert!(pos("confbridge_create") < pos("tts_create"));
    assert!(pos("tts_create") < pos("transcribe_start"));
    assert!(pos("transcribe_start") < pos("tts_say_stop"));

    let kinds = h.services.event_kinds();
    assert!(kinds.contains(&EventType::AicallInitializing));
    assert!(kinds.contains(&EventType::AicallProgressing));
}

#[tokio::test]
async fn conversation_start_is_synchronous() {
    let mut config = quick_config();
    config.default_init_prompt = "Be brief.".into();
    let h = harness(false, config);

    let aicall = start_conversation(&h, None).await;
    assert_eq!(aicall.status, AicallStatus::Progressing);
    assert!(aicall.transcribe_id.is_none());
    assert!(!h.services.called("transcribe_start"));

    let ledger = h.messages(aicall.id).await;
    assert_eq!(ledger.len(), 1);
    assert_eq!(ledger[0].role, Role::System);
    assert_eq!(ledger[0].content, "Be brief.");
}

#[tokio::test]
async fn failed_init_terminates_the_aicall() {
    let h = harness(true, quick_config());
    h.services.fail("tts_create");
    let ai = h.ai("hi").await;

    let outcome = h
        .handler
        .start(ai.id, None, ReferenceType::Call, Some(Uuid::new_v4()), Gender::Male, "en-US")
        .await
        .unwrap();
    let id = outcome.aicall.id;
    let err = outcome.init.unwrap().join().await.unwrap_err();
    assert!(matches!(err, Error::Service { .. }));
    assert_eq!(h.handler.get(id).await.unwrap().status, AicallStatus::Terminated);
}

#[tokio::test]
async fn call_start_without_reference_is_rejected() {
    let h = harness(true, quick_config());
    let ai = h.ai("").await;
    let err = h
        .handler
        .start(ai.id, None, ReferenceType::Call, None, Gender::Male, "en-US")
        .await
        .err()
        .unwrap();
    assert!(matches!(err, Error::Validation(_)));
    assert!(!h.services.called("confbridge_create"));
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Transitions
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[tokio::test]
async fn end_completes_despite_cleanup_failures() {
    let h = harness(true, quick_config());
    let aicall = start_call(&h, "").await;
    h.services.fail("transcribe_stop");
    h.services.fail("confbridge_terminate");

    let outcome = h.handler.process_end(aicall.id).await.unwrap();
    assert_eq!(outcome.aicall.status, AicallStatus::Terminated);
    assert!(outcome.aicall.transcribe_id.is_none());
    assert!(outcome.aicall.tm_end.is_some());
    assert!(outcome.aicall.check_resources().is_ok());
    let steps: Vec<_> = outcome.warnings.iter().map(|w| w.step).collect();
    assert_eq!(
        steps,
        vec![CleanupStep::TranscribeStop, CleanupStep::ConfbridgeTerminate]
    );
    assert!(h.services.called("tts_delete"));

    let snap = h.handler.metrics().snapshot();
    assert_eq!(snap.cleanup_warnings["transcribe_stop"], 1);
    assert_eq!(snap.transitions["terminated"], 1);
}

#[tokio::test]
async fn transitions_are_idempotent_and_checked() {
    let h = harness(true, quick_config());
    let aicall = start_call(&h, "").await;
    let id = aicall.id;

    let progressing_events = |h: &Harness| {
        h.services
            .event_kinds()
            .into_iter()
            .filter(|k| *k == EventType::AicallProgressing)
            .count()
    };
    let before = progressing_events(&h);
    let again = h.handler.process_start(id).await.unwrap();
    assert_eq!(again.status, AicallStatus::Progressing);
    assert_eq!(progressing_events(&h), before);

    let paused = h.handler.process_pause(id).await.unwrap();
    assert!(paused.is_clean());
    assert_eq!(paused.aicall.status, AicallStatus::Pausing);
    assert!(paused.aicall.transcribe_id.is_none());
    assert_eq!(
        h.handler.process_pause(id).await.unwrap().aicall.status,
        AicallStatus::Pausing
    );

    let resumed = h.handler.process_resume(id).await.unwrap();
    assert_eq!(resumed.status, AicallStatus::Progressing);
    assert!(resumed.transcribe_id.is_some());

    h.handler.process_end(id).await.unwrap();
    let err = h.handler.process_pause(id).await.unwrap_err();
    assert!(matches!(err, Error::InvalidTransition { .. }));
    let err = h.handler.process_start(id).await.unwrap_err();
    assert!(matches!(err, Error::InvalidTransition { .. }));

    let ops_before = h.services.ops().len();
    let end_again = h.handler.process_end(id).await.unwrap();
    assert_eq!(end_again.aicall.status, AicallStatus::Terminated);
    assert_eq!(h.services.ops().len(), ops_before);
}

#[tokio::test]
async fn delete_terminates_live_aicall() {
    let h = harness(false, quick_config());
    let aicall = start_conversation(&h, None).await;
    let reference_id = aicall.reference_id.unwrap();
    assert_eq!(h.handler.get_by_reference_id(reference_id).await.unwrap().id, aicall.id);

    let deleted = h.handler.delete(aicall.id).await.unwrap();
    assert!(deleted.is_deleted());
    assert_eq!(deleted.status, AicallStatus::Terminated);
    assert!(h.services.event_kinds().contains(&EventType::AicallDeleted));
    assert!(h
        .handler
        .get_by_reference_id(reference_id)
        .await
        .unwrap_err()
        .is_not_found());
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tools
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[tokio::test]
async fn connect_pushes_action_then_terminates() {
    let h = harness(true, quick_config());
    let aicall = start_call(&h, "").await;
    h.engine.call_tool(
        "Transferring you now.",
        "call_1",
        "connect",
        r#"{"destinations":[{"type":"tel","target":"+11111111"}]}"#,
    );

    h.handler
        .send(aicall.id, Role::User, "put me through", false)
        .await
        .unwrap();

    let actions = h.services.actions.lock().clone();
    assert_eq!(actions.len(), 1);
    assert_eq!(Some(actions[0].0), aicall.activeflow_id);
    assert_eq!(actions[0].1.kind, FlowActionType::Connect);

    let ledger = h.messages(aicall.id).await;
    assert_tool_pairs(&ledger);
    let tool = ledger.iter().find(|m| m.role == Role::Tool).unwrap();
    let result: ToolResult = serde_json::from_str(&tool.content).unwrap();
    assert_eq!(result.tool_call_id, "call_1");
    assert_eq!(result.result, ToolStatus::Success);
    assert_eq!(result.resource_type, "activeflow");

    wait_for_status(&h, aicall.id, AicallStatus::Terminated).await;
}

#[tokio::test]
async fn stop_service_terminates_synchronously() {
    let h = harness(false, quick_config());
    let aicall = start_conversation(&h, None).await;

    let resp = h
        .handler
        .dispatch(aicall.id, "call_2", ToolType::Function, FunctionCall::new("stop_service", ""))
        .await
        .unwrap();
    assert!(resp.terminating);
    assert_eq!(resp.payload["result"], "success");
    assert_eq!(h.handler.get(aicall.id).await.unwrap().status, AicallStatus::Terminated);
}

#[tokio::test]
async fn message_send_round_trip_is_replayed() {
    let h = harness(false, quick_config());
    let aicall = start_conversation(&h, None).await;
    h.engine.call_tool(
        "Sending it now.",
        "call_9",
        "message_send",
        r#"{"destinations":[{"type":"tel","target":"+12025550100"}],"text":"your code is 1234"}"#,
    );

    let reply = h
        .handler
        .send(aicall.id, Role::User, "text me the code", true)
        .await
        .unwrap();
    assert_eq!(reply.role, Role::Assistant);
    assert_eq!(reply.content, "Sending it now.");
    assert!(h.services.called("message_send"));

    let ledger = h.messages(aicall.id).await;
    let roles: Vec<_> = ledger.iter().map(|m| m.role).collect();
    assert_eq!(
        roles,
        vec![Role::User, Role::Assistant, Role::Tool, Role::Assistant]
    );
    assert_tool_pairs(&ledger);

    h.engine.say("Anything else?");
    h.handler
        .send(aicall.id, Role::User, "no thanks", false)
        .await
        .unwrap();
    let replayed = h.engine.histories.lock().last().cloned().unwrap();
    assert!(replayed
        .iter()
        .any(|m| m.role == Role::Tool && m.tool_call_id.as_deref() == Some("call_9")));
    assert_eq!(replayed.last().unwrap().content, "no thanks");
    assert_eq!(
        h.handler.get(aicall.id).await.unwrap().status,
        AicallStatus::Progressing
    );
}

#[tokio::test]
async fn unknown_tool_records_request_only() {
    let h = harness(false, quick_config());
    let aicall = start_conversation(&h, None).await;

    let err = h
        .handler
        .dispatch(
            aicall.id,
            "call_x",
            ToolType::Function,
            FunctionCall::new("launch_rockets", "{}"),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, Error::UnknownTool(ref name) if name == "launch_rockets"));

    let ledger = h.messages(aicall.id).await;
    assert_eq!(ledger.len(), 1);
    assert_eq!(ledger[0].role, Role::Assistant);
    assert_eq!(ledger[0].tool_calls[0].id, "call_x");
    assert!(ledger.iter().all(|m| m.role != Role::Tool));
}

#[tokio::test]
async fn unknown_tool_does_not_abort_turn() {
    let h = harness(false, quick_config());
    let aicall = start_conversation(&h, None).await;
    h.engine.call_tool("Okay.", "call_y", "launch_rockets", "{}");

    let reply = h
        .handler
        .send(aicall.id, Role::User, "go", true)
        .await
        .unwrap();
    assert_eq!(reply.content, "Okay.");
}

#[tokio::test]
async fn stop_media_needs_a_call() {
    let h = harness(false, quick_config());
    let aicall = start_conversation(&h, None).await;

    let resp = h
        .handler
        .dispatch(aicall.id, "call_m", ToolType::Function, FunctionCall::new("stop_media", "{}"))
        .await
        .unwrap();
    assert!(!resp.terminating);
    assert_eq!(resp.payload["result"], "failed");
    assert!(!h.services.called("media_stop"));
}

#[tokio::test]
async fn connect_without_activeflow_fails_softly() {
    let h = harness(false, quick_config());
    let aicall = start_conversation(&h, None).await;

    let resp = h
        .handler
        .dispatch(
            aicall.id,
            "call_c",
            ToolType::Function,
            FunctionCall::new("connect", r#"{"destinations":[]}"#),
        )
        .await
        .unwrap();
    assert!(!resp.terminating);
    assert_eq!(resp.payload["result"], "failed");
    assert_eq!(h.handler.get(aicall.id).await.unwrap().status, AicallStatus::Progressing);
}

#[tokio::test]
async fn aicall_messages_are_scoped_to_customer() {
    let h = harness(false, quick_config());
    let mine = start_conversation(&h, None).await;
    let theirs = start_conversation(&h, None).await;
    assert_ne!(mine.customer_id, theirs.customer_id);

    let args = format!(r#"{{"aicall_id":"{}"}}"#, theirs.id);
    let resp = h
        .handler
        .dispatch(mine.id, "call_a", ToolType::Function, FunctionCall::new("get_aicall_messages", args))
        .await
        .unwrap();
    assert_eq!(resp.payload["result"], "failed");

    let args = format!(r#"{{"aicall_id":"{}"}}"#, mine.id);
    let resp = h
        .handler
        .dispatch(mine.id, "call_b", ToolType::Function, FunctionCall::new("get_aicall_messages", args))
        .await
        .unwrap();
    assert_eq!(resp.payload["result"], "success");
    let listed: Vec<Message> =
        serde_json::from_str(resp.payload["message"].as_str().unwrap()).unwrap();
    assert!(!listed.is_empty());
}

#[tokio::test]
async fn variables_tools_use_the_activeflow() {
    let h = harness(false, quick_config());
    let aicall = start_conversation(&h, Some(Uuid::new_v4())).await;

    let resp = h
        .handler
        .dispatch(
            aicall.id,
            "call_s",
            ToolType::Function,
            FunctionCall::new("set_variables", r#"{"variables":{"customer.tier":"gold"}}"#),
        )
        .await
        .unwrap();
    assert_eq!(resp.payload["result"], "success");

    let resp = h
        .handler
        .dispatch(aicall.id, "call_g", ToolType::Function, FunctionCall::new("get_variables", ""))
        .await
        .unwrap();
    let body = resp.payload["message"].as_str().unwrap();
    assert!(body.contains("customer.tier"));
}

#[tokio::test]
async fn terminating_tool_skips_the_rest_of_the_reply() {
    let h = harness(false, quick_config());
    let aicall = start_conversation(&h, None).await;
    h.engine.call_tools(
        "Goodbye.",
        &[
            ("call_a", "stop_service", ""),
            (
                "call_b",
                "message_send",
                r#"{"destinations":[{"type":"tel","target":"+12025550100"}],"text":"bye"}"#,
            ),
        ],
    );

    h.handler
        .send(aicall.id, Role::User, "that's all", false)
        .await
        .unwrap();
    assert!(!h.services.called("message_send"));
    assert_eq!(h.handler.get(aicall.id).await.unwrap().status, AicallStatus::Terminated);

    let ledger = h.messages(aicall.id).await;
    assert!(ledger.iter().all(|m| m.tool_call_id.as_deref() != Some("call_b")));
    assert!(ledger
        .iter()
        .any(|m| m.role == Role::Tool && m.tool_call_id.as_deref() == Some("call_a")));
    assert_tool_pairs(&ledger);
}

#[tokio::test]
async fn streaming_terminating_tool_skips_the_rest_of_the_reply() {
    let h = harness(true, quick_config());
    let aicall = start_call(&h, "").await;
    h.engine.call_tools(
        "Goodbye.",
        &[
            ("call_a", "stop_service", ""),
            (
                "call_b",
                "message_send",
                r#"{"destinations":[{"type":"tel","target":"+12025550100"}],"text":"bye"}"#,
            ),
        ],
    );

    h.handler
        .send(aicall.id, Role::User, "that's all", false)
        .await
        .unwrap();
    assert!(!h.services.called("message_send"));
    assert_eq!(h.handler.get(aicall.id).await.unwrap().status, AicallStatus::Terminated);
    let ledger = h.messages(aicall.id).await;
    assert!(ledger.iter().all(|m| m.tool_call_id.as_deref() != Some("call_b")));
}

/// Tool ops recorded after `from`, restricted to the given names.
fn tool_ops_since(h: &Harness, from: usize, names: &[&str]) -> Vec<String> {
    h.services.ops()[from..]
        .iter()
        .filter(|op| names.contains(&op.as_str()))
        .cloned()
        .collect()
}

const ORDERED_TOOLS: [(&str, &str, &str); 3] = [
    ("call_1", "set_variables", r#"{"variables":{"customer.tier":"gold"}}"#),
    (
        "call_2",
        "message_send",
        r#"{"destinations":[{"type":"tel","target":"+12025550100"}],"text":"welcome"}"#,
    ),
    ("call_3", "get_variables", ""),
];

#[tokio::test]
async fn tools_run_in_arrival_order() {
    let h = harness(false, quick_config());
    let aicall = start_conversation(&h, Some(Uuid::new_v4())).await;
    h.engine.call_tools("Done.", &ORDERED_TOOLS);

    let before = h.services.ops().len();
    h.handler
        .send(aicall.id, Role::User, "upgrade me", false)
        .await
        .unwrap();
    assert_eq!(
        tool_ops_since(&h, before, &["set_variables", "message_send", "get_variables"]),
        ["set_variables", "message_send", "get_variables"]
    );

    let ledger = h.messages(aicall.id).await;
    let results: Vec<_> = ledger
        .iter()
        .filter(|m| m.role == Role::Tool)
        .filter_map(|m| m.tool_call_id.as_deref())
        .collect();
    assert_eq!(results, ["call_1", "call_2", "call_3"]);
    assert_tool_pairs(&ledger);
}

#[tokio::test]
async fn streaming_tools_run_in_arrival_order() {
    let h = harness(true, quick_config());
    let aicall = start_call(&h, "").await;
    h.engine.call_tools("Done.", &ORDERED_TOOLS);

    let before = h.services.ops().len();
    h.handler
        .send(aicall.id, Role::User, "upgrade me", false)
        .await
        .unwrap();
    assert_eq!(
        tool_ops_since(&h, before, &["set_variables", "message_send", "get_variables"]),
        ["set_variables", "message_send", "get_variables"]
    );
    assert_eq!(
        h.handler.get(aicall.id).await.unwrap().status,
        AicallStatus::Progressing
    );
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Turns
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[tokio::test(start_paused = true)]
async fn streaming_turn_times_out() {
    let config = AicallConfig {
        turn_timeout_secs: 5,
        ..quick_config()
    };
    let h = harness(true, config);
    let aicall = start_call(&h, "").await;
    h.engine.push(Script::Hang);

    let err = h
        .handler
        .send(aicall.id, Role::User, "hello?", false)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Timeout(_)));

    let ledger = h.messages(aicall.id).await;
    assert_eq!(ledger.last().unwrap().content, "hello?");
    assert_eq!(h.handler.metrics().snapshot().turn_timeouts, 1);
    assert_eq!(
        h.handler.get(aicall.id).await.unwrap().status,
        AicallStatus::Progressing
    );
}

#[tokio::test]
async fn long_conversation_replays_the_whole_ledger() {
    let config = AicallConfig {
        history_limit: 4,
        ..quick_config()
    };
    let h = harness(false, config);
    let aicall = start_conversation_with(&h, "You are the front desk.", None).await;

    for i in 0..12 {
        h.engine.say(&format!("reply {i}"));
        h.handler
            .send(aicall.id, Role::User, &format!("question {i}"), false)
            .await
            .unwrap();
    }

    let replayed = h.engine.histories.lock().last().cloned().unwrap();
    assert_eq!(replayed.len(), 1 + 11 * 2 + 1);
    assert_eq!(replayed[0].role, Role::System);
    assert_eq!(replayed[0].content, "You are the front desk.");
    assert_eq!(replayed[1].content, "question 0");
    assert_eq!(replayed.last().unwrap().content, "question 11");
    assert_eq!(h.messages(aicall.id).await.len(), 1 + 12 * 2);
}

#[tokio::test]
async fn replayed_history_keeps_tool_results_with_their_requests() {
    let config = AicallConfig {
        history_limit: 3,
        ..quick_config()
    };
    let h = harness(false, config);
    let aicall = start_conversation_with(&h, "You are the front desk.", Some(Uuid::new_v4())).await;

    h.engine.call_tool(
        "Noted.",
        "call_v",
        "set_variables",
        r#"{"variables":{"customer.tier":"gold"}}"#,
    );
    h.handler
        .send(aicall.id, Role::User, "I'm a gold member", false)
        .await
        .unwrap();
    for text in ["what's my tier?", "thanks"] {
        h.engine.say("Sure.");
        h.handler.send(aicall.id, Role::User, text, false).await.unwrap();
    }

    let histories = h.engine.histories.lock().clone();
    assert_eq!(histories.len(), 3);
    for replayed in &histories {
        assert_eq!(replayed[0].role, Role::System);
        assert!(replayed.first().is_some_and(|m| m.role != Role::Tool));
        assert_tool_pairs(replayed);
    }
    let last = histories.last().unwrap();
    assert!(last
        .iter()
        .any(|m| m.role == Role::Tool && m.tool_call_id.as_deref() == Some("call_v")));
    assert_eq!(last.last().unwrap().content, "thanks");
}

#[tokio::test]
async fn say_stop_failure_aborts_turn() {
    let h = harness(true, quick_config());
    let aicall = start_call(&h, "").await;
    h.services.fail("tts_say_stop");

    let err = h
        .handler
        .send(aicall.id, Role::User, "hello", false)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Service { .. }));
    assert!(h.messages(aicall.id).await.is_empty());
}

#[tokio::test]
async fn terminated_aicall_rejects_turns() {
    let h = harness(false, quick_config());
    let aicall = start_conversation(&h, None).await;
    h.handler.process_end(aicall.id).await.unwrap();

    let err = h
        .handler
        .send(aicall.id, Role::User, "hello", false)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Validation(_)));
}

#[tokio::test]
async fn ai_validation_uses_registered_engines() {
    let h = harness(false, quick_config());
    let ai = h.ai("").await;
    let mut fields = ac_domain::ai::AiFields {
        customer_id: ai.customer_id,
        name: ai.name.clone(),
        detail: String::new(),
        engine_type: ai.engine_type,
        engine_model: "dialogflow.cx".into(),
        engine_data: Default::default(),
        init_prompt: String::new(),
        tts_type: String::new(),
        tts_voice_id: String::new(),
        stt_type: String::new(),
    };
    assert!(matches!(
        h.ais.update(ai.id, fields.clone()).await.unwrap_err(),
        Error::Validation(_)
    ));
    fields.engine_model = "openai".into();
    assert!(matches!(h.ais.create(fields.clone()).await.unwrap_err(), Error::Validation(_)));
    fields.engine_model = "openai.gpt-4o-mini".into();
    let updated = h.ais.update(ai.id, fields).await.unwrap();
    assert_eq!(updated.engine_model.model(), "gpt-4o-mini");
}
