use serde::Serialize;

/// Structured trace events emitted across all aicall crates.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event")]
pub enum TraceEvent {
    AicallCreated {
        aicall_id: String,
        reference_type: String,
        engine_model: String,
    },
    AicallTransition {
        aicall_id: String,
        from: String,
        to: String,
    },
    CleanupFailed {
        aicall_id: String,
        step: String,
        error: String,
    },
    EngineRequest {
        engine: String,
        model: String,
        streaming: bool,
        duration_ms: u64,
        attempts: u32,
    },
    ToolExecuted {
        aicall_id: String,
        tool_call_id: String,
        name: String,
        success: bool,
    },
    TurnCompleted {
        aicall_id: String,
        sentences: usize,
        tool_calls: usize,
        spoken_chars: usize,
        duration_ms: u64,
        timed_out: bool,
    },
}

impl TraceEvent {
    pub fn emit(&self) {
        let json = serde_json::to_string(self).unwrap_or_default();
        tracing::info!(trace_event = %json, "ac_event");
    }
}
