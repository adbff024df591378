//! Sentence / tool-call splitter for engine delta streams.
//!
//! A small explicit state machine turns raw [`StreamEvent`]s into two kinds
//! of output: complete sentences for TTS playback, and fully assembled tool
//! calls for the dispatcher. It has no I/O so it can be driven directly in
//! tests.
//!
//! Flush rules:
//! - text is emitted when a delta contains a sentence boundary
//!   (`.` `?` `!` `\n`) and the buffer holds non-whitespace text;
//! - pending text is emitted before a tool call starts, so relative order
//!   between sentences and tool calls is preserved;
//! - a tool call is emitted when the next tool call starts, when text
//!   resumes, or when the stream finishes;
//! - [`Splitter::finish`] flushes whatever is still buffered.

use ac_domain::message::{FunctionCall, ToolCall, ToolType};
use ac_domain::stream::StreamEvent;

const SENTENCE_BOUNDARIES: [char; 4] = ['.', '?', '!', '\n'];

/// One unit of splitter output.
#[derive(Debug, Clone, PartialEq)]
pub enum SplitOutput {
    Sentence(String),
    Tool(ToolCall),
}

#[derive(Debug, Clone, PartialEq)]
struct PendingTool {
    id: String,
    name: String,
    arguments: String,
}

#[derive(Debug, Clone, PartialEq)]
enum State {
    AccumulatingText { buf: String },
    AccumulatingTool { tool: PendingTool },
}

/// Streaming splitter. Feed events with [`push`](Self::push), then call
/// [`finish`](Self::finish) once at end-of-stream.
#[derive(Debug)]
pub struct Splitter {
    state: State,
}

impl Default for Splitter {
    fn default() -> Self {
        Self::new()
    }
}

impl Splitter {
    pub fn new() -> Self {
        Self {
            state: State::AccumulatingText { buf: String::new() },
        }
    }

    /// `true` while a tool call is being assembled.
    pub fn is_accumulating_tool(&self) -> bool {
        matches!(self.state, State::AccumulatingTool { .. })
    }

    pub fn push(&mut self, event: &StreamEvent) -> Vec<SplitOutput> {
        let mut out = Vec::new();
        match event {
            StreamEvent::Token { text } => self.on_text(text, &mut out),
            StreamEvent::ToolCallStarted { call_id, tool_name } => {
                self.on_tool_start(call_id, tool_name, &mut out)
            }
            StreamEvent::ToolCallDelta { delta, .. } => self.on_tool_delta(delta),
            StreamEvent::Done { .. } => self.flush_into(&mut out),
            StreamEvent::Error { .. } => {}
        }
        out
    }

    /// Flush buffered text and any pending tool call.
    pub fn finish(&mut self) -> Vec<SplitOutput> {
        let mut out = Vec::new();
        self.flush_into(&mut out);
        out
    }

    // ── Transitions ───────────────────────────────────────────────

    fn on_text(&mut self, text: &str, out: &mut Vec<SplitOutput>) {
        if let State::AccumulatingTool { .. } = self.state {
            self.flush_into(out);
        }
        if let State::AccumulatingText { buf } = &mut self.state {
            buf.push_str(text);
            if text.contains(SENTENCE_BOUNDARIES) {
                if let Some(sentence) = take_sentence(buf) {
                    out.push(SplitOutput::Sentence(sentence));
                }
            }
        }
    }

    fn on_tool_start(&mut self, id: &str, name: &str, out: &mut Vec<SplitOutput>) {
        self.flush_into(out);
        self.state = State::AccumulatingTool {
            tool: PendingTool {
                id: id.to_string(),
                name: name.to_string(),
                arguments: String::new(),
            },
        };
    }

    fn on_tool_delta(&mut self, delta: &str) {
        match &mut self.state {
            State::AccumulatingTool { tool } => tool.arguments.push_str(delta),
            State::AccumulatingText { .. } => {
                tracing::debug!("tool argument delta without a started tool call, ignored");
            }
        }
    }

    /// Emit whatever the current state holds and return to empty text.
    fn flush_into(&mut self, out: &mut Vec<SplitOutput>) {
        let state = std::mem::replace(
            &mut self.state,
            State::AccumulatingText { buf: String::new() },
        );
        match state {
            State::AccumulatingText { mut buf } => {
                if let Some(sentence) = take_sentence(&mut buf) {
                    out.push(SplitOutput::Sentence(sentence));
                }
            }
            State::AccumulatingTool { tool } => out.push(SplitOutput::Tool(finish_tool(tool))),
        }
    }
}

fn take_sentence(buf: &mut String) -> Option<String> {
    let sentence = buf.trim().to_string();
    buf.clear();
    (!sentence.is_empty()).then_some(sentence)
}

fn finish_tool(tool: PendingTool) -> ToolCall {
    let arguments = if tool.arguments.trim().is_empty() {
        "{}".to_string()
    } else {
        match serde_json::from_str::<serde_json::Value>(&tool.arguments) {
            Ok(v) => v.to_string(),
            Err(e) => {
                tracing::warn!(
                    tool = %tool.name,
                    call_id = %tool.id,
                    error = %e,
                    "malformed tool arguments, using empty object"
                );
                "{}".to_string()
            }
        }
    };
    ToolCall {
        id: tool.id,
        kind: ToolType::Function,
        function: FunctionCall {
            name: tool.name,
            arguments,
        },
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
