use ac_domain::aicall::Aicall;
use ac_domain::engine::EngineTarget;
use ac_domain::error::Result;
use ac_domain::message::{Message, ToolCall};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Request / Response types
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// A complete assistant reply from a synchronous engine call.
///
/// An empty `content` with no tool calls is a legal reply.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EngineReply {
    pub content: String,
    pub tool_calls: Vec<ToolCall>,
}

/// Per-turn streaming knobs supplied by the conversation controller.
#[derive(Debug, Clone)]
pub struct StreamOptions {
    /// Cancelling this token makes the pump close both channels promptly.
    pub cancel: CancellationToken,
    pub channel_capacity: usize,
}

impl Default for StreamOptions {
    fn default() -> Self {
        Self {
            cancel: CancellationToken::new(),
            channel_capacity: 64,
        }
    }
}

/// Live output of one streaming turn.
///
/// Both receivers yield `None` once the pump task exits, which happens on
/// end-of-stream, stream error, or cancellation.
pub struct StreamingReply {
    pub sentences: mpsc::Receiver<String>,
    pub tools: mpsc::Receiver<ToolCall>,
    pub task: JoinHandle<()>,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Core adapter trait
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Trait every engine adapter implements.
///
/// `history` is always in chronological order (oldest first).
#[async_trait::async_trait]
pub trait EngineAdapter: Send + Sync {
    /// The registry slot this adapter serves.
    fn target(&self) -> EngineTarget;

    /// Whether [`streaming_send`](Self::streaming_send) streams natively.
    fn supports_streaming(&self) -> bool {
        false
    }

    /// Send the conversation and wait for the full reply.
    async fn message_send(&self, aicall: &Aicall, history: &[Message]) -> Result<EngineReply>;

    /// Send the conversation and stream the reply as sentences and tool
    /// calls.
    ///
    /// The default implementation runs [`message_send`](Self::message_send)
    /// and replays the reply through the same channel contract.
    async fn streaming_send(
        &self,
        aicall: &Aicall,
        history: &[Message],
        opts: StreamOptions,
    ) -> Result<StreamingReply> {
        let reply = self.message_send(aicall, history).await?;
        Ok(crate::pump::spawn_replay(reply, opts))
    }
}
