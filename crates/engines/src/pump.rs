//! The per-turn pump task.
//!
//! Exactly one task owns an engine's event stream for the duration of a
//! turn. It feeds the [`Splitter`] and forwards its output to the sentence
//! and tool channels. Dropping both senders on exit is what closes the
//! channels for the consumer.

use ac_domain::error::Result;
use ac_domain::message::ToolCall;
use ac_domain::stream::{BoxStream, StreamEvent};
use futures_util::StreamExt;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::splitter::{SplitOutput, Splitter};
use crate::traits::{EngineReply, StreamOptions, StreamingReply};

/// Spawn the pump over a live engine event stream.
pub fn spawn_stream_pump(
    engine: &'static str,
    events: BoxStream<'static, Result<StreamEvent>>,
    opts: StreamOptions,
) -> StreamingReply {
    let capacity = opts.channel_capacity.max(1);
    let (sentence_tx, sentences) = mpsc::channel(capacity);
    let (tool_tx, tools) = mpsc::channel(capacity);
    let cancel = opts.cancel;

    let task = tokio::spawn(async move {
        let mut events = events;
        let mut splitter = Splitter::new();
        let outs = Outlets {
            sentences: sentence_tx,
            tools: tool_tx,
            cancel: cancel.clone(),
        };

        loop {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    tracing::debug!(engine, "stream pump canceled");
                    return;
                }
                next = events.next() => next,
            };

            match next {
                Some(Ok(StreamEvent::Error { message })) => {
                    tracing::warn!(engine, error = %message, "engine reported stream error");
                    return;
                }
                Some(Ok(event)) => {
                    for out in splitter.push(&event) {
                        if !outs.send(out).await {
                            return;
                        }
                    }
                }
                Some(Err(e)) => {
                    tracing::warn!(engine, error = %e, "engine stream failed");
                    return;
                }
                None => break,
            }
        }

        for out in splitter.finish() {
            if !outs.send(out).await {
                return;
            }
        }
        tracing::debug!(engine, "stream pump finished");
    });

    StreamingReply {
        sentences,
        tools,
        task,
    }
}

/// Replay a complete reply through the streaming channel contract.
///
/// Used by engines without native streaming. The content goes through the
/// splitter so playback still happens sentence by sentence.
pub fn spawn_replay(reply: EngineReply, opts: StreamOptions) -> StreamingReply {
    let capacity = opts.channel_capacity.max(1);
    let (sentence_tx, sentences) = mpsc::channel(capacity);
    let (tool_tx, tools) = mpsc::channel(capacity);

    let task = tokio::spawn(async move {
        let outs = Outlets {
            sentences: sentence_tx,
            tools: tool_tx,
            cancel: opts.cancel,
        };
        let mut splitter = Splitter::new();
        let mut pending = splitter.push(&StreamEvent::Token {
            text: reply.content,
        });
        pending.extend(splitter.finish());
        pending.extend(reply.tool_calls.into_iter().map(SplitOutput::Tool));

        for out in pending {
            if !outs.send(out).await {
                return;
            }
        }
    });

    StreamingReply {
        sentences,
        tools,
        task,
    }
}

struct Outlets {
    sentences: mpsc::Sender<String>,
    tools: mpsc::Sender<ToolCall>,
    cancel: CancellationToken,
}

impl Outlets {
    /// Returns `false` once the turn is canceled or the consumer is gone.
    async fn send(&self, out: SplitOutput) -> bool {
        let sent = match out {
            SplitOutput::Sentence(s) => tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return false,
                r = self.sentences.send(s) => r.is_ok(),
            },
            SplitOutput::Tool(tc) => tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return false,
                r = self.tools.send(tc) => r.is_ok(),
            },
        };
        if !sent {
            tracing::debug!("stream consumer dropped, stopping pump");
        }
        sent
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ac_domain::error::Error;
    use ac_domain::message::FunctionCall;

    fn events(items: Vec<Result<StreamEvent>>) -> BoxStream<'static, Result<StreamEvent>> {
        Box::pin(futures_util::stream::iter(items))
    }

    fn token(t: &str) -> Result<StreamEvent> {
        Ok(StreamEvent::Token { text: t.into() })
    }

    async fn drain(mut reply: StreamingReply) -> (Vec<String>, Vec<ToolCall>) {
        let mut sentences = Vec::new();
        while let Some(s) = reply.sentences.recv().await {
            sentences.push(s);
        }
        let mut tools = Vec::new();
        while let Some(t) = reply.tools.recv().await {
            tools.push(t);
        }
        reply.task.await.unwrap();
        (sentences, tools)
    }

    #[tokio::test]
    async fn channels_close_at_end_of_stream() {
        let reply = spawn_stream_pump(
            "test",
            events(vec![
                token("Hello"),
                token(" World."),
                Ok(StreamEvent::ToolCallStarted {
                    call_id: "call_1".into(),
                    tool_name: "connect".into(),
                }),
                Ok(StreamEvent::ToolCallDelta {
                    call_id: "0".into(),
                    delta: "{}".into(),
                }),
                token(" Bye!"),
            ]),
            StreamOptions::default(),
        );
        let (sentences, tools) = drain(reply).await;
        assert_eq!(sentences, vec!["Hello World.", "Bye!"]);
        assert_eq!(tools.len(), 1);
        assert_eq!(tools[0].function.name, "connect");
    }

    #[tokio::test]
    async fn stream_error_closes_channels_after_emitted_output() {
        let reply = spawn_stream_pump(
            "test",
            events(vec![
                token("First."),
                Err(Error::Http("connection reset".into())),
                token("Never."),
            ]),
            StreamOptions::default(),
        );
        let (sentences, tools) = drain(reply).await;
        assert_eq!(sentences, vec!["First."]);
        assert!(tools.is_empty());
    }

    #[tokio::test]
    async fn cancellation_closes_a_stalled_stream() {
        let cancel = CancellationToken::new();
        let stalled: BoxStream<'static, Result<StreamEvent>> =
            Box::pin(futures_util::stream::pending());
        let mut reply = spawn_stream_pump(
            "test",
            stalled,
            StreamOptions {
                cancel: cancel.clone(),
                channel_capacity: 4,
            },
        );
        cancel.cancel();
        assert!(reply.sentences.recv().await.is_none());
        assert!(reply.tools.recv().await.is_none());
        reply.task.await.unwrap();
    }

    #[tokio::test]
    async fn replay_splits_content_then_tools() {
        let reply = spawn_replay(
            EngineReply {
                content: "Sure. Connecting you now.".into(),
                tool_calls: vec![ToolCall {
                    id: "c1".into(),
                    kind: Default::default(),
                    function: FunctionCall::new("connect", "{}"),
                }],
            },
            StreamOptions::default(),
        );
        let (sentences, tools) = drain(reply).await;
        assert_eq!(sentences, vec!["Sure. Connecting you now."]);
        assert_eq!(tools.len(), 1);
    }
}
