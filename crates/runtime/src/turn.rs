//! Conversation turns.
//!
//! A turn records the caller's message, replays the ledger to the engine
//! and acts on the reply. Streaming engines on sessions with a TTS stream
//! are spoken sentence by sentence while tool calls run one at a time in
//! arrival order. Everything else goes through a single `message_send`.

use std::sync::Arc;
use std::time::Instant;

use ac_domain::aicall::{Aicall, AicallStatus, ReferenceType};
use ac_domain::error::{Error, Result};
use ac_domain::message::{Direction, Message, Role, ToolCall};
use ac_domain::trace::TraceEvent;
use ac_engines::{EngineAdapter, StreamOptions, StreamingReply};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::handler::AicallHandler;

/// What a drained turn produced.
#[derive(Default)]
struct TurnOutput {
    spoken: String,
    sentences: usize,
    tool_calls: usize,
    terminated: bool,
}

impl AicallHandler {
    /// Run one conversation turn for `text` sent as `role`.
    ///
    /// Returns the persisted input message, or the assistant's reply when
    /// `return_response` is set and the engine said something.
    pub async fn send(
        self: &Arc<Self>,
        aicall_id: Uuid,
        role: Role,
        text: &str,
        return_response: bool,
    ) -> Result<Message> {
        let parent = self.shutdown.clone();
        self.send_with_cancel(aicall_id, role, text, return_response, &parent)
            .await
    }

    pub(crate) async fn send_with_cancel(
        self: &Arc<Self>,
        aicall_id: Uuid,
        role: Role,
        text: &str,
        return_response: bool,
        parent: &CancellationToken,
    ) -> Result<Message> {
        let aicall = self.get(aicall_id).await?;
        if matches!(aicall.status, AicallStatus::Terminating | AicallStatus::Terminated) {
            return Err(Error::Validation(format!(
                "aicall {} is {}",
                aicall.id, aicall.status
            )));
        }
        let engine = self.engines.resolve(&aicall.engine_model)?;

        if let Some((pod_id, streaming_id)) = aicall.tts_stream() {
            self.services.tts.say_stop(pod_id, streaming_id).await?;
        }

        let input = self
            .messages
            .create(
                aicall.customer_id,
                aicall.id,
                Direction::Outgoing,
                role,
                text,
                Vec::new(),
                None,
            )
            .await?;
        let history = self.messages.history(aicall.id).await?;

        let cancel = parent.child_token();
        let started = Instant::now();
        let streaming = aicall.tts_stream().is_some() && engine.supports_streaming();
        let (output, timed_out) = if streaming {
            self.run_streaming(&aicall, engine.as_ref(), &history, &cancel)
                .await?
        } else {
            self.run_sync(&aicall, engine.as_ref(), &history, &cancel)
                .await?
        };
        self.metrics.engine_request(engine.target().as_str());

        let reply = if output.spoken.is_empty() {
            None
        } else {
            Some(
                self.messages
                    .create(
                        aicall.customer_id,
                        aicall.id,
                        Direction::Incoming,
                        Role::Assistant,
                        output.spoken.clone(),
                        Vec::new(),
                        None,
                    )
                    .await?,
            )
        };

        let duration_ms = started.elapsed().as_millis() as u64;
        tracing::info!(
            aicall_id = %aicall.id,
            streaming,
            sentences = output.sentences,
            tool_calls = output.tool_calls,
            duration_ms,
            timed_out,
            "turn completed"
        );
        TraceEvent::TurnCompleted {
            aicall_id: aicall.id.to_string(),
            sentences: output.sentences,
            tool_calls: output.tool_calls,
            spoken_chars: output.spoken.chars().count(),
            duration_ms,
            timed_out,
        }
        .emit();
        self.metrics.turn_completed(timed_out);

        if timed_out {
            return Err(Error::Timeout(format!(
                "turn for aicall {} exceeded {}s",
                aicall.id, self.config.turn_timeout_secs
            )));
        }
        if parent.is_cancelled() && !output.terminated {
            return Err(Error::Canceled(format!("turn for aicall {} canceled", aicall.id)));
        }

        Ok(match reply {
            Some(reply) if return_response => reply,
            _ => input,
        })
    }

    // ── streaming path ────────────────────────────────────────────

    async fn run_streaming(
        self: &Arc<Self>,
        aicall: &Aicall,
        engine: &dyn EngineAdapter,
        history: &[Message],
        cancel: &CancellationToken,
    ) -> Result<(TurnOutput, bool)> {
        let opts = StreamOptions {
            cancel: cancel.clone(),
            channel_capacity: self.config.stream_channel_capacity,
        };
        let StreamingReply {
            mut sentences,
            mut tools,
            task,
        } = engine.streaming_send(aicall, history, opts).await?;

        // say_add groups sentences of one reply under a single message id.
        let utterance_id = Uuid::new_v4();

        let speak = async {
            let mut spoken = String::new();
            let mut count = 0usize;
            while let Some(sentence) = sentences.recv().await {
                if cancel.is_cancelled() {
                    continue;
                }
                if let Some((pod_id, streaming_id)) = aicall.tts_stream() {
                    if let Err(e) = self
                        .services
                        .tts
                        .say_add(pod_id, streaming_id, utterance_id, &sentence)
                        .await
                    {
                        tracing::warn!(aicall_id = %aicall.id, error = %e, "tts say_add failed");
                    }
                }
                if !spoken.is_empty() {
                    spoken.push(' ');
                }
                spoken.push_str(&sentence);
                count += 1;
            }
            (spoken, count)
        };

        // A failed tool write cancels the turn but keeps draining, so the
        // pump never blocks on a full channel.
        let act = async {
            let mut executed = 0usize;
            let mut terminated = false;
            let mut failure = None;
            while let Some(call) = tools.recv().await {
                if cancel.is_cancelled() {
                    continue;
                }
                executed += 1;
                match self.run_tool_call(aicall.id, call).await {
                    Ok(true) => {
                        terminated = true;
                        cancel.cancel();
                    }
                    Ok(false) => {}
                    Err(e) => {
                        failure = Some(e);
                        cancel.cancel();
                    }
                }
            }
            (executed, terminated, failure)
        };

        let drain = async { tokio::join!(speak, act) };
        tokio::pin!(drain);
        let mut timed_out = false;
        let ((spoken, sentence_count), acted) = match self.config.turn_timeout() {
            Some(limit) => tokio::select! {
                r = &mut drain => r,
                _ = tokio::time::sleep(limit) => {
                    tracing::warn!(aicall_id = %aicall.id, limit_secs = limit.as_secs(), "turn timed out");
                    timed_out = true;
                    cancel.cancel();
                    drain.await
                }
            },
            None => drain.await,
        };

        if let Err(e) = task.await {
            tracing::error!(aicall_id = %aicall.id, error = %e, "stream pump task failed");
        }

        let (tool_calls, terminated, failure) = acted;
        if let Some(e) = failure {
            return Err(e);
        }
        Ok((
            TurnOutput {
                spoken,
                sentences: sentence_count,
                tool_calls,
                terminated,
            },
            timed_out,
        ))
    }

    // ── non-streaming path ────────────────────────────────────────

    async fn run_sync(
        self: &Arc<Self>,
        aicall: &Aicall,
        engine: &dyn EngineAdapter,
        history: &[Message],
        cancel: &CancellationToken,
    ) -> Result<(TurnOutput, bool)> {
        let request = engine.message_send(aicall, history);
        let reply = match self.config.turn_timeout() {
            Some(limit) => tokio::select! {
                r = request => r?,
                _ = tokio::time::sleep(limit) => {
                    tracing::warn!(aicall_id = %aicall.id, limit_secs = limit.as_secs(), "turn timed out");
                    return Ok((TurnOutput::default(), true));
                }
                _ = cancel.cancelled() => return Ok((TurnOutput::default(), false)),
            },
            None => tokio::select! {
                r = request => r?,
                _ = cancel.cancelled() => return Ok((TurnOutput::default(), false)),
            },
        };

        let content = reply.content.trim().to_string();
        if !content.is_empty() {
            self.speak(aicall, &content).await;
        }

        let mut output = TurnOutput {
            sentences: usize::from(!content.is_empty()),
            spoken: content,
            ..TurnOutput::default()
        };
        for call in reply.tool_calls {
            if cancel.is_cancelled() {
                break;
            }
            output.tool_calls += 1;
            if self.run_tool_call(aicall.id, call).await? {
                output.terminated = true;
                break;
            }
        }
        Ok((output, false))
    }

    /// Play a whole reply on a call. Text-only references are silent.
    async fn speak(&self, aicall: &Aicall, text: &str) {
        if aicall.reference_type != ReferenceType::Call {
            return;
        }
        let result = match (aicall.tts_stream(), aicall.reference_id) {
            (Some((pod_id, streaming_id)), _) => {
                self.services
                    .tts
                    .say(pod_id, streaming_id, Uuid::new_v4(), text)
                    .await
            }
            (None, Some(call_id)) => {
                self.services
                    .call
                    .talk(call_id, text, aicall.gender, &aicall.language)
                    .await
            }
            (None, None) => return,
        };
        if let Err(e) = result {
            tracing::warn!(aicall_id = %aicall.id, error = %e, "speaking reply failed");
        }
    }

    /// Dispatch one engine tool call. Returns whether the session is
    /// ending. Unknown tools are logged and skipped.
    async fn run_tool_call(self: &Arc<Self>, aicall_id: Uuid, call: ToolCall) -> Result<bool> {
        match self.dispatch(aicall_id, &call.id, call.kind, call.function).await {
            Ok(resp) => Ok(resp.terminating),
            Err(Error::UnknownTool(name)) => {
                tracing::warn!(aicall_id = %aicall_id, tool = %name, "engine requested unknown tool");
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }
}
