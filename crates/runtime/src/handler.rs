//! The aicall handler: shared state for the state machine, the tool
//! dispatcher and the conversation controller.
//!
//! Operations live in sibling modules as `impl AicallHandler` blocks:
//! [`aicall`](crate::aicall) (create, start, delete, lookups),
//! [`lifecycle`](crate::lifecycle) (status transitions),
//! [`tools`](crate::tools) and [`turn`](crate::turn).

use std::sync::Arc;

use ac_domain::aicall::{Aicall, AicallStatus};
use ac_domain::config::AicallConfig;
use ac_domain::error::{Error, Result};
use ac_domain::event::EventType;
use ac_domain::trace::TraceEvent;
use ac_engines::EngineRegistry;
use ac_store::{AicallFilter, Page, Persistence};
use chrono::Utc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::messages::MessageHandler;
use crate::metrics::RuntimeMetrics;
use crate::services::Services;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Outcome types
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Best-effort cleanup steps of pause and end.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CleanupStep {
    TranscribeStop,
    TtsStreamingDelete,
    ConfbridgeTerminate,
    ConfbridgeDelete,
}

impl CleanupStep {
    pub fn as_str(self) -> &'static str {
        match self {
            CleanupStep::TranscribeStop => "transcribe_stop",
            CleanupStep::TtsStreamingDelete => "tts_streaming_delete",
            CleanupStep::ConfbridgeTerminate => "confbridge_terminate",
            CleanupStep::ConfbridgeDelete => "confbridge_delete",
        }
    }
}

/// A cleanup step that failed without stopping the transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CleanupWarning {
    pub step: CleanupStep,
    pub error: String,
}

/// Result of a transition with best-effort cleanup.
#[derive(Debug, Clone)]
pub struct TransitionOutcome {
    pub aicall: Aicall,
    pub warnings: Vec<CleanupWarning>,
}

impl TransitionOutcome {
    pub fn clean(aicall: Aicall) -> Self {
        Self {
            aicall,
            warnings: Vec::new(),
        }
    }

    pub fn is_clean(&self) -> bool {
        self.warnings.is_empty()
    }
}

/// Background initialization of a call-bound aicall.
///
/// The token is a child of the handler's shutdown token, so shutting the
/// handler down also stops pending initializations.
pub struct InitTask {
    pub handle: JoinHandle<Result<Aicall>>,
    pub cancel: CancellationToken,
}

impl InitTask {
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Wait for initialization to finish.
    pub async fn join(self) -> Result<Aicall> {
        match self.handle.await {
            Ok(result) => result,
            Err(e) if e.is_cancelled() => Err(Error::Canceled("aicall initialization aborted".into())),
            Err(e) => Err(Error::Other(format!("aicall initialization panicked: {e}"))),
        }
    }
}

pub struct StartOutcome {
    pub aicall: Aicall,
    /// Present for call references only.
    pub init: Option<InitTask>,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Handler
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub struct AicallHandler {
    pub(crate) store: Arc<dyn Persistence>,
    pub(crate) engines: Arc<EngineRegistry>,
    pub(crate) services: Services,
    pub(crate) messages: MessageHandler,
    pub(crate) metrics: Arc<RuntimeMetrics>,
    pub(crate) config: AicallConfig,
    pub(crate) shutdown: CancellationToken,
}

impl AicallHandler {
    pub fn new(
        store: Arc<dyn Persistence>,
        engines: Arc<EngineRegistry>,
        services: Services,
        metrics: Arc<RuntimeMetrics>,
        config: AicallConfig,
        shutdown: CancellationToken,
    ) -> Arc<Self> {
        let messages = MessageHandler::new(
            store.clone(),
            services.clone(),
            metrics.clone(),
            config.history_limit,
        );
        Arc::new(Self {
            store,
            engines,
            services,
            messages,
            metrics,
            config,
            shutdown,
        })
    }

    pub fn messages(&self) -> &MessageHandler {
        &self.messages
    }

    pub fn metrics(&self) -> &Arc<RuntimeMetrics> {
        &self.metrics
    }

    pub fn engines(&self) -> &Arc<EngineRegistry> {
        &self.engines
    }

    pub fn shutdown_token(&self) -> &CancellationToken {
        &self.shutdown
    }

    // ── lookups ───────────────────────────────────────────────────

    pub async fn get(&self, id: Uuid) -> Result<Aicall> {
        self.store.aicall_get(id).await
    }

    pub async fn list(&self, filter: &AicallFilter, page: &Page) -> Result<Vec<Aicall>> {
        self.store.aicall_list(filter, page).await
    }

    /// Newest live aicall bound to `reference_id`.
    pub async fn get_by_reference_id(&self, reference_id: Uuid) -> Result<Aicall> {
        let filter = AicallFilter {
            reference_id: Some(reference_id),
            ..AicallFilter::live()
        };
        self.first_match(&filter, "aicall for reference", reference_id)
            .await
    }

    /// Newest live aicall holding `transcribe_id`.
    pub async fn get_by_transcribe_id(&self, transcribe_id: Uuid) -> Result<Aicall> {
        let filter = AicallFilter {
            transcribe_id: Some(transcribe_id),
            ..AicallFilter::live()
        };
        self.first_match(&filter, "aicall for transcribe", transcribe_id)
            .await
    }

    async fn first_match(&self, filter: &AicallFilter, kind: &'static str, id: Uuid) -> Result<Aicall> {
        self.store
            .aicall_list(filter, &Page::first(1))
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| Error::not_found(kind, id))
    }

    // ── status persistence ────────────────────────────────────────

    /// Whether `aicall` may move to `to`: `Ok(false)` for a same-status
    /// no-op, `InvalidTransition` for a move off the status graph.
    pub(crate) fn check_transition(aicall: &Aicall, to: AicallStatus) -> Result<bool> {
        if aicall.status == to {
            return Ok(false);
        }
        if !aicall.status.can_transition_to(to) {
            return Err(Error::InvalidTransition {
                from: aicall.status.to_string(),
                to: to.to_string(),
            });
        }
        Ok(true)
    }

    /// Persist `aicall` with status `to`, re-read it and announce the
    /// transition. Callers have already checked the edge.
    pub(crate) async fn persist_status(&self, mut aicall: Aicall, to: AicallStatus) -> Result<Aicall> {
        let from = aicall.status;
        let now = Utc::now();
        aicall.status = to;
        aicall.tm_update = Some(now);
        if to == AicallStatus::Terminated {
            aicall.tm_end = Some(now);
        }
        self.store.aicall_update(&aicall).await?;
        let aicall = self.store.aicall_get(aicall.id).await?;

        tracing::info!(aicall_id = %aicall.id, from = %from, to = %to, "aicall status changed");
        TraceEvent::AicallTransition {
            aicall_id: aicall.id.to_string(),
            from: from.to_string(),
            to: to.to_string(),
        }
        .emit();
        self.metrics.transition(to.as_str());
        self.services
            .publish(aicall.customer_id, EventType::for_status(to), &aicall)
            .await;
        Ok(aicall)
    }

    /// Persist non-status fields (bound resources).
    pub(crate) async fn persist(&self, mut aicall: Aicall) -> Result<Aicall> {
        aicall.tm_update = Some(Utc::now());
        self.store.aicall_update(&aicall).await?;
        self.store.aicall_get(aicall.id).await
    }

    pub(crate) fn record_warning(&self, aicall_id: Uuid, step: CleanupStep, error: &Error) -> CleanupWarning {
        tracing::warn!(aicall_id = %aicall_id, step = step.as_str(), error = %error, "cleanup step failed");
        TraceEvent::CleanupFailed {
            aicall_id: aicall_id.to_string(),
            step: step.as_str().to_string(),
            error: error.to_string(),
        }
        .emit();
        self.metrics.cleanup_warning(step.as_str());
        CleanupWarning {
            step,
            error: error.to_string(),
        }
    }
}
