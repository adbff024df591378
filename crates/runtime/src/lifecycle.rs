//! Aicall status transitions.
//!
//! Every operation re-reads the aicall, checks the edge against the status
//! graph and only then touches collaborators. A same-status call returns
//! the current record untouched.

use std::sync::Arc;
use std::time::Duration;

use ac_domain::aicall::{Aicall, AicallStatus, ReferenceType};
use ac_domain::error::{Error, Result};
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::handler::{AicallHandler, CleanupStep, TransitionOutcome};
use crate::services::{StreamDirection, TranscribeRequest};

impl AicallHandler {
    /// `initiating|resuming -> progressing`. Call references start
    /// transcription first; a failure there is returned as is.
    pub async fn process_start(&self, id: Uuid) -> Result<Aicall> {
        let aicall = self.get(id).await?;
        if !Self::check_transition(&aicall, AicallStatus::Progressing)? {
            return Ok(aicall);
        }
        let aicall = self.start_transcribe(aicall).await?;
        self.persist_status(aicall, AicallStatus::Progressing).await
    }

    /// `progressing -> pausing`, stopping transcription on the way.
    pub async fn process_pause(&self, id: Uuid) -> Result<TransitionOutcome> {
        let mut aicall = self.get(id).await?;
        if !Self::check_transition(&aicall, AicallStatus::Pausing)? {
            return Ok(TransitionOutcome::clean(aicall));
        }

        let mut warnings = Vec::new();
        if let Some(transcribe_id) = aicall.transcribe_id.take() {
            if let Err(e) = self.services.transcribe.stop(transcribe_id).await {
                warnings.push(self.record_warning(aicall.id, CleanupStep::TranscribeStop, &e));
            }
        }

        let aicall = self.persist_status(aicall, AicallStatus::Pausing).await?;
        Ok(TransitionOutcome { aicall, warnings })
    }

    /// `pausing -> resuming -> progressing`, restarting transcription.
    pub async fn process_resume(&self, id: Uuid) -> Result<Aicall> {
        let aicall = self.get(id).await?;
        if aicall.status == AicallStatus::Progressing {
            return Ok(aicall);
        }
        let aicall = if Self::check_transition(&aicall, AicallStatus::Resuming)? {
            self.persist_status(aicall, AicallStatus::Resuming).await?
        } else {
            aicall
        };
        let aicall = self.start_transcribe(aicall).await?;
        self.persist_status(aicall, AicallStatus::Progressing).await
    }

    /// Drive the aicall to `terminated`, passing through `terminating`.
    ///
    /// Cleanup is best effort: failed steps become warnings and the
    /// transition completes regardless.
    pub async fn process_end(&self, id: Uuid) -> Result<TransitionOutcome> {
        let aicall = self.get(id).await?;
        if aicall.status == AicallStatus::Terminated {
            return Ok(TransitionOutcome::clean(aicall));
        }
        let mut aicall = if Self::check_transition(&aicall, AicallStatus::Terminating)? {
            self.persist_status(aicall, AicallStatus::Terminating).await?
        } else {
            aicall
        };

        let mut warnings = Vec::new();
        if let Some(transcribe_id) = aicall.transcribe_id.take() {
            if let Err(e) = self.services.transcribe.stop(transcribe_id).await {
                warnings.push(self.record_warning(aicall.id, CleanupStep::TranscribeStop, &e));
            }
        }
        if let Some((pod_id, streaming_id)) = aicall.tts_stream() {
            if let Err(e) = self.services.tts.delete(pod_id, streaming_id).await {
                warnings.push(self.record_warning(aicall.id, CleanupStep::TtsStreamingDelete, &e));
            }
        }
        if let Some(confbridge_id) = aicall.confbridge_id {
            if let Err(e) = self.services.call.confbridge_terminate(confbridge_id).await {
                warnings.push(self.record_warning(aicall.id, CleanupStep::ConfbridgeTerminate, &e));
            }
        }

        let aicall = self.persist_status(aicall, AicallStatus::Terminated).await?;
        Ok(TransitionOutcome { aicall, warnings })
    }

    /// Explicit termination request.
    pub async fn process_terminate(&self, id: Uuid) -> Result<TransitionOutcome> {
        self.process_end(id).await
    }

    /// Terminate after `delay` on a background task. Failures are logged
    /// only. Shutdown skips the wait and terminates immediately.
    pub fn terminate_with_delay(self: &Arc<Self>, id: Uuid, delay: Duration) -> JoinHandle<()> {
        let this = Arc::clone(self);
        tokio::spawn(async move {
            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = this.shutdown.cancelled() => {}
            }
            match this.process_end(id).await {
                Ok(outcome) if !outcome.is_clean() => {
                    tracing::warn!(
                        aicall_id = %id,
                        warnings = outcome.warnings.len(),
                        "delayed termination finished with cleanup warnings"
                    );
                }
                Ok(_) => tracing::debug!(aicall_id = %id, "delayed termination finished"),
                Err(e) => tracing::error!(aicall_id = %id, error = %e, "delayed termination failed"),
            }
        })
    }

    async fn start_transcribe(&self, mut aicall: Aicall) -> Result<Aicall> {
        if aicall.reference_type != ReferenceType::Call {
            return Ok(aicall);
        }
        let reference_id = aicall
            .reference_id
            .ok_or_else(|| Error::Validation("call-bound aicall has no reference id".into()))?;
        let req = TranscribeRequest {
            customer_id: aicall.customer_id,
            activeflow_id: aicall.activeflow_id,
            reference_type: aicall.reference_type,
            reference_id,
            language: aicall.language.clone(),
            direction: StreamDirection::Incoming,
        };
        let transcribe_id = self.services.transcribe.start(&req).await?;
        tracing::debug!(aicall_id = %aicall.id, transcribe_id = %transcribe_id, "transcribe started");
        aicall.transcribe_id = Some(transcribe_id);
        Ok(aicall)
    }
}
