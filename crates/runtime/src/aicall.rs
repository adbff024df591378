//! Aicall creation, start-up and deletion.

use std::collections::HashMap;
use std::sync::Arc;

use ac_domain::ai::Ai;
use ac_domain::aicall::{Aicall, AicallStatus, Gender, ReferenceType};
use ac_domain::error::{Error, Result};
use ac_domain::event::EventType;
use ac_domain::message::{Direction, Role};
use ac_domain::trace::TraceEvent;
use chrono::Utc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::handler::{AicallHandler, CleanupStep, InitTask, StartOutcome};
use crate::services::{ConfbridgeRequest, TtsRequest};

const VARIABLE_PREFIX: &str = "voipbin.aicall";

impl AicallHandler {
    /// Persist a new `initiating` aicall with a snapshot of `ai`'s engine
    /// and voice configuration.
    #[allow(clippy::too_many_arguments)]
    pub async fn create(
        &self,
        ai: &Ai,
        activeflow_id: Option<Uuid>,
        reference_type: ReferenceType,
        reference_id: Option<Uuid>,
        confbridge_id: Option<Uuid>,
        gender: Gender,
        language: &str,
    ) -> Result<Aicall> {
        let now = Utc::now();
        let aicall = Aicall {
            id: Uuid::new_v4(),
            customer_id: ai.customer_id,
            ai_id: ai.id,
            engine_type: ai.engine_type,
            engine_model: ai.engine_model.clone(),
            engine_data: ai.engine_data.clone(),
            tts_type: ai.tts_type.clone(),
            tts_voice_id: ai.tts_voice_id.clone(),
            stt_type: ai.stt_type.clone(),
            activeflow_id,
            reference_type,
            reference_id,
            confbridge_id,
            pipecatcall_id: None,
            tts_streaming_id: None,
            tts_streaming_pod_id: None,
            transcribe_id: None,
            status: AicallStatus::Initiating,
            gender,
            language: language.to_string(),
            tm_create: Some(now),
            tm_update: Some(now),
            tm_end: None,
            tm_delete: None,
        };
        aicall.check_resources().map_err(Error::Validation)?;

        self.store.aicall_create(&aicall).await?;
        let aicall = self.store.aicall_get(aicall.id).await?;

        tracing::info!(
            aicall_id = %aicall.id,
            ai_id = %aicall.ai_id,
            reference_type = %aicall.reference_type,
            engine_model = %aicall.engine_model,
            "aicall created"
        );
        TraceEvent::AicallCreated {
            aicall_id: aicall.id.to_string(),
            reference_type: aicall.reference_type.to_string(),
            engine_model: aicall.engine_model.to_string(),
        }
        .emit();
        self.metrics.aicall_created(aicall.reference_type.as_str());
        self.services
            .publish(aicall.customer_id, EventType::AicallInitializing, &aicall)
            .await;
        Ok(aicall)
    }

    /// Start an aicall for `ai_id`.
    ///
    /// Call references get a conference bridge and return right away with
    /// an [`InitTask`] finishing the set-up in the background. Other
    /// references are initialized before this returns.
    pub async fn start(
        self: &Arc<Self>,
        ai_id: Uuid,
        activeflow_id: Option<Uuid>,
        reference_type: ReferenceType,
        reference_id: Option<Uuid>,
        gender: Gender,
        language: &str,
    ) -> Result<StartOutcome> {
        let ai = self.store.ai_get(ai_id).await?;
        if ai.is_deleted() {
            return Err(Error::not_found("ai", ai_id));
        }
        self.engines.resolve(&ai.engine_model)?;

        match reference_type {
            ReferenceType::Call => {
                let Some(call_id) = reference_id else {
                    return Err(Error::Validation("call reference requires a reference id".into()));
                };
                let confbridge_id = self
                    .services
                    .call
                    .confbridge_create(&ConfbridgeRequest {
                        customer_id: ai.customer_id,
                        activeflow_id,
                        reference_type,
                        reference_id: Some(call_id),
                    })
                    .await?;
                let aicall = self
                    .create(
                        &ai,
                        activeflow_id,
                        reference_type,
                        Some(call_id),
                        Some(confbridge_id),
                        gender,
                        language,
                    )
                    .await?;
                let init = self.spawn_call_init(aicall.clone(), ai);
                Ok(StartOutcome {
                    aicall,
                    init: Some(init),
                })
            }
            ReferenceType::None | ReferenceType::Conversation | ReferenceType::Task => {
                let aicall = self
                    .create(&ai, activeflow_id, reference_type, reference_id, None, gender, language)
                    .await?;
                self.set_variables(&aicall).await?;
                let prompt = self.init_prompt(&aicall, &ai).await?;
                if !prompt.is_empty() {
                    self.messages
                        .create(
                            aicall.customer_id,
                            aicall.id,
                            Direction::Outgoing,
                            Role::System,
                            prompt,
                            Vec::new(),
                            None,
                        )
                        .await?;
                }
                let aicall = self.process_start(aicall.id).await?;
                Ok(StartOutcome { aicall, init: None })
            }
        }
    }

    fn spawn_call_init(self: &Arc<Self>, aicall: Aicall, ai: Ai) -> InitTask {
        let cancel = self.shutdown.child_token();
        let this = Arc::clone(self);
        let token = cancel.clone();
        let handle = tokio::spawn(async move {
            let id = aicall.id;
            let result = tokio::select! {
                r = this.run_call_init(aicall, &ai, &token) => r,
                _ = token.cancelled() => Err(Error::Canceled("aicall initialization canceled".into())),
            };
            if let Err(e) = &result {
                tracing::error!(aicall_id = %id, error = %e, "aicall initialization failed");
                if let Err(end) = this.process_end(id).await {
                    tracing::error!(aicall_id = %id, error = %end, "terminate after failed init failed");
                }
            }
            result
        });
        InitTask { handle, cancel }
    }

    async fn run_call_init(
        self: &Arc<Self>,
        aicall: Aicall,
        ai: &Ai,
        cancel: &CancellationToken,
    ) -> Result<Aicall> {
        self.set_variables(&aicall).await?;

        let Some(reference_id) = aicall.reference_id else {
            return Err(Error::Validation("call reference requires a reference id".into()));
        };
        let session = self
            .services
            .tts
            .create(&TtsRequest {
                customer_id: aicall.customer_id,
                activeflow_id: aicall.activeflow_id,
                reference_type: aicall.reference_type,
                reference_id,
                language: aicall.language.clone(),
                gender: aicall.gender,
                provider: aicall.tts_type.clone(),
                voice_id: aicall.tts_voice_id.clone(),
            })
            .await?;
        let mut aicall = aicall;
        aicall.tts_streaming_id = Some(session.id);
        aicall.tts_streaming_pod_id = Some(session.pod_id);
        let aicall = self.persist(aicall).await?;

        let aicall = self.process_start(aicall.id).await?;

        let prompt = self.init_prompt(&aicall, ai).await?;
        if !prompt.is_empty() {
            self.send_with_cancel(aicall.id, Role::System, &prompt, false, cancel)
                .await?;
        }
        tracing::info!(aicall_id = %aicall.id, "aicall initialized");
        self.get(aicall.id).await
    }

    /// Publish the aicall's identity to the bound activeflow.
    async fn set_variables(&self, aicall: &Aicall) -> Result<()> {
        let Some(activeflow_id) = aicall.activeflow_id else {
            return Ok(());
        };
        let opt = |v: Option<Uuid>| v.map(|id| id.to_string()).unwrap_or_default();
        let variables: HashMap<String, String> = [
            ("id", aicall.id.to_string()),
            ("ai_id", aicall.ai_id.to_string()),
            ("ai_engine_model", aicall.engine_model.to_string()),
            ("confbridge_id", opt(aicall.confbridge_id)),
            ("gender", aicall.gender.as_str().to_string()),
            ("language", aicall.language.clone()),
            ("pipecatcall_id", opt(aicall.pipecatcall_id)),
        ]
        .into_iter()
        .map(|(k, v)| (format!("{VARIABLE_PREFIX}.{k}"), v))
        .collect();
        self.services.workflow.set_variables(activeflow_id, &variables).await
    }

    /// The AI's init prompt (or the configured default), expanded against
    /// the activeflow's variables when one is bound.
    async fn init_prompt(&self, aicall: &Aicall, ai: &Ai) -> Result<String> {
        let template = if ai.init_prompt.is_empty() {
            self.config.default_init_prompt.as_str()
        } else {
            ai.init_prompt.as_str()
        };
        if template.is_empty() {
            return Ok(String::new());
        }
        match aicall.activeflow_id {
            Some(activeflow_id) => self.services.workflow.substitute(activeflow_id, template).await,
            None => Ok(template.to_string()),
        }
    }

    /// Soft-delete an aicall, terminating it first when still live.
    pub async fn delete(&self, id: Uuid) -> Result<Aicall> {
        let aicall = self.get(id).await?;
        if aicall.is_deleted() {
            return Ok(aicall);
        }
        let aicall = if aicall.status.is_final() {
            aicall
        } else {
            self.process_end(id).await?.aicall
        };
        if let Some(confbridge_id) = aicall.confbridge_id {
            if let Err(e) = self.services.call.confbridge_delete(confbridge_id).await {
                self.record_warning(aicall.id, CleanupStep::ConfbridgeDelete, &e);
            }
        }

        self.store.aicall_delete(id, Utc::now()).await?;
        let aicall = self.store.aicall_get(id).await?;
        tracing::info!(aicall_id = %id, "aicall deleted");
        self.services
            .publish(aicall.customer_id, EventType::AicallDeleted, &aicall)
            .await;
        Ok(aicall)
    }
}
