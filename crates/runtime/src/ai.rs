//! AI configuration records.

use std::sync::Arc;

use ac_domain::ai::{Ai, AiFields};
use ac_domain::error::{Error, Result};
use ac_domain::event::EventType;
use ac_engines::EngineRegistry;
use ac_store::{AiFilter, Page, Persistence};
use chrono::Utc;
use uuid::Uuid;

use crate::services::Services;

#[derive(Clone)]
pub struct AiHandler {
    store: Arc<dyn Persistence>,
    engines: Arc<EngineRegistry>,
    services: Services,
}

impl AiHandler {
    pub fn new(store: Arc<dyn Persistence>, engines: Arc<EngineRegistry>, services: Services) -> Self {
        Self {
            store,
            engines,
            services,
        }
    }

    pub async fn create(&self, fields: AiFields) -> Result<Ai> {
        let engine_model = self.engines.validate_model(&fields.engine_model)?;
        let now = Utc::now();
        let ai = Ai {
            id: Uuid::new_v4(),
            customer_id: fields.customer_id,
            name: fields.name,
            detail: fields.detail,
            engine_type: fields.engine_type,
            engine_model,
            engine_data: fields.engine_data,
            init_prompt: fields.init_prompt,
            tts_type: fields.tts_type,
            tts_voice_id: fields.tts_voice_id,
            stt_type: fields.stt_type,
            tm_create: Some(now),
            tm_update: Some(now),
            tm_delete: None,
        };
        self.store.ai_create(&ai).await?;
        let ai = self.store.ai_get(ai.id).await?;
        tracing::info!(ai_id = %ai.id, engine_model = %ai.engine_model, "ai created");
        self.services.publish(ai.customer_id, EventType::AiCreated, &ai).await;
        Ok(ai)
    }

    pub async fn get(&self, id: Uuid) -> Result<Ai> {
        self.store.ai_get(id).await
    }

    pub async fn list(&self, filter: &AiFilter, page: &Page) -> Result<Vec<Ai>> {
        self.store.ai_list(filter, page).await
    }

    /// Replace the mutable fields. Running aicalls keep their snapshot.
    pub async fn update(&self, id: Uuid, fields: AiFields) -> Result<Ai> {
        let engine_model = self.engines.validate_model(&fields.engine_model)?;
        let mut ai = self.store.ai_get(id).await?;
        if ai.is_deleted() {
            return Err(Error::not_found("ai", id));
        }
        if ai.customer_id != fields.customer_id {
            return Err(Error::Validation("ai belongs to another customer".into()));
        }
        ai.name = fields.name;
        ai.detail = fields.detail;
        ai.engine_type = fields.engine_type;
        ai.engine_model = engine_model;
        ai.engine_data = fields.engine_data;
        ai.init_prompt = fields.init_prompt;
        ai.tts_type = fields.tts_type;
        ai.tts_voice_id = fields.tts_voice_id;
        ai.stt_type = fields.stt_type;
        ai.tm_update = Some(Utc::now());

        self.store.ai_update(&ai).await?;
        let ai = self.store.ai_get(id).await?;
        tracing::info!(ai_id = %ai.id, "ai updated");
        self.services.publish(ai.customer_id, EventType::AiUpdated, &ai).await;
        Ok(ai)
    }

    pub async fn delete(&self, id: Uuid) -> Result<Ai> {
        let ai = self.store.ai_get(id).await?;
        if ai.is_deleted() {
            return Ok(ai);
        }
        self.store.ai_delete(id, Utc::now()).await?;
        let ai = self.store.ai_get(id).await?;
        tracing::info!(ai_id = %id, "ai deleted");
        self.services.publish(ai.customer_id, EventType::AiDeleted, &ai).await;
        Ok(ai)
    }
}
