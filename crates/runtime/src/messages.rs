//! Message ledger facade.
//!
//! Every conversation turn, tool request and tool result goes through
//! [`MessageHandler::create`], which persists the row before publishing
//! `aimessage_created`. A failed write is returned to the caller so the
//! enclosing turn aborts.

use std::sync::Arc;

use ac_domain::error::Result;
use ac_domain::event::EventType;
use ac_domain::message::{Direction, Message, Role, ToolCall};
use ac_store::{MessageFilter, Page, Persistence};
use chrono::Utc;
use uuid::Uuid;

use crate::metrics::RuntimeMetrics;
use crate::services::Services;

#[derive(Clone)]
pub struct MessageHandler {
    store: Arc<dyn Persistence>,
    services: Services,
    metrics: Arc<RuntimeMetrics>,
    history_limit: usize,
}

impl MessageHandler {
    pub fn new(
        store: Arc<dyn Persistence>,
        services: Services,
        metrics: Arc<RuntimeMetrics>,
        history_limit: usize,
    ) -> Self {
        Self {
            store,
            services,
            metrics,
            history_limit,
        }
    }

    #[allow(clippy::too_many_arguments)]
    pub async fn create(
        &self,
        customer_id: Uuid,
        aicall_id: Uuid,
        direction: Direction,
        role: Role,
        content: impl Into<String>,
        tool_calls: Vec<ToolCall>,
        tool_call_id: Option<String>,
    ) -> Result<Message> {
        let message = Message {
            id: Uuid::new_v4(),
            customer_id,
            aicall_id,
            direction,
            role,
            content: content.into(),
            tool_calls,
            tool_call_id,
            tm_create: Some(Utc::now()),
            tm_delete: None,
        };
        self.store.message_create(&message).await?;
        let message = self.store.message_get(message.id).await?;

        tracing::debug!(
            aicall_id = %aicall_id,
            message_id = %message.id,
            role = %role,
            "message created"
        );
        self.metrics.message_created(role.as_str());
        self.services
            .publish(customer_id, EventType::MessageCreated, &message)
            .await;
        Ok(message)
    }

    pub async fn get(&self, id: Uuid) -> Result<Message> {
        self.store.message_get(id).await
    }

    /// Messages of an aicall, newest first.
    pub async fn list(&self, aicall_id: Uuid, filter: &MessageFilter, page: &Page) -> Result<Vec<Message>> {
        self.store.message_list(aicall_id, filter, page).await
    }

    /// Every live message in chronological order, ready to replay to an
    /// engine. The ledger is read in pages of `history_limit` rows until it
    /// is exhausted, so the system prompt and every tool request/result pair
    /// survive however long the conversation grows.
    pub async fn history(&self, aicall_id: Uuid) -> Result<Vec<Message>> {
        let size = self.history_limit.max(1);
        let filter = MessageFilter::live();
        let mut messages = Vec::new();
        let mut token = None;
        loop {
            let page = Page {
                size: Some(size),
                token,
            };
            let batch = self.list(aicall_id, &filter, &page).await?;
            let exhausted = batch.len() < size;
            token = batch.last().map(|m| m.id);
            messages.extend(batch);
            if exhausted || token.is_none() {
                break;
            }
        }
        messages.reverse();
        Ok(messages)
    }
}
