use ac_domain::ai::Ai;
use ac_domain::aicall::Aicall;
use ac_domain::error::Result;
use ac_domain::message::Message;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::filter::{AiFilter, AicallFilter, MessageFilter, Page};

/// Storage backend for the aicall runtime.
///
/// `*_get` returns `Error::NotFound` for unknown ids and still returns
/// soft-deleted records. Lists are newest-first. Deletes are soft: they set
/// `tm_delete` and keep the row.
#[async_trait::async_trait]
pub trait Persistence: Send + Sync {
    async fn aicall_create(&self, aicall: &Aicall) -> Result<()>;
    async fn aicall_get(&self, id: Uuid) -> Result<Aicall>;
    async fn aicall_update(&self, aicall: &Aicall) -> Result<()>;
    async fn aicall_delete(&self, id: Uuid, at: DateTime<Utc>) -> Result<()>;
    async fn aicall_list(&self, filter: &AicallFilter, page: &Page) -> Result<Vec<Aicall>>;

    async fn message_create(&self, message: &Message) -> Result<()>;
    async fn message_get(&self, id: Uuid) -> Result<Message>;
    async fn message_list(
        &self,
        aicall_id: Uuid,
        filter: &MessageFilter,
        page: &Page,
    ) -> Result<Vec<Message>>;

    async fn ai_create(&self, ai: &Ai) -> Result<()>;
    async fn ai_get(&self, id: Uuid) -> Result<Ai>;
    async fn ai_update(&self, ai: &Ai) -> Result<()>;
    async fn ai_delete(&self, id: Uuid, at: DateTime<Utc>) -> Result<()>;
    async fn ai_list(&self, filter: &AiFilter, page: &Page) -> Result<Vec<Ai>>;

    /// Persist buffered state, for backends that buffer. No-op by default.
    async fn flush(&self) -> Result<()> {
        Ok(())
    }
}
