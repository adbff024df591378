//! Write-through read cache in front of a [`Persistence`] backend.
//!
//! Aicalls and AIs are cached by id. Mutations hit the backend first and
//! only touch the cache once the write succeeded, so a failed write never
//! leaves the cache ahead of the source of truth. Lists and messages always
//! go to the backend.
//!
//! Only live aicalls stay cached: an aicall is evicted once it reaches a
//! final status or is soft-deleted, so the map tracks in-flight sessions
//! rather than every aicall ever seen.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use ac_domain::ai::Ai;
use ac_domain::aicall::Aicall;
use ac_domain::error::Result;
use ac_domain::message::Message;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use uuid::Uuid;

use crate::filter::{AiFilter, AicallFilter, MessageFilter, Page};
use crate::traits::Persistence;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
}

pub struct CachedPersistence<P> {
    inner: P,
    aicalls: RwLock<HashMap<Uuid, Aicall>>,
    ais: RwLock<HashMap<Uuid, Ai>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl<P: Persistence> CachedPersistence<P> {
    pub fn new(inner: P) -> Self {
        Self {
            inner,
            aicalls: RwLock::new(HashMap::new()),
            ais: RwLock::new(HashMap::new()),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    pub fn inner(&self) -> &P {
        &self.inner
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }

    fn hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    fn miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    /// Number of aicalls currently held in the cache.
    pub fn cached_aicalls(&self) -> usize {
        self.aicalls.read().len()
    }

    fn remember_aicall(&self, aicall: &Aicall) {
        let mut aicalls = self.aicalls.write();
        if aicall.status.is_final() || aicall.is_deleted() {
            aicalls.remove(&aicall.id);
        } else {
            aicalls.insert(aicall.id, aicall.clone());
        }
    }
}

#[async_trait::async_trait]
impl<P: Persistence> Persistence for CachedPersistence<P> {
    async fn aicall_create(&self, aicall: &Aicall) -> Result<()> {
        self.inner.aicall_create(aicall).await?;
        self.remember_aicall(aicall);
        Ok(())
    }

    async fn aicall_get(&self, id: Uuid) -> Result<Aicall> {
        if let Some(hit) = self.aicalls.read().get(&id).cloned() {
            self.hit();
            return Ok(hit);
        }
        self.miss();
        let aicall = self.inner.aicall_get(id).await?;
        self.remember_aicall(&aicall);
        Ok(aicall)
    }

    async fn aicall_update(&self, aicall: &Aicall) -> Result<()> {
        if let Err(e) = self.inner.aicall_update(aicall).await {
            self.aicalls.write().remove(&aicall.id);
            return Err(e);
        }
        self.remember_aicall(aicall);
        Ok(())
    }

    async fn aicall_delete(&self, id: Uuid, at: DateTime<Utc>) -> Result<()> {
        let result = self.inner.aicall_delete(id, at).await;
        self.aicalls.write().remove(&id);
        result
    }

    async fn aicall_list(&self, filter: &AicallFilter, page: &Page) -> Result<Vec<Aicall>> {
        self.inner.aicall_list(filter, page).await
    }

    async fn message_create(&self, message: &Message) -> Result<()> {
        self.inner.message_create(message).await
    }

    async fn message_get(&self, id: Uuid) -> Result<Message> {
        self.inner.message_get(id).await
    }

    async fn message_list(
        &self,
        aicall_id: Uuid,
        filter: &MessageFilter,
        page: &Page,
    ) -> Result<Vec<Message>> {
        self.inner.message_list(aicall_id, filter, page).await
    }

    async fn ai_create(&self, ai: &Ai) -> Result<()> {
        self.inner.ai_create(ai).await?;
        self.ais.write().insert(ai.id, ai.clone());
        Ok(())
    }

    async fn ai_get(&self, id: Uuid) -> Result<Ai> {
        if let Some(hit) = self.ais.read().get(&id).cloned() {
            self.hit();
            return Ok(hit);
        }
        self.miss();
        let ai = self.inner.ai_get(id).await?;
        self.ais.write().insert(id, ai.clone());
        Ok(ai)
    }

    async fn ai_update(&self, ai: &Ai) -> Result<()> {
        if let Err(e) = self.inner.ai_update(ai).await {
            self.ais.write().remove(&ai.id);
            return Err(e);
        }
        self.ais.write().insert(ai.id, ai.clone());
        Ok(())
    }

    async fn ai_delete(&self, id: Uuid, at: DateTime<Utc>) -> Result<()> {
        let result = self.inner.ai_delete(id, at).await;
        self.ais.write().remove(&id);
        result
    }

    async fn ai_list(&self, filter: &AiFilter, page: &Page) -> Result<Vec<Ai>> {
        self.inner.ai_list(filter, page).await
    }

    async fn flush(&self) -> Result<()> {
        self.inner.flush().await
    }
}
