//! Persistence for aicalls, messages and AI configurations.
//!
//! [`MemoryPersistence`] is the source of truth, optionally snapshotted to a
//! JSON file. [`CachedPersistence`] wraps any backend with a write-through
//! read cache for the hot `get` paths.

pub mod cached;
pub mod filter;
pub mod memory;
pub mod traits;

use std::sync::Arc;

use ac_domain::config::StoreConfig;
use ac_domain::error::Result;

pub use cached::CachedPersistence;
pub use filter::{AiFilter, AicallFilter, MessageFilter, Page};
pub use memory::MemoryPersistence;
pub use traits::Persistence;

/// Open the configured store.
pub fn open(config: &StoreConfig) -> Result<Arc<dyn Persistence>> {
    let memory = MemoryPersistence::open(config.snapshot_path.as_deref())?;
    if config.cache {
        Ok(Arc::new(CachedPersistence::new(memory)))
    } else {
        Ok(Arc::new(memory))
    }
}
