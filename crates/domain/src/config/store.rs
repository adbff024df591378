use std::path::PathBuf;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// JSON snapshot written on shutdown and loaded on startup.
    /// `None` keeps records in memory only.
    #[serde(default)]
    pub snapshot_path: Option<PathBuf>,
    /// Put a read-through cache in front of the store.
    #[serde(default = "d_true")]
    pub cache: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            snapshot_path: None,
            cache: true,
        }
    }
}

fn d_true() -> bool {
    true
}
