use std::sync::Arc;

use ac_domain::config::Config;
use ac_runtime::{AiHandler, AicallHandler, RuntimeMetrics};
use ac_store::Persistence;
use tokio_util::sync::CancellationToken;

/// Shared application state passed to all API handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub aicalls: Arc<AicallHandler>,
    pub ais: AiHandler,
    pub store: Arc<dyn Persistence>,
    pub metrics: Arc<RuntimeMetrics>,
    /// SHA-256 digest of the API bearer token; `None` disables auth.
    pub api_token_hash: Option<Vec<u8>>,
    /// Cancelled on shutdown; parent of every turn and init task.
    pub shutdown: CancellationToken,
}
