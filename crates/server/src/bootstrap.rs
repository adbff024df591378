//! AppState construction shared by `serve` and the API tests.

use std::sync::Arc;

use anyhow::Context;
use sha2::{Digest, Sha256};

use ac_domain::config::{Config, ConfigSeverity};
use ac_engines::EngineRegistry;
use ac_runtime::{AiHandler, AicallHandler, RemoteServices, RuntimeMetrics, Services};
use ac_store::Persistence;
use tokio_util::sync::CancellationToken;

use crate::state::AppState;

/// Validate config, open the store, build engines and collaborator
/// clients, and return a fully wired [`AppState`].
pub fn build_app_state(config: Arc<Config>, shutdown: CancellationToken) -> anyhow::Result<AppState> {
    // ── Config validation ────────────────────────────────────────────
    let issues = config.validate();
    for issue in &issues {
        match issue.severity {
            ConfigSeverity::Warning => tracing::warn!("config: {issue}"),
            ConfigSeverity::Error => tracing::error!("config: {issue}"),
        }
    }
    let error_count = issues
        .iter()
        .filter(|i| i.severity == ConfigSeverity::Error)
        .count();
    if error_count > 0 {
        anyhow::bail!("config validation failed with {error_count} error(s)");
    }

    // ── Store ────────────────────────────────────────────────────────
    let store = ac_store::open(&config.store).context("opening aicall store")?;
    match &config.store.snapshot_path {
        Some(path) => tracing::info!(path = %path.display(), cache = config.store.cache, "store ready"),
        None => tracing::info!(cache = config.store.cache, "in-memory store ready (no snapshot)"),
    }

    // ── Engines ──────────────────────────────────────────────────────
    let engines = Arc::new(EngineRegistry::from_config(&config.engines));
    let targets: Vec<String> = engines.targets().iter().map(|t| t.to_string()).collect();
    tracing::info!(count = engines.len(), targets = ?targets, "engine registry ready");

    // ── Collaborators ────────────────────────────────────────────────
    let remote = RemoteServices::new(&config.services).context("building service clients")?;
    let services = Services::uniform(Arc::new(remote));

    // ── API token (read once, hash for constant-time comparison) ─────
    let api_token_hash = {
        let env_var = &config.server.api_token_env;
        match std::env::var(env_var).ok().filter(|t| !t.is_empty()) {
            Some(token) => {
                tracing::info!(source = %format!("env:{env_var}"), "API bearer-token auth enabled");
                Some(hash_token(&token))
            }
            None => {
                tracing::warn!("API bearer-token auth DISABLED, set the {env_var} env var to enable it");
                None
            }
        }
    };

    Ok(assemble(config, store, engines, services, api_token_hash, shutdown))
}

/// Wire handlers around already-built components.
pub fn assemble(
    config: Arc<Config>,
    store: Arc<dyn Persistence>,
    engines: Arc<EngineRegistry>,
    services: Services,
    api_token_hash: Option<Vec<u8>>,
    shutdown: CancellationToken,
) -> AppState {
    let metrics = Arc::new(RuntimeMetrics::new());
    let aicalls = AicallHandler::new(
        store.clone(),
        engines.clone(),
        services.clone(),
        metrics.clone(),
        config.aicall.clone(),
        shutdown.clone(),
    );
    let ais = AiHandler::new(store.clone(), engines, services);
    AppState {
        config,
        aicalls,
        ais,
        store,
        metrics,
        api_token_hash,
        shutdown,
    }
}

/// Hash a bearer token the way the auth middleware compares it.
pub fn hash_token(token: &str) -> Vec<u8> {
    Sha256::digest(token.as_bytes()).to_vec()
}
