//! Engine registry.
//!
//! Maps each [`EngineTarget`] to the adapter serving it. Built once at
//! startup from [`EnginesConfig`]; lookups are by the target prefix of an
//! aicall's engine model.

use std::collections::HashMap;
use std::sync::Arc;

use ac_domain::config::EnginesConfig;
use ac_domain::engine::{EngineModel, EngineTarget};
use ac_domain::error::{Error, Result};

use crate::dialogflow::DialogflowEngine;
use crate::openai::OpenAiCompatEngine;
use crate::traits::EngineAdapter;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// EngineRegistry
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Default)]
pub struct EngineRegistry {
    engines: HashMap<EngineTarget, Arc<dyn EngineAdapter>>,
}

impl EngineRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the registry from configuration.
    ///
    /// Adapters that fail to initialize (bad auth source, unusable client)
    /// are logged and skipped so the service can still boot; aicalls on
    /// those targets fail at lookup instead.
    pub fn from_config(config: &EnginesConfig) -> Self {
        let mut registry = Self::new();

        for cfg in &config.openai_compat {
            match OpenAiCompatEngine::from_config(cfg) {
                Ok(engine) => registry.register(Arc::new(engine)),
                Err(e) => {
                    tracing::warn!(
                        target_name = %cfg.target,
                        error = %e,
                        "failed to initialize engine, skipping"
                    );
                }
            }
        }

        if let Some(df) = &config.dialogflow {
            match DialogflowEngine::from_config(df) {
                Ok(engine) => registry.register(Arc::new(engine)),
                Err(e) => {
                    tracing::warn!(
                        target_name = "dialogflow",
                        error = %e,
                        "failed to initialize engine, skipping"
                    );
                }
            }
        }

        if registry.is_empty() {
            tracing::warn!("no engines initialized; every aicall start will fail");
        }
        registry
    }

    /// Register an adapter under its own target, replacing any previous one.
    pub fn register(&mut self, engine: Arc<dyn EngineAdapter>) {
        let target = engine.target();
        if self.engines.insert(target, engine).is_some() {
            tracing::warn!(target_name = %target, "engine replaced");
        } else {
            tracing::info!(target_name = %target, "registered engine");
        }
    }

    pub fn get(&self, target: EngineTarget) -> Option<Arc<dyn EngineAdapter>> {
        self.engines.get(&target).cloned()
    }

    /// Adapter for an aicall's engine model.
    pub fn resolve(&self, model: &EngineModel) -> Result<Arc<dyn EngineAdapter>> {
        self.get(model.target()).ok_or_else(|| {
            Error::Validation(format!("no engine registered for target '{}'", model.target()))
        })
    }

    /// Parse a `<target>.<model>` string and check that its target is
    /// served.
    pub fn validate_model(&self, raw: &str) -> Result<EngineModel> {
        let model = EngineModel::parse(raw)?;
        self.resolve(&model)?;
        Ok(model)
    }

    /// Registered targets, sorted.
    pub fn targets(&self) -> Vec<EngineTarget> {
        let mut targets: Vec<EngineTarget> = self.engines.keys().copied().collect();
        targets.sort();
        targets
    }

    pub fn len(&self) -> usize {
        self.engines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.engines.is_empty()
    }
}
