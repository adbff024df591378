mod aicall;
mod engines;
mod observability;
mod server;
mod services;
mod store;

pub use aicall::*;
pub use engines::*;
pub use observability::*;
pub use server::*;
pub use services::*;
pub use store::*;

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Top-level config
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub observability: ObservabilityConfig,
    #[serde(default)]
    pub engines: EnginesConfig,
    #[serde(default)]
    pub aicall: AicallConfig,
    #[serde(default)]
    pub services: ServicesConfig,
    #[serde(default)]
    pub store: StoreConfig,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Config validation
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Severity level for a configuration issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSeverity {
    Error,
    Warning,
}

/// A single configuration validation issue.
#[derive(Debug, Clone)]
pub struct ConfigError {
    pub severity: ConfigSeverity,
    pub field: String,
    pub message: String,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self.severity {
            ConfigSeverity::Error => "ERROR",
            ConfigSeverity::Warning => "WARN",
        };
        write!(f, "[{tag}] {}: {}", self.field, self.message)
    }
}

impl ConfigError {
    fn error(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            severity: ConfigSeverity::Error,
            field: field.into(),
            message: message.into(),
        }
    }

    fn warning(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            severity: ConfigSeverity::Warning,
            field: field.into(),
            message: message.into(),
        }
    }
}

impl Config {
    /// Validate the configuration and return a list of issues.
    ///
    /// Returns an empty vec when everything looks good.
    pub fn validate(&self) -> Vec<ConfigError> {
        let mut errors = Vec::new();

        if self.server.port == 0 {
            errors.push(ConfigError::error("server.port", "port must be greater than 0"));
        }
        if self.server.host.is_empty() {
            errors.push(ConfigError::error("server.host", "host must not be empty"));
        }

        // Engines: every target registered at most once, never dialogflow
        // through the OpenAI protocol.
        let mut seen = HashSet::new();
        for (i, engine) in self.engines.openai_compat.iter().enumerate() {
            let field = format!("engines.openai_compat[{i}]");
            if !engine.target.is_openai_compatible() {
                errors.push(ConfigError::error(
                    format!("{field}.target"),
                    format!("target '{}' does not speak the OpenAI protocol", engine.target),
                ));
            }
            if !seen.insert(engine.target) {
                errors.push(ConfigError::error(
                    format!("{field}.target"),
                    format!("target '{}' is registered more than once", engine.target),
                ));
            }
            if engine.base_url.is_empty() {
                errors.push(ConfigError::error(
                    format!("{field}.base_url"),
                    "base_url must not be empty",
                ));
            }
        }
        if self.engines.openai_compat.is_empty() && self.engines.dialogflow.is_none() {
            errors.push(ConfigError::warning("engines", "no engines configured"));
        }

        if let Some(df) = &self.engines.dialogflow {
            let b = &df.backoff;
            if b.initial_interval_ms == 0 || b.multiplier < 1.0 {
                errors.push(ConfigError::error(
                    "engines.dialogflow.backoff",
                    "initial_interval_ms must be > 0 and multiplier >= 1.0",
                ));
            }
            if b.max_interval_ms < b.initial_interval_ms {
                errors.push(ConfigError::error(
                    "engines.dialogflow.backoff.max_interval_ms",
                    "max_interval_ms must be >= initial_interval_ms",
                ));
            }
        }

        if self.aicall.history_limit == 0 {
            errors.push(ConfigError::error(
                "aicall.history_limit",
                "history_limit must be greater than 0",
            ));
        }
        if self.aicall.stream_channel_capacity == 0 {
            errors.push(ConfigError::error(
                "aicall.stream_channel_capacity",
                "channel capacity must be greater than 0",
            ));
        }
        if self.aicall.turn_timeout_secs == 0 {
            errors.push(ConfigError::warning(
                "aicall.turn_timeout_secs",
                "turn deadline disabled; a stalled engine stream blocks the turn",
            ));
        }

        for (name, url) in self.services.urls() {
            if url.is_empty() {
                errors.push(ConfigError::error(
                    format!("services.{name}"),
                    "url must not be empty",
                ));
            }
        }
        if self.services.webhook_url.is_none() {
            errors.push(ConfigError::warning(
                "services.webhook_url",
                "no webhook sink configured; events are only logged",
            ));
        }

        if self.server.cors.allowed_origins.len() == 1
            && self.server.cors.allowed_origins[0] == "*"
        {
            errors.push(ConfigError::warning(
                "server.cors.allowed_origins",
                "wildcard \"*\" allows all origins (not recommended for production)",
            ));
        }

        errors
    }
}
