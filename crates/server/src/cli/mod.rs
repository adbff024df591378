pub mod config;
pub mod engine;

use clap::{Parser, Subcommand};

/// aicall: AI conversation session orchestrator.
#[derive(Debug, Parser)]
#[command(name = "aicall", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Start the API server (default when no subcommand is given).
    Serve,
    /// Configuration utilities.
    #[command(subcommand)]
    Config(ConfigCommand),
    /// Engine utilities.
    #[command(subcommand)]
    Engine(EngineCommand),
    /// Print version information.
    Version,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Parse the config file and report any errors.
    Validate,
    /// Dump the resolved configuration (with defaults) as TOML.
    Show,
}

#[derive(Debug, Subcommand)]
pub enum EngineCommand {
    /// Send one prompt to an engine and print the reply.
    Check {
        /// Engine model as `<target>.<model>` (e.g. "openai.gpt-4o").
        model: String,
        /// Prompt to send as a user message.
        #[arg(long, default_value = "Say hello in one short sentence.")]
        prompt: String,
        /// Output the full reply as JSON instead of plain text.
        #[arg(long)]
        json: bool,
    },
}

// ── Config loading helper ─────────────────────────────────────────────

/// Load the configuration from the path specified by `AC_CONFIG` (or
/// `config.toml` by default). Returns the parsed [`Config`] and the
/// path that was used.
///
/// [`Config`]: ac_domain::config::Config
pub fn load_config() -> anyhow::Result<(ac_domain::config::Config, String)> {
    let config_path = std::env::var("AC_CONFIG").unwrap_or_else(|_| "config.toml".into());

    let config = if std::path::Path::new(&config_path).exists() {
        let raw = std::fs::read_to_string(&config_path)
            .map_err(|e| anyhow::anyhow!("reading {config_path}: {e}"))?;
        toml::from_str(&raw).map_err(|e| anyhow::anyhow!("parsing {config_path}: {e}"))?
    } else {
        ac_domain::config::Config::default()
    };

    Ok((config, config_path))
}
