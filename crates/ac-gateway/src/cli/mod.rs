pub mod config;
pub mod doctor;

use clap::{Parser, Subcommand};

/// Adaptation Core — a real-time adaptive-learning server for VR clients.
#[derive(Debug, Parser)]
#[command(name = "adaptation-core", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Start the gateway server (default when no subcommand is given).
    Serve,
    /// Run diagnostic checks against the current configuration.
    Doctor,
    /// Configuration utilities.
    #[command(subcommand)]
    Config(ConfigCommand),
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

// ── Config loading helper ─────────────────────────────────────────────

/// Load the configuration from the path specified by `ADC_CONFIG` (or
/// `config.toml` by default), then apply `ADC_*` environment overrides.
/// Returns the parsed [`ac_domain::config::Config`] and the path used.
///
/// Shared by `serve`, `doctor`, and `config` subcommands so the logic
/// lives in one place.
pub fn load_config() -> anyhow::Result<(ac_domain::config::Config, String)> {
    let config_path = std::env::var("ADC_CONFIG").unwrap_or_else(|_| "config.toml".into());

    let mut config = if std::path::Path::new(&config_path).exists() {
        let raw = std::fs::read_to_string(&config_path)
            .map_err(|e| anyhow::anyhow!("reading {config_path}: {e}"))?;
        toml::from_str(&raw).map_err(|e| anyhow::anyhow!("parsing {config_path}: {e}"))?
    } else {
        ac_domain::config::Config::default()
    };
    config.apply_env_overrides();

    Ok((config, config_path))
}
