//! Command-line configuration.

use crate::commands::{Command, CommandResult};
use anyhow::Context;
use clap::{ArgAction, Parser};
use corelib::PlacementConfig;
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(
    name = "placement-sim",
    version,
    about = "Compute and inspect token placement tables"
)]
pub struct CliConfig {
    /// Placement config as JSON. Flags below override its fields.
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// log2 of the number of tokens.
    #[arg(long, global = true)]
    pub width: Option<u32>,

    /// Replicas per token.
    #[arg(long, global = true)]
    pub depth: Option<usize>,

    /// Leading rows that must hold live nodes (0 disables demotion).
    #[arg(long, global = true)]
    pub quorum: Option<usize>,

    /// Increase log verbosity (-v debug, -vv trace).
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

impl CliConfig {
    pub fn run(&self) -> CommandResult {
        setup_tracing(self.verbose);
        let config = self.placement_config()?;
        self.command.execute(&config)
    }

    /// The config file (or defaults) with command-line overrides applied.
    pub fn placement_config(&self) -> anyhow::Result<PlacementConfig> {
        let mut config = match &self.config {
            Some(path) => {
                let raw = std::fs::read_to_string(path)
                    .with_context(|| format!("reading config {}", path.display()))?;
                serde_json::from_str(&raw)
                    .with_context(|| format!("parsing config {}", path.display()))?
            }
            None => PlacementConfig::default(),
        };
        if let Some(width) = self.width {
            config.width = width;
        }
        if let Some(depth) = self.depth {
            config.depth = depth;
        }
        if let Some(quorum) = self.quorum {
            config.quorum_primaries = quorum;
        }
        config.validate()?;
        Ok(config)
    }
}

/// Respects `RUST_LOG` when set, otherwise derives the level from `-v`.
fn setup_tracing(verbose: u8) {
    use tracing_subscriber::EnvFilter;

    let level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    // A subscriber may already be installed when embedded in tests.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags_override_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"width": 4, "depth": 2}"#).unwrap();

        let cli = CliConfig::parse_from([
            "placement-sim",
            "--config",
            path.to_str().unwrap(),
            "--quorum",
            "1",
            "show",
            "--table",
            "table.json",
        ]);
        let config = cli.placement_config().unwrap();
        assert_eq!(config.width, 4);
        assert_eq!(config.depth, 2);
        assert_eq!(config.quorum_primaries, 1);
    }

    #[test]
    fn test_invalid_override_is_rejected() {
        let cli = CliConfig::parse_from([
            "placement-sim",
            "--depth",
            "9",
            "show",
            "--table",
            "t.json",
        ]);
        assert!(cli.placement_config().is_err());
    }
}
