//! CLI for the zackup backup scheduler.

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use zackup_core::config::{self, ZackupConfig};

use commands::{run_hosts, run_once, run_serve};

/// Top-level CLI for zackup.
#[derive(Debug, Parser)]
#[command(name = "zackup")]
#[command(about = "zackup: parallel per-host backup scheduler", long_about = None)]
pub struct Cli {
    /// Config file (default: ~/.config/zackup/config.toml).
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Back up hosts once and exit.
    Run {
        /// Hosts to back up (default: all configured hosts).
        hosts: Vec<String>,
        /// Back up up to N hosts in parallel (overrides `parallel` from the config).
        #[arg(long, value_name = "N", allow_negative_numbers = true)]
        parallel: Option<i64>,
    },

    /// Back up all hosts periodically. SIGHUP reloads the config, Ctrl-C stops.
    Serve {
        /// Back up up to N hosts in parallel (overrides `parallel` from the config).
        #[arg(long, value_name = "N", allow_negative_numbers = true)]
        parallel: Option<i64>,
    },

    /// List configured hosts and their backup commands.
    Hosts,
}

/// Load the config from `path`, or from the default location (created if missing).
pub fn load_config(path: Option<&Path>) -> Result<ZackupConfig> {
    match path {
        Some(p) => config::load_from_path(p),
        None => config::load_or_init(),
    }
}

impl CliCommand {
    pub async fn run_from_args() -> Result<()> {
        let cli = Cli::parse();
        let config_path = cli.config.as_deref();
        let cfg = load_config(config_path)?;
        tracing::debug!("loaded config: {:?}", cfg);

        match cli.command {
            CliCommand::Run { hosts, parallel } => run_once(&cfg, &hosts, parallel).await?,
            CliCommand::Serve { parallel } => run_serve(cfg, config_path, parallel).await?,
            CliCommand::Hosts => run_hosts(&cfg),
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests;
