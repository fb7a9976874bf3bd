//! CLI command definitions.
//!
//! This module defines all CLI commands and their arguments using clap.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// l7pool - Declarative L7 load balancer pool reconciler.
#[derive(Parser, Debug)]
#[command(name = "l7pool")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to the configuration file.
    #[arg(short, long, global = true, env = "L7POOL_CONFIG")]
    pub config: Option<PathBuf>,

    /// Enable verbose output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output format (text, json).
    #[arg(long, global = true, default_value = "text")]
    pub output: OutputFormat,

    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Validate the pool configuration.
    Validate {
        /// Show all warnings, not just errors.
        #[arg(short, long)]
        warnings: bool,
    },

    /// Run one reconcile pass: sync every load balancer, then collect orphans.
    Sync {
        /// Reconcile against an in-memory cloud instead of the cloud file.
        #[arg(long)]
        dry_run: bool,
    },

    /// Reconcile continuously until interrupted.
    Run {
        /// Seconds between passes (defaults to gc.interval_secs).
        #[arg(long)]
        interval_secs: Option<u64>,

        /// Delete every tracked load balancer on exit.
        #[arg(long)]
        cleanup_on_exit: bool,

        /// Reconcile against an in-memory cloud instead of the cloud file.
        #[arg(long)]
        dry_run: bool,
    },

    /// Show the resources currently in the cloud file.
    Status,
}

/// Output format options.
#[derive(Debug, Clone, Copy, Default, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text output.
    #[default]
    Text,
    /// JSON output for scripting.
    Json,
}

impl Cli {
    /// Parses CLI arguments from the command line.
    #[must_use]
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_run_flags() {
        let cli = Cli::try_parse_from([
            "l7pool",
            "--config",
            "pool.yaml",
            "run",
            "--interval-secs",
            "5",
            "--cleanup-on-exit",
        ])
        .expect("parse failed");

        assert_eq!(cli.config, Some(PathBuf::from("pool.yaml")));
        assert!(matches!(
            cli.command,
            Commands::Run {
                interval_secs: Some(5),
                cleanup_on_exit: true,
                dry_run: false,
            }
        ));
    }

    #[test]
    fn test_parse_global_output_after_subcommand() {
        let cli = Cli::try_parse_from(["l7pool", "status", "--output", "json"]).expect("parse failed");
        assert!(matches!(cli.output, OutputFormat::Json));
        assert!(matches!(cli.command, Commands::Status));
    }
}
