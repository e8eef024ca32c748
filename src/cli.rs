//! CLI command definitions using clap.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// metasync - declarative metadata reconciliation
#[derive(Parser, Debug)]
#[command(name = "metasync")]
#[command(version)]
#[command(about = "Converge a remote object's key/value metadata onto a declared set")]
#[command(
    long_about = "metasync diffs the metadata declared in a configuration file against the last observed state, applies the difference to a remote store in delete, update, create order, and records the store's resulting listing as the next observed state."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Show the operations a pass would perform, without touching the remote
    Plan {
        /// Desired-state document (TOML, YAML or JSON)
        #[arg(short, long)]
        config: PathBuf,

        /// Observed-state file from the previous pass
        #[arg(short, long)]
        state: PathBuf,

        /// Output as JSON
        #[arg(long, default_value_t = false)]
        json: bool,
    },

    /// Reconcile the remote store and record the resulting state
    Apply {
        /// Desired-state document (TOML, YAML or JSON)
        #[arg(short, long)]
        config: PathBuf,

        /// Observed-state file; rewritten after the pass
        #[arg(short, long)]
        state: PathBuf,

        /// JSON document standing in for the remote metadata store
        #[arg(short, long)]
        remote: PathBuf,

        /// Dry run mode (preview only)
        #[arg(short, long, default_value_t = false)]
        dry_run: bool,
    },

    /// Print the recorded observed state
    Show {
        /// Observed-state file
        #[arg(short, long)]
        state: PathBuf,

        /// Output as JSON
        #[arg(long, default_value_t = false)]
        json: bool,
    },
}
