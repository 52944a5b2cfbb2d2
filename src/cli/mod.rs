//! # CLI
//!
//! `apicheck run` executes a suite file against a live service and exits
//! according to the pass-rate threshold, so it can gate CI pipelines.

pub mod commands;

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::config::ConfigOverrides;

/// Process exit codes.
pub mod exit_codes {
    /// Pass rate met the threshold.
    pub const SUCCESS: u8 = 0;
    /// The run completed but fell below the threshold.
    pub const THRESHOLD_NOT_MET: u8 = 1;
    /// Configuration, suite or I/O error.
    pub const CONFIG_ERROR: u8 = 2;
}

#[derive(Debug, Parser)]
#[command(name = "apicheck", version, about = "Black-box HTTP API conformance runner")]
pub struct Cli {
    /// Log at debug level (RUST_LOG takes precedence)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub cmd: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run a suite file against the service under test
    Run(RunArgs),
    /// Check a suite file without sending any request
    Validate(ValidateArgs),
    /// List stored runs
    History(HistoryArgs),
}

#[derive(Debug, Args)]
pub struct RunArgs {
    /// Suite file (JSON)
    pub suite: PathBuf,

    #[arg(long, env = "APICHECK_BASE_URL")]
    pub base_url: Option<String>,

    /// Per-request timeout
    #[arg(long, env = "APICHECK_TIMEOUT_SECS")]
    pub timeout_secs: Option<u64>,

    /// Pause between consecutive cases
    #[arg(long, env = "APICHECK_DELAY_MS")]
    pub delay_ms: Option<u64>,

    /// Minimum pass rate in percent
    #[arg(long, env = "APICHECK_THRESHOLD")]
    pub threshold: Option<f64>,

    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,

    /// Also write the report to this file
    #[arg(long)]
    pub report: Option<PathBuf>,

    /// Store the run in this SQLite database
    #[arg(long, env = "APICHECK_HISTORY_DB")]
    pub history: Option<PathBuf>,
}

impl RunArgs {
    pub fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            base_url: self.base_url.clone(),
            timeout_secs: self.timeout_secs,
            delay_ms: self.delay_ms,
            threshold: self.threshold,
        }
    }
}

#[derive(Debug, Args)]
pub struct ValidateArgs {
    pub suite: PathBuf,
}

#[derive(Debug, Args)]
pub struct HistoryArgs {
    #[arg(long, env = "APICHECK_HISTORY_DB")]
    pub db: PathBuf,

    #[arg(long, default_value_t = 20)]
    pub limit: usize,

    /// Print the full stored report for one run
    #[arg(long, value_name = "RUN_ID")]
    pub show: Option<String>,

    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,
}

/// Output format for reports.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}
