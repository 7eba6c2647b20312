//! # CLI Interface
//!
//! Defines the command-line argument structure for `cosmo-node` using
//! `clap` derive. Supports four subcommands: `run`, `init`, `replay`,
//! and `version`.

use clap::{Parser, Subcommand, ValueEnum};
use cosmo_protocol::config::{DEFAULT_API_PORT, DEFAULT_METRICS_PORT};
use std::path::PathBuf;

use crate::logging::LogFormat;

/// Cosmo product store node.
///
/// Hosts one store ledger, persists its event log and state in sled, serves
/// the HTTP API, and exposes Prometheus metrics.
#[derive(Parser, Debug)]
#[command(
    name = "cosmo-node",
    about = "Cosmo product store ledger node",
    version,
    propagate_version = true
)]
pub struct CosmoNodeCli {
    /// Log output format.
    #[arg(long, global = true, value_enum, env = "COSMO_LOG_FORMAT", default_value_t = LogFormatArg::Pretty)]
    pub log_format: LogFormatArg,

    /// Default log level when `RUST_LOG` is not set.
    #[arg(long, global = true, default_value = "info")]
    pub log_level: String,

    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level subcommands for the node binary.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Open (or create) the ledger and serve the API.
    Run(RunArgs),
    /// Write a default store configuration into the data directory.
    Init(InitArgs),
    /// Apply a JSON script of operations to a fresh in-memory store and
    /// print every receipt.
    Replay(ReplayArgs),
    /// Print version information and exit.
    Version,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormatArg {
    Pretty,
    Json,
}

impl From<LogFormatArg> for LogFormat {
    fn from(arg: LogFormatArg) -> Self {
        match arg {
            LogFormatArg::Pretty => LogFormat::Pretty,
            LogFormatArg::Json => LogFormat::Json,
        }
    }
}

/// Arguments for the `run` subcommand.
#[derive(Parser, Debug)]
pub struct RunArgs {
    /// Path to the store configuration file (JSON).
    ///
    /// When omitted, the node looks for `store.json` in the data directory.
    /// Ignored if the data directory already holds a ledger snapshot.
    #[arg(long, short = 'c', env = "COSMO_CONFIG")]
    pub config: Option<PathBuf>,

    /// Directory holding the sled database and default config.
    ///
    /// Created on first run if it does not exist.
    #[arg(long, short = 'd', env = "COSMO_DATA_DIR", default_value = ".cosmo")]
    pub data_dir: PathBuf,

    /// Port for the HTTP API.
    #[arg(long, env = "COSMO_API_PORT", default_value_t = DEFAULT_API_PORT)]
    pub api_port: u16,

    /// Port for the Prometheus metrics endpoint.
    #[arg(long, env = "COSMO_METRICS_PORT", default_value_t = DEFAULT_METRICS_PORT)]
    pub metrics_port: u16,
}

/// Arguments for the `init` subcommand.
#[derive(Parser, Debug)]
pub struct InitArgs {
    /// Data directory to initialize.
    #[arg(long, short = 'd', env = "COSMO_DATA_DIR", default_value = ".cosmo")]
    pub data_dir: PathBuf,

    /// Principal that owns the store and the reward token.
    #[arg(long, default_value = "deployer")]
    pub owner: String,

    /// Use the legacy deployment parameters (rate 1000, price lookup returns
    /// quantity, store not pre-registered as minter).
    #[arg(long)]
    pub legacy: bool,

    /// Overwrite an existing configuration.
    #[arg(long)]
    pub force: bool,
}

/// Arguments for the `replay` subcommand.
#[derive(Parser, Debug)]
pub struct ReplayArgs {
    /// JSON array of operations.
    pub script: PathBuf,

    /// Store configuration (JSON). Defaults to a store owned by `deployer`.
    #[arg(long, short = 'c', env = "COSMO_CONFIG")]
    pub config: Option<PathBuf>,

    /// Stop at the first failing operation instead of reporting and continuing.
    #[arg(long)]
    pub fail_fast: bool,
}
