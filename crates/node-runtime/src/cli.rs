//! # Command Line
//!
//! Flags mirror the config file keys. Each flag can also come from a
//! `LOGAGG_*` environment variable; a flag on the command line wins.

use clap::Parser;
use std::path::PathBuf;

/// LogAgg log aggregation server.
#[derive(Parser, Debug, Clone, Default)]
#[command(name = "logagg")]
#[command(about = "Log aggregation server: fan-out, archive and query of structured logs")]
#[command(disable_version_flag = true)]
pub struct Cli {
    /// Config file location
    #[arg(short = 'c', long, env = "LOGAGG_CONFIG_FILE")]
    pub config_file: Option<PathBuf>,

    /// Log storage address (default "boltdb:///var/db/log_agg.bolt")
    #[arg(short = 'd', long, env = "LOGAGG_DB_ADDRESS")]
    pub db_address: Option<String>,

    /// Age or number of logs to keep per type, e.g. '{"app":"2w", "deploy": 10}'
    #[arg(short = 'k', long, env = "LOGAGG_LOG_KEEP")]
    pub log_keep: Option<String>,

    /// Level at which to log (default "info")
    #[arg(short = 'l', long, env = "LOGAGG_LOG_LEVEL")]
    pub log_level: Option<String>,

    /// Default type to apply to incoming logs (default "app")
    #[arg(short = 'L', long, env = "LOGAGG_LOG_TYPE")]
    pub log_type: Option<String>,

    /// Seconds between archive expiry passes
    #[arg(long, env = "LOGAGG_CLEAN_FREQUENCY", hide = true)]
    pub clean_frequency: Option<u64>,

    /// Per-output hub queue capacity
    #[arg(long, env = "LOGAGG_QUEUE_CAPACITY")]
    pub queue_capacity: Option<usize>,

    /// Emit service logs as JSON
    #[arg(long, env = "LOGAGG_JSON_LOGS")]
    pub json_logs: bool,

    /// Print version info and exit
    #[arg(short = 'v', long)]
    pub version: bool,
}

/// Version line printed by `--version`.
#[must_use]
pub fn version_line() -> String {
    format!("logagg {}", env!("CARGO_PKG_VERSION"))
}
