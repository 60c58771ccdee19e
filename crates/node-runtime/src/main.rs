//! # LogAgg
//!
//! Log aggregation server entry point.
//!
//! ```text
//! logagg [flags]
//!
//!   -c, --config-file <PATH>    config file location
//!   -d, --db-address <ADDR>     log storage address (default "boltdb:///var/db/log_agg.bolt")
//!   -k, --log-keep <JSON>       age or number of logs to keep per type (default '{"app":"2w"}')
//!   -l, --log-level <LEVEL>     level at which to log (default "info")
//!   -L, --log-type <TYPE>       default type for incoming logs (default "app")
//!   -v, --version               print version info and exit
//! ```
//!
//! ## Startup Sequence
//!
//! 1. Parse flags and environment, layer over the config file
//! 2. Initialize logging
//! 3. Start the node (hub, archive, boundaries)
//! 4. Run until Ctrl-C, then shut down gracefully

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;

use logagg_node::cli::{version_line, Cli};
use logagg_node::telemetry::init_logging;
use logagg_node::{NodeConfig, NodeRuntime};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    if cli.version {
        println!("{}", version_line());
        return Ok(());
    }

    let config = NodeConfig::load(&cli).context("Failed to load configuration")?;
    let level = config.log_severity().context("Invalid log level")?;
    init_logging(level, config.json_logs).context("Failed to initialize logging")?;

    let runtime = NodeRuntime::start(config).await?;

    info!("Node is running. Press Ctrl+C to stop.");
    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for shutdown signal")?;

    runtime.shutdown().await
}
