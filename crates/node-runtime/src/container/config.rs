//! # Node Configuration
//!
//! Unified configuration for the hub, the archive and the process itself.
//!
//! ## Sources
//!
//! Lowest precedence first:
//!
//! 1. [`NodeConfig::default`]
//! 2. JSON config file (`--config-file`)
//! 3. `LOGAGG_*` environment variables
//! 4. CLI flags
//!
//! Environment variables and flags both arrive through [`Cli`], so this
//! module only layers the file under them.
//!
//! ## Validation
//!
//! [`NodeConfig::validate`] parses everything the runtime will need. Any
//! error is fatal before the hub or archive starts.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use log_archive::{
    AddressError, ArchiveConfig, RetentionError, RetentionPolicy, StoreAddress,
};
use serde::Deserialize;
use serde_json::Value;
use shared_bus::HubConfig;
use shared_types::{Severity, SeverityParseError};
use thiserror::Error;
use tracing::warn;

use crate::cli::Cli;

/// Default store address.
pub const DEFAULT_DB_ADDRESS: &str = "boltdb:///var/db/log_agg.bolt";

/// Default retention mapping, in `--log-keep` syntax.
pub const DEFAULT_LOG_KEEP: &str = r#"{"app":"2w"}"#;

/// Complete node configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeConfig {
    /// Store location; the scheme selects the engine.
    pub db_address: String,
    /// Retention policy string per log type.
    pub log_keep: BTreeMap<String, String>,
    /// Type given to incoming messages that carry none.
    pub log_type: String,
    /// Level the service itself logs at.
    pub log_level: String,
    /// Seconds between expiry passes.
    pub clean_frequency_secs: u64,
    /// Per-subscriber hub queue capacity.
    pub queue_capacity: usize,
    /// Emit service logs as JSON.
    pub json_logs: bool,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            db_address: DEFAULT_DB_ADDRESS.to_string(),
            log_keep: BTreeMap::from([("app".to_string(), "2w".to_string())]),
            log_type: "app".to_string(),
            log_level: "info".to_string(),
            clean_frequency_secs: 60,
            queue_capacity: shared_bus::DEFAULT_QUEUE_CAPACITY,
            json_logs: false,
        }
    }
}

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The config file could not be read.
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The config file is not valid JSON of the expected shape.
    #[error("failed to parse config file {path}: {message}")]
    Parse { path: PathBuf, message: String },

    /// `log-keep` is not a JSON object of strings or counts.
    #[error("invalid log-keep mapping: {0}")]
    InvalidLogKeep(String),

    /// A retention policy does not follow the grammar.
    #[error(transparent)]
    Retention(#[from] RetentionError),

    /// The store address is unusable.
    #[error(transparent)]
    Address(#[from] AddressError),

    /// Unknown log level name.
    #[error(transparent)]
    LogLevel(#[from] SeverityParseError),

    /// Incoming messages need a type to fall back on.
    #[error("default log type must not be empty")]
    EmptyLogType,

    /// Expiry interval of zero seconds.
    #[error("clean frequency must be a positive number of seconds")]
    ZeroCleanFrequency,

    /// Hub queues need room for at least one message.
    #[error("queue capacity must be at least 1")]
    ZeroQueueCapacity,
}

/// Config file shape. Every key is optional.
#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
struct FileConfig {
    db_address: Option<String>,
    /// Either an object or a string holding one.
    log_keep: Option<Value>,
    log_type: Option<String>,
    log_level: Option<String>,
    clean_frequency: Option<u64>,
    queue_capacity: Option<usize>,
    json_logs: Option<bool>,
    /// HTTP listener settings from older deployments; there is no listener
    /// to apply them to.
    listen_http: Option<Value>,
    cors_allow: Option<Value>,
}

impl NodeConfig {
    /// Build the configuration from defaults, the optional config file, and
    /// the parsed command line (which already carries the environment).
    pub fn load(cli: &Cli) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        if let Some(path) = &cli.config_file {
            config.merge_file(path)?;
        }
        config.merge_cli(cli)?;
        Ok(config)
    }

    /// Layer a JSON config file over the current values.
    pub fn merge_file(&mut self, path: &Path) -> Result<(), ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let file: FileConfig = serde_json::from_str(&text).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

        if let Some(v) = file.db_address {
            self.db_address = v;
        }
        if let Some(v) = file.log_keep {
            self.log_keep = match v {
                Value::String(s) => parse_log_keep(&s)?,
                other => log_keep_from_value(other)?,
            };
        }
        if let Some(v) = file.log_type {
            self.log_type = v;
        }
        if let Some(v) = file.log_level {
            self.log_level = v;
        }
        if let Some(v) = file.clean_frequency {
            self.clean_frequency_secs = v;
        }
        if let Some(v) = file.queue_capacity {
            self.queue_capacity = v;
        }
        if let Some(v) = file.json_logs {
            self.json_logs = v;
        }
        for (key, value) in [("listen-http", &file.listen_http), ("cors-allow", &file.cors_allow)] {
            if value.is_some() {
                warn!(path = %path.display(), key, "Ignoring HTTP setting in config file");
            }
        }
        Ok(())
    }

    /// Layer flags and environment variables over the current values.
    pub fn merge_cli(&mut self, cli: &Cli) -> Result<(), ConfigError> {
        if let Some(v) = &cli.db_address {
            self.db_address.clone_from(v);
        }
        if let Some(v) = &cli.log_keep {
            self.log_keep = parse_log_keep(v)?;
        }
        if let Some(v) = &cli.log_type {
            self.log_type.clone_from(v);
        }
        if let Some(v) = &cli.log_level {
            self.log_level.clone_from(v);
        }
        if let Some(v) = cli.clean_frequency {
            self.clean_frequency_secs = v;
        }
        if let Some(v) = cli.queue_capacity {
            self.queue_capacity = v;
        }
        if cli.json_logs {
            self.json_logs = true;
        }
        Ok(())
    }

    /// Check every setting the runtime depends on.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.archive_config()?;
        self.log_severity()?;
        if self.log_type.trim().is_empty() {
            return Err(ConfigError::EmptyLogType);
        }
        if self.queue_capacity == 0 {
            return Err(ConfigError::ZeroQueueCapacity);
        }
        Ok(())
    }

    /// Archive settings derived from this configuration.
    pub fn archive_config(&self) -> Result<ArchiveConfig, ConfigError> {
        if self.clean_frequency_secs == 0 {
            return Err(ConfigError::ZeroCleanFrequency);
        }
        let address = StoreAddress::parse(&self.db_address)?;
        let retention = RetentionPolicy::parse(&self.log_keep)?;
        Ok(ArchiveConfig::new(address, retention)
            .with_expiry_interval(Duration::from_secs(self.clean_frequency_secs)))
    }

    /// Hub settings derived from this configuration.
    #[must_use]
    pub fn hub_config(&self) -> HubConfig {
        HubConfig {
            queue_capacity: self.queue_capacity,
        }
    }

    /// The service's own log level.
    pub fn log_severity(&self) -> Result<Severity, ConfigError> {
        Ok(self.log_level.parse()?)
    }
}

/// Parse a `--log-keep` value: a JSON object mapping type to policy.
///
/// Counts may be given as JSON numbers (`{"deploy": 10}`).
pub fn parse_log_keep(text: &str) -> Result<BTreeMap<String, String>, ConfigError> {
    let value: Value =
        serde_json::from_str(text).map_err(|e| ConfigError::InvalidLogKeep(e.to_string()))?;
    log_keep_from_value(value)
}

fn log_keep_from_value(value: Value) -> Result<BTreeMap<String, String>, ConfigError> {
    let Value::Object(entries) = value else {
        return Err(ConfigError::InvalidLogKeep(
            "expected an object of type to policy".to_string(),
        ));
    };

    entries
        .into_iter()
        .map(|(log_type, policy)| {
            let policy = match policy {
                Value::String(s) => s,
                Value::Null => String::new(),
                Value::Number(n) => match n.as_u64() {
                    Some(count) => count.to_string(),
                    None => {
                        return Err(ConfigError::InvalidLogKeep(format!(
                            "'{log_type}': count must be a non-negative integer, got {n}"
                        )))
                    }
                },
                other => {
                    return Err(ConfigError::InvalidLogKeep(format!(
                        "'{log_type}': unsupported policy {other}"
                    )))
                }
            };
            Ok((log_type, policy))
        })
        .collect()
}
