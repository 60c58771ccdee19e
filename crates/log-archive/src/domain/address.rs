//! # Store Address
//!
//! The configured address selects the storage engine by URL scheme.
//!
//! | Address | Engine |
//! |---------|--------|
//! | `memory://` | in-memory, lost on exit |
//! | `rocksdb:///var/db/logs` | RocksDB (with the `rocksdb` feature) |
//! | `boltdb:///var/db/log_agg.bolt`, `file:///...`, `/var/db/...` | file journal |
//!
//! Unknown schemes fall back to the file journal.

use crate::domain::errors::AddressError;
use std::fmt;
use std::path::PathBuf;
use url::Url;

/// Storage engine selected by an address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineKind {
    Memory,
    File,
    RocksDb,
}

impl fmt::Display for EngineKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            EngineKind::Memory => "memory",
            EngineKind::File => "file",
            EngineKind::RocksDb => "rocksdb",
        })
    }
}

/// A parsed store address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreAddress {
    pub engine: EngineKind,
    /// Location on disk; `None` for the memory engine.
    pub path: Option<PathBuf>,
    /// Scheme as written, lowercased (`""` for a bare path).
    pub scheme: String,
}

impl StoreAddress {
    pub fn parse(address: &str) -> Result<Self, AddressError> {
        let address = address.trim();
        if address.is_empty() {
            return Err(AddressError::Empty);
        }

        if !address.contains("://") {
            return Ok(Self {
                engine: EngineKind::File,
                path: Some(PathBuf::from(address)),
                scheme: String::new(),
            });
        }

        let url = Url::parse(address).map_err(|e| AddressError::Malformed {
            address: address.to_string(),
            reason: e.to_string(),
        })?;
        let scheme = url.scheme().to_ascii_lowercase();

        let engine = match scheme.as_str() {
            "memory" | "mem" => EngineKind::Memory,
            "rocksdb" => EngineKind::RocksDb,
            _ => EngineKind::File,
        };
        if engine == EngineKind::Memory {
            return Ok(Self {
                engine,
                path: None,
                scheme,
            });
        }

        let path = location(&url).ok_or_else(|| AddressError::MissingPath(address.to_string()))?;
        Ok(Self {
            engine,
            path: Some(path),
            scheme,
        })
    }
}

/// `scheme:///abs/path` yields `/abs/path`; `scheme://rel/path` keeps the
/// host as the first relative component.
fn location(url: &Url) -> Option<PathBuf> {
    let path = url.path();
    let joined = match url.host_str() {
        Some(host) if !host.is_empty() => format!("{host}{path}"),
        _ => path.to_string(),
    };
    if joined.is_empty() || joined == "/" {
        return None;
    }
    Some(PathBuf::from(joined))
}

impl fmt::Display for StoreAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.path {
            Some(path) => write!(f, "{}:{}", self.engine, path.display()),
            None => write!(f, "{}", self.engine),
        }
    }
}
