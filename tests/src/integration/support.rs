//! Shared fixtures.

use logagg_node::{NodeConfig, NodeRuntime};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

/// Poll budget for asynchronous archive writes.
pub const WAIT: Duration = Duration::from_secs(5);

/// In-memory node with the given retention rules.
pub fn memory_config(keep: &[(&str, &str)]) -> NodeConfig {
    NodeConfig {
        db_address: "memory://".to_string(),
        log_keep: keep
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect::<BTreeMap<_, _>>(),
        ..NodeConfig::default()
    }
}

/// File-journal node rooted at `path`.
pub fn file_config(path: &Path, keep: &[(&str, &str)]) -> NodeConfig {
    NodeConfig {
        db_address: format!("file://{}", path.display()),
        ..memory_config(keep)
    }
}

/// Poll the query boundary until `pairs` yields exactly `expected` results.
pub async fn wait_for_results(runtime: &NodeRuntime, pairs: &[(&str, &str)], expected: usize) {
    let deadline = tokio::time::Instant::now() + WAIT;
    loop {
        let found = runtime
            .query()
            .query(pairs.iter().copied())
            .unwrap()
            .len();
        if found == expected {
            return;
        }
        assert!(
            tokio::time::Instant::now() < deadline,
            "expected {expected} results for {pairs:?}, found {found}"
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}
