//! # Retention Enforcement
//!
//! Per-bucket pruning and the periodic expiry loop.

use super::ArchiveEngine;
use crate::domain::errors::{ArchiveError, KVStoreError};
use crate::domain::keys::EntryKey;
use crate::domain::retention::RetentionRule;
use crate::ports::inbound::ArchiveApi;
use crate::ports::outbound::{BatchOperation, KeyRange, KeyValueStore, ScanDirection};
use std::ops::ControlFlow;
use std::sync::Weak;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, warn};

/// Delete what `rule` no longer retains from `bucket` in one atomic batch.
///
/// The caller holds the bucket's exclusive lock. Returns the number of
/// entries removed.
pub(crate) fn prune_bucket(
    store: &dyn KeyValueStore,
    bucket: &str,
    rule: RetentionRule,
    now_nanos: i64,
) -> Result<usize, KVStoreError> {
    let (range, limit) = match rule {
        RetentionRule::Unbounded => return Ok(0),
        RetentionRule::Immediate => (KeyRange::all(), usize::MAX),
        RetentionRule::MaxAge(max_age) => {
            let max_age = i64::try_from(max_age.as_nanos()).unwrap_or(i64::MAX);
            let cutoff = now_nanos.saturating_sub(max_age);
            if cutoff <= 0 {
                return Ok(0);
            }
            let until = EntryKey::lower_bound(cutoff).encode().to_vec();
            (KeyRange::new(None, Some(until)), usize::MAX)
        }
        RetentionRule::MaxCount(keep) => {
            let total = store.count(bucket)?;
            let keep = usize::try_from(keep).unwrap_or(usize::MAX);
            if total <= keep {
                return Ok(0);
            }
            (KeyRange::all(), total - keep)
        }
    };

    let mut doomed = Vec::new();
    store
        .scan(bucket, &range, ScanDirection::Forward, &mut |key, _| {
            doomed.push(BatchOperation::delete(key));
            if doomed.len() >= limit {
                ControlFlow::Break(())
            } else {
                ControlFlow::Continue(())
            }
        })?;

    let removed = doomed.len();
    if removed > 0 {
        store.atomic_batch_write(bucket, doomed)?;
    }
    Ok(removed)
}

/// Run an expiry pass every `period` until `stopped` turns true.
///
/// The first pass happens one full period after start. Passes run on the
/// blocking pool since they touch the store.
pub(crate) async fn run_loop(
    engine: Weak<ArchiveEngine>,
    period: Duration,
    mut stopped: watch::Receiver<bool>,
) {
    let mut ticker = tokio::time::interval(period.max(Duration::from_millis(1)));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticker.tick().await;

    debug!(period_secs = period.as_secs_f64(), "Expiry loop started");
    loop {
        tokio::select! {
            biased;
            _ = async { drop(stopped.wait_for(|s| *s).await) } => break,
            _ = ticker.tick() => {
                let Some(engine) = engine.upgrade() else {
                    break;
                };
                match tokio::task::spawn_blocking(move || engine.expire()).await {
                    Ok(Ok(_report)) => {}
                    Ok(Err(ArchiveError::Closed)) => break,
                    Ok(Err(e)) => warn!(error = %e, "Expiry pass failed"),
                    Err(e) => error!(error = %e, "Expiry pass panicked"),
                }
            }
        }
    }
    debug!("Expiry loop stopped");
}
