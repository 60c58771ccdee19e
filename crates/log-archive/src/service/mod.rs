//! # Archive Engine
//!
//! Durable, queryable storage of messages with per-type retention.
//!
//! ## Lifecycle
//!
//! ```text
//! open() ──► start(hub) ──► Running ──► close() ──► Closed
//!               │              │            │
//!               │   subscribe  │ expiry     │ stop loop, unsubscribe (drain),
//!               └──"archive"───┘ loop       └─ close store
//! ```
//!
//! The engine implements [`ArchiveApi`](crate::ports::inbound::ArchiveApi)
//! for writes, queries and on-demand expiry.
//!
//! ## Locking
//!
//! Each bucket has its own lock holding its key clock. Queries share it for
//! the length of their scan; writes and prunes of that bucket take it
//! exclusively. Work on one bucket never waits on another, and store-wide
//! maintenance (journal compaction) runs with no bucket lock held.

mod archive;
mod expiry;

use crate::adapters::{open_store, BincodeMessageSerializer, SystemTimeSource};
use crate::domain::address::{EngineKind, StoreAddress};
use crate::domain::errors::ArchiveError;
use crate::domain::keys::{EntryKey, KeyClock};
use crate::domain::retention::RetentionPolicy;
use crate::ports::outbound::{KeyValueStore, MessageSerializer, TimeSource};
use parking_lot::RwLock;
use shared_bus::BroadcastHub;
use shared_types::Message;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

/// Hub subscription tag reserved for the archive's write path.
pub const ARCHIVE_TAG: &str = "archive";

/// Default expiry interval.
pub const DEFAULT_EXPIRY_INTERVAL: Duration = Duration::from_secs(60);

/// Archive configuration.
#[derive(Debug, Clone)]
pub struct ArchiveConfig {
    /// Where and in which engine entries are stored.
    pub store_address: StoreAddress,
    /// Per-type retention rules.
    pub retention: RetentionPolicy,
    /// Time between expiry passes.
    pub expiry_interval: Duration,
}

impl ArchiveConfig {
    pub fn new(store_address: StoreAddress, retention: RetentionPolicy) -> Self {
        Self {
            store_address,
            retention,
            expiry_interval: DEFAULT_EXPIRY_INTERVAL,
        }
    }

    #[must_use]
    pub fn with_expiry_interval(mut self, interval: Duration) -> Self {
        self.expiry_interval = interval;
        self
    }
}

impl Default for ArchiveConfig {
    /// In-memory store, no retention rules.
    fn default() -> Self {
        Self::new(
            StoreAddress {
                engine: EngineKind::Memory,
                path: None,
                scheme: "memory".to_string(),
            },
            RetentionPolicy::default(),
        )
    }
}

/// Dependencies for ArchiveEngine
pub struct ArchiveDependencies {
    pub store: Box<dyn KeyValueStore>,
    pub time_source: Arc<dyn TimeSource>,
    pub serializer: Arc<dyn MessageSerializer>,
}

impl ArchiveDependencies {
    /// Production time source and codec over `store`.
    pub fn with_store(store: Box<dyn KeyValueStore>) -> Self {
        Self {
            store,
            time_source: Arc::new(SystemTimeSource),
            serializer: Arc::new(BincodeMessageSerializer),
        }
    }
}

/// One bucket's key clock behind the lock that orders its writes, prunes
/// and scans.
pub(crate) type BucketLock = Arc<RwLock<KeyClock>>;

struct ExpiryTask {
    stop: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

#[derive(Default)]
struct Lifecycle {
    hub: Option<Arc<BroadcastHub>>,
    expiry: Option<ExpiryTask>,
}

/// The Archive Engine.
pub struct ArchiveEngine {
    pub(crate) store: Box<dyn KeyValueStore>,
    buckets: RwLock<HashMap<String, BucketLock>>,
    pub(crate) config: ArchiveConfig,
    pub(crate) time_source: Arc<dyn TimeSource>,
    pub(crate) serializer: Arc<dyn MessageSerializer>,
    /// Set when `close` begins; expiry passes are refused from here on.
    pub(crate) closing: AtomicBool,
    /// Set once the store is about to be released.
    pub(crate) closed: AtomicBool,
    write_failures: AtomicU64,
    lifecycle: Mutex<Lifecycle>,
}

impl ArchiveEngine {
    /// Build an engine over an already opened store.
    ///
    /// Recovers each bucket's key clock from its newest entry.
    pub fn open(config: ArchiveConfig, deps: ArchiveDependencies) -> Result<Self, ArchiveError> {
        let mut buckets = HashMap::new();
        for bucket in deps.store.buckets()? {
            let newest = match deps.store.last_key(&bucket)? {
                Some(last) => Some(EntryKey::decode(&last)?),
                None => None,
            };
            buckets.insert(bucket, Arc::new(RwLock::new(KeyClock::resume_after(newest))));
        }

        info!(
            address = %config.store_address,
            buckets = buckets.len(),
            retention_rules = config.retention.len(),
            "Archive opened"
        );

        Ok(Self {
            store: deps.store,
            buckets: RwLock::new(buckets),
            config,
            time_source: deps.time_source,
            serializer: deps.serializer,
            closing: AtomicBool::new(false),
            closed: AtomicBool::new(false),
            write_failures: AtomicU64::new(0),
            lifecycle: Mutex::new(Lifecycle::default()),
        })
    }

    /// Open the store named by `config`, subscribe to `hub` and start the
    /// expiry loop.
    pub async fn init(
        config: ArchiveConfig,
        hub: Arc<BroadcastHub>,
    ) -> Result<Arc<Self>, ArchiveError> {
        let store = open_store(&config.store_address)?;
        let engine = Arc::new(Self::open(config, ArchiveDependencies::with_store(store))?);
        engine.start(hub).await?;
        Ok(engine)
    }

    /// Attach the write path to `hub` under [`ARCHIVE_TAG`] and start the
    /// expiry loop.
    pub async fn start(self: &Arc<Self>, hub: Arc<BroadcastHub>) -> Result<(), ArchiveError> {
        let mut lifecycle = self.lifecycle.lock().await;
        if self.closing.load(Ordering::Acquire) {
            return Err(ArchiveError::Closed);
        }

        let engine = Arc::downgrade(self);
        hub.subscribe(ARCHIVE_TAG, move |message: Message| {
            if let Some(engine) = engine.upgrade() {
                engine.archive_published(&message);
            }
        })
        .await?;
        lifecycle.hub = Some(hub);

        if lifecycle.expiry.is_none() {
            let (stop, stopped) = watch::channel(false);
            let handle = tokio::spawn(expiry::run_loop(
                Arc::downgrade(self),
                self.config.expiry_interval,
                stopped,
            ));
            lifecycle.expiry = Some(ExpiryTask { stop, handle });
        }

        info!(
            tag = ARCHIVE_TAG,
            interval_secs = self.config.expiry_interval.as_secs_f64(),
            "Archive running"
        );
        Ok(())
    }

    /// Hub-facing write path: failures are logged and the message dropped.
    fn archive_published(&self, message: &Message) {
        use crate::ports::inbound::ArchiveApi;

        if let Err(e) = self.write(message) {
            self.write_failures.fetch_add(1, Ordering::Relaxed);
            error!(
                log_type = %message.log_type,
                id = %message.id,
                error = %e,
                "Failed to archive message"
            );
        }
    }

    /// Stop the expiry loop, detach from the hub, and release the store.
    ///
    /// Messages the hub already handed to the archive are written before the
    /// store closes. Safe to call more than once.
    pub async fn close(&self) -> Result<(), ArchiveError> {
        let mut lifecycle = self.lifecycle.lock().await;
        if self.closed.load(Ordering::Acquire) {
            return Ok(());
        }
        self.closing.store(true, Ordering::Release);

        if let Some(task) = lifecycle.expiry.take() {
            task.stop.send_replace(true);
            if let Err(e) = task.handle.await {
                warn!(error = %e, "Expiry loop did not stop cleanly");
            }
        }

        if let Some(hub) = lifecycle.hub.take() {
            hub.unsubscribe(ARCHIVE_TAG).await;
        }

        self.closed.store(true, Ordering::Release);
        let result = self.store.close();

        info!(
            write_failures = self.write_failures(),
            "Archive closed"
        );
        result.map_err(ArchiveError::from)
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Messages from the hub that could not be archived.
    #[must_use]
    pub fn write_failures(&self) -> u64 {
        self.write_failures.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn config(&self) -> &ArchiveConfig {
        &self.config
    }

    /// Lock for `log_type`, created on first use.
    pub(crate) fn bucket(&self, log_type: &str) -> BucketLock {
        if let Some(existing) = self.existing_bucket(log_type) {
            return existing;
        }
        let mut buckets = self.buckets.write();
        Arc::clone(buckets.entry(log_type.to_string()).or_default())
    }

    /// Lock for `log_type` if anything was ever stored under it.
    pub(crate) fn existing_bucket(&self, log_type: &str) -> Option<BucketLock> {
        self.buckets.read().get(log_type).cloned()
    }

    pub(crate) fn ensure_open(&self) -> Result<(), ArchiveError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(ArchiveError::Closed);
        }
        Ok(())
    }
}
