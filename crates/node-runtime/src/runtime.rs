//! # Node Runtime
//!
//! Owns the container and the two boundaries built on it.
//!
//! ## Startup Sequence
//!
//! 1. Validate configuration
//! 2. Create the hub
//! 3. Open the archive (subscribes itself, starts the expiry loop)
//! 4. Build the ingest and query boundaries
//!
//! ## Shutdown Sequence
//!
//! 1. Archive: stop expiry, unsubscribe and drain accepted writes, close store
//! 2. Hub: stop and drain remaining outputs

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::Result;
use tracing::info;

use crate::container::{NodeConfig, SubsystemContainer};
use crate::handlers::{IngestBoundary, QueryBoundary};

/// The running node.
pub struct NodeRuntime {
    container: Arc<SubsystemContainer>,
    ingest: IngestBoundary,
    query: QueryBoundary,
    stopped: AtomicBool,
}

impl NodeRuntime {
    /// Start hub and archive from `config`.
    pub async fn start(config: NodeConfig) -> Result<Self> {
        info!("===========================================");
        info!("  LogAgg Node v{}", env!("CARGO_PKG_VERSION"));
        info!("===========================================");

        let container = Arc::new(SubsystemContainer::start(config).await?);
        let default_type = container.config.log_type.clone();
        let ingest = IngestBoundary::new(Arc::clone(&container.hub), default_type.clone());
        let query = QueryBoundary::new(Arc::clone(&container.archive), default_type);

        info!(
            db_address = %container.config.db_address,
            default_type = %container.config.log_type,
            clean_frequency_secs = container.config.clean_frequency_secs,
            "Node running"
        );

        Ok(Self {
            container,
            ingest,
            query,
            stopped: AtomicBool::new(false),
        })
    }

    /// Ingest endpoint.
    #[must_use]
    pub fn ingest(&self) -> &IngestBoundary {
        &self.ingest
    }

    /// Query endpoint.
    #[must_use]
    pub fn query(&self) -> &QueryBoundary {
        &self.query
    }

    /// Get a reference to the subsystem container.
    #[must_use]
    pub fn container(&self) -> Arc<SubsystemContainer> {
        Arc::clone(&self.container)
    }

    /// Shutdown the node gracefully. Later calls are no-ops.
    pub async fn shutdown(&self) -> Result<()> {
        if self.stopped.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        info!("Initiating graceful shutdown...");
        self.container.shutdown().await?;
        info!(
            messages_published = shared_bus::MessagePublisher::messages_published(
                self.container.hub.as_ref()
            ),
            handler_panics = self.container.hub.handler_panics(),
            archive_write_failures = self.container.archive.write_failures(),
            "Shutdown complete"
        );
        Ok(())
    }
}
