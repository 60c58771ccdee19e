//! # Subsystem Container
//!
//! Holds the hub and the archive with their wiring.
//!
//! ## Initialization Order
//!
//! ```text
//! Phase 1: Broadcast hub (no dependencies)
//! Phase 2: Archive (opens the store, subscribes to the hub, starts expiry)
//! ```
//!
//! Shutdown runs the other way round: the archive detaches and drains
//! before the hub closes.

use std::sync::Arc;

use anyhow::{Context, Result};
use log_archive::ArchiveEngine;
use shared_bus::BroadcastHub;
use tracing::{info, instrument};

use crate::container::config::NodeConfig;

/// Central container holding the running subsystems.
pub struct SubsystemContainer {
    /// Fan-out point for every ingested message.
    pub hub: Arc<BroadcastHub>,

    /// Durable store; also the query target.
    pub archive: Arc<ArchiveEngine>,

    /// Node configuration (immutable after initialization).
    pub config: NodeConfig,
}

impl SubsystemContainer {
    /// Validate `config` and bring up hub and archive.
    #[instrument(name = "subsystem_init", skip(config))]
    pub async fn start(config: NodeConfig) -> Result<Self> {
        config.validate().context("Invalid configuration")?;
        let archive_config = config.archive_config()?;

        info!("Phase 1: Creating broadcast hub");
        let hub = Arc::new(BroadcastHub::with_config(config.hub_config()));
        info!(queue_capacity = hub.queue_capacity(), "  Hub ready");

        info!("Phase 2: Opening archive");
        let archive = ArchiveEngine::init(archive_config, Arc::clone(&hub))
            .await
            .with_context(|| format!("Failed to open archive at '{}'", config.db_address))?;
        info!(
            outputs = hub.subscriber_count(),
            "  Archive subscribed and expiry loop running"
        );

        Ok(Self {
            hub,
            archive,
            config,
        })
    }

    /// Close the archive, then the hub.
    pub async fn shutdown(&self) -> Result<()> {
        let archived = self.archive.close().await.context("Failed to close archive");
        self.hub.close().await;
        archived
    }
}
