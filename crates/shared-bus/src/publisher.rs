//! # Broadcast Hub
//!
//! Registry of active outputs and the publishing side of the bus.

use crate::subscriber::{DeliveryHandle, HubError, OutputFn, Subscription};
use crate::DEFAULT_QUEUE_CAPACITY;
use async_trait::async_trait;
use futures::future::join_all;
use parking_lot::RwLock;
use shared_types::Message;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info};

/// Trait for publishing messages to the bus.
///
/// The ingestion boundary depends on this rather than on the hub itself.
#[async_trait]
pub trait MessagePublisher: Send + Sync {
    /// Publish a message to every registered output.
    ///
    /// # Returns
    ///
    /// The number of outputs that accepted the message.
    async fn publish(&self, message: Message) -> usize;

    /// Get the total number of messages published.
    fn messages_published(&self) -> u64;
}

/// Hub tuning.
#[derive(Debug, Clone)]
pub struct HubConfig {
    /// Per-output queue depth. A full queue makes `publish` wait.
    pub queue_capacity: usize,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
        }
    }
}

/// In-process publish/subscribe hub.
///
/// Each output gets its own worker, so one output sees messages in exactly
/// the order `publish` was called while different outputs run independently.
pub struct BroadcastHub {
    /// Active subscriptions by tag.
    registry: RwLock<HashMap<String, Subscription>>,

    /// Serializes subscribe/unsubscribe/close, which await worker shutdown.
    mutation: Mutex<()>,

    config: HubConfig,

    closed: AtomicBool,

    /// Total messages published.
    messages_published: AtomicU64,

    /// Output invocations that panicked.
    handler_panics: Arc<AtomicU64>,
}

impl BroadcastHub {
    /// Create a new hub with default queue capacity.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(HubConfig::default())
    }

    /// Create a new hub with the given configuration.
    #[must_use]
    pub fn with_config(config: HubConfig) -> Self {
        Self {
            registry: RwLock::new(HashMap::new()),
            mutation: Mutex::new(()),
            config,
            closed: AtomicBool::new(false),
            messages_published: AtomicU64::new(0),
            handler_panics: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Register `output` under `tag`.
    ///
    /// An existing subscription with the same tag is torn down (its worker
    /// drained and stopped) before the new worker starts.
    pub async fn subscribe<F>(&self, tag: impl Into<String>, output: F) -> Result<(), HubError>
    where
        F: Fn(Message) + Send + Sync + 'static,
    {
        self.subscribe_output(tag, Arc::new(output)).await
    }

    /// Register an already shared output under `tag`.
    pub async fn subscribe_output(
        &self,
        tag: impl Into<String>,
        output: OutputFn,
    ) -> Result<(), HubError> {
        let tag = tag.into();
        if tag.is_empty() {
            return Err(HubError::EmptyTag);
        }

        let _guard = self.mutation.lock().await;
        if self.is_closed() {
            return Err(HubError::Closed);
        }

        let previous = self.registry.write().remove(&tag);
        if let Some(previous) = previous {
            debug!(tag = %tag, "Replacing existing subscription");
            previous.shutdown().await;
        }

        let subscription = Subscription::spawn(
            &tag,
            output,
            self.config.queue_capacity,
            Arc::clone(&self.handler_panics),
        );
        self.registry.write().insert(tag.clone(), subscription);

        info!(tag = %tag, "Output subscribed");
        Ok(())
    }

    /// Remove the subscription under `tag` and wait for its worker to stop.
    ///
    /// Returns `false` if nothing was registered under `tag`.
    pub async fn unsubscribe(&self, tag: &str) -> bool {
        let _guard = self.mutation.lock().await;

        let removed = self.registry.write().remove(tag);
        let Some(subscription) = removed else {
            debug!(tag = %tag, "Unsubscribe for unknown tag");
            return false;
        };
        subscription.shutdown().await;

        info!(tag = %tag, "Output unsubscribed");
        true
    }

    /// Unsubscribe everything and wait for all workers to drain.
    ///
    /// Later `subscribe` calls fail and `publish` becomes a no-op.
    pub async fn close(&self) {
        let _guard = self.mutation.lock().await;
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }

        let subscriptions: Vec<Subscription> =
            self.registry.write().drain().map(|(_, s)| s).collect();
        let count = subscriptions.len();
        join_all(subscriptions.into_iter().map(Subscription::shutdown)).await;

        info!(outputs = count, "Broadcast hub closed");
    }

    /// Whether `close` has been called.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Number of registered outputs.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.registry.read().len()
    }

    /// Tags of registered outputs, sorted.
    #[must_use]
    pub fn tags(&self) -> Vec<String> {
        let mut tags: Vec<String> = self.registry.read().keys().cloned().collect();
        tags.sort();
        tags
    }

    /// Number of output invocations that panicked.
    #[must_use]
    pub fn handler_panics(&self) -> u64 {
        self.handler_panics.load(Ordering::Relaxed)
    }

    /// Get the per-output queue capacity.
    #[must_use]
    pub fn queue_capacity(&self) -> usize {
        self.config.queue_capacity
    }

    fn snapshot(&self) -> Vec<DeliveryHandle> {
        self.registry
            .read()
            .values()
            .map(Subscription::handle)
            .collect()
    }
}

impl Default for BroadcastHub {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MessagePublisher for BroadcastHub {
    /// Hands the message to every output registered when the call began.
    ///
    /// Returns once each handoff was accepted or abandoned because the output
    /// was unsubscribed. Outputs may still be processing when this returns.
    async fn publish(&self, message: Message) -> usize {
        if self.is_closed() {
            debug!(log_type = %message.log_type, "Publish on closed hub ignored");
            return 0;
        }
        self.messages_published.fetch_add(1, Ordering::Relaxed);

        let targets = self.snapshot();
        if targets.is_empty() {
            debug!(log_type = %message.log_type, "Message published with no outputs");
            return 0;
        }

        let accepted = join_all(targets.iter().map(|t| t.deliver(message.clone())))
            .await
            .into_iter()
            .filter(|ok| *ok)
            .count();

        debug!(
            log_type = %message.log_type,
            outputs = targets.len(),
            accepted,
            "Message published"
        );
        accepted
    }

    fn messages_published(&self) -> u64 {
        self.messages_published.load(Ordering::Relaxed)
    }
}
