//! # Output Subscriptions
//!
//! One registered output is one [`Subscription`]: a bounded queue, a stop
//! signal and a dedicated worker task that invokes the output serially.
//!
//! ## Handoff Rendezvous
//!
//! ```text
//!  publish ──send──────────────┐
//!          ──stop.wait_for()──┐│   first one to resolve wins
//!                             ▼▼
//!                      [ bounded queue ] ──► worker ──► output(msg)
//!                             ▲
//!  unsubscribe ──stop=true────┘  worker closes queue, drains accepted msgs
//! ```
//!
//! A message is either accepted into the queue (and then always handed to the
//! output) or the publisher observes the stop signal and abandons it. Closing
//! the queue on stop fails every pending `send`, so a publisher never waits on
//! a worker that has gone away.

use shared_types::Message;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

/// An output: a function invoked once per published message.
///
/// Outputs may block; they run on the blocking thread pool.
pub type OutputFn = Arc<dyn Fn(Message) + Send + Sync + 'static>;

/// Errors from hub registry operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum HubError {
    /// The hub was closed.
    #[error("broadcast hub closed")]
    Closed,

    /// Subscription tags identify outputs and must not be empty.
    #[error("subscription tag must not be empty")]
    EmptyTag,
}

/// Publisher-side view of one subscription.
#[derive(Clone)]
pub(crate) struct DeliveryHandle {
    tag: Arc<str>,
    sender: mpsc::Sender<Message>,
    stopped: watch::Receiver<bool>,
}

impl DeliveryHandle {
    /// Hand `message` to the worker, or give up once it is stopping.
    ///
    /// Returns `true` if the message was accepted into the queue.
    pub(crate) async fn deliver(&self, message: Message) -> bool {
        let mut stopped = self.stopped.clone();
        let accepted = tokio::select! {
            biased;
            _ = stopped.wait_for(|s| *s) => false,
            sent = self.sender.send(message) => sent.is_ok(),
        };
        if !accepted {
            debug!(tag = %self.tag, "Delivery abandoned, output unsubscribed");
        }
        accepted
    }
}

/// A registered output and its worker. Owned by the hub registry.
pub(crate) struct Subscription {
    handle: DeliveryHandle,
    stop: watch::Sender<bool>,
    worker: JoinHandle<()>,
}

impl Subscription {
    /// Start the worker for `output` under `tag`.
    ///
    /// Must be called from within a tokio runtime.
    pub(crate) fn spawn(
        tag: &str,
        output: OutputFn,
        queue_capacity: usize,
        handler_panics: Arc<AtomicU64>,
    ) -> Self {
        let tag: Arc<str> = Arc::from(tag);
        let (sender, queue) = mpsc::channel(queue_capacity.max(1));
        let (stop, stopped) = watch::channel(false);

        let worker = tokio::spawn(run_worker(
            Arc::clone(&tag),
            output,
            queue,
            stopped.clone(),
            handler_panics,
        ));

        Self {
            handle: DeliveryHandle {
                tag,
                sender,
                stopped,
            },
            stop,
            worker,
        }
    }

    pub(crate) fn handle(&self) -> DeliveryHandle {
        self.handle.clone()
    }

    /// Signal the worker to stop and wait until it has drained.
    pub(crate) async fn shutdown(self) {
        self.stop.send_replace(true);
        if let Err(e) = self.worker.await {
            warn!(tag = %self.handle.tag, error = %e, "Output worker did not stop cleanly");
        }
    }
}

async fn run_worker(
    tag: Arc<str>,
    output: OutputFn,
    mut queue: mpsc::Receiver<Message>,
    mut stopped: watch::Receiver<bool>,
    handler_panics: Arc<AtomicU64>,
) {
    debug!(tag = %tag, "Output worker started");

    loop {
        tokio::select! {
            biased;
            _ = async { drop(stopped.wait_for(|s| *s).await) } => break,
            next = queue.recv() => match next {
                Some(message) => invoke(&tag, &output, message, &handler_panics).await,
                None => break,
            },
        }
    }

    // Refuse new handoffs, then finish what was already accepted.
    queue.close();
    let mut drained = 0usize;
    while let Some(message) = queue.recv().await {
        invoke(&tag, &output, message, &handler_panics).await;
        drained += 1;
    }

    debug!(tag = %tag, drained, "Output worker stopped");
}

async fn invoke(tag: &str, output: &OutputFn, message: Message, handler_panics: &AtomicU64) {
    let output = Arc::clone(output);
    match tokio::task::spawn_blocking(move || output(message)).await {
        Ok(()) => {}
        Err(e) if e.is_panic() => {
            handler_panics.fetch_add(1, Ordering::Relaxed);
            error!(tag = %tag, "Output handler panicked, message dropped for this output");
        }
        Err(e) => {
            warn!(tag = %tag, error = %e, "Output handler was cancelled");
        }
    }
}
