//! # Ingest Boundary
//!
//! Turns a submitted body into a [`Message`] and publishes it on the hub.
//!
//! ```text
//! body ──► JSON? ──yes──► Message ──┐
//!            │                      ├──► default type, stamp ──► hub.publish
//!            └──no──► raw content ──┘
//! ```
//!
//! A body that is not JSON at all is kept verbatim with priority 2 and the
//! `http-raw` tag. A body that is JSON but has the wrong shape is rejected.

use chrono::{DateTime, Utc};
use shared_bus::{BroadcastHub, MessagePublisher};
use shared_types::Message;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, trace};

/// Tag applied to bodies that were not JSON.
pub const RAW_TAG: &str = "http-raw";

/// Priority applied to bodies that were not JSON.
pub const RAW_PRIORITY: u8 = 2;

/// Rejected submissions.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum IngestError {
    /// JSON that does not describe a message, or a truncated document.
    #[error("{0}")]
    Malformed(String),
}

/// Publishes submitted bodies.
pub struct IngestBoundary {
    hub: Arc<BroadcastHub>,
    default_type: String,
}

impl IngestBoundary {
    pub fn new(hub: Arc<BroadcastHub>, default_type: impl Into<String>) -> Self {
        Self {
            hub,
            default_type: default_type.into(),
        }
    }

    /// Parse `body` and stamp it with the current time.
    pub fn message_from_body(&self, body: &[u8]) -> Result<Message, IngestError> {
        self.message_from_body_at(body, Utc::now())
    }

    /// Parse `body` and stamp it with `now`.
    pub fn message_from_body_at(
        &self,
        body: &[u8],
        now: DateTime<Utc>,
    ) -> Result<Message, IngestError> {
        let mut message = match serde_json::from_slice::<Message>(body) {
            Ok(message) => message,
            Err(e) if e.is_syntax() => raw_message(body),
            Err(e) => return Err(IngestError::Malformed(e.to_string())),
        };

        if message.log_type.is_empty() {
            message.log_type.clone_from(&self.default_type);
        }
        message.stamp(now);
        Ok(message)
    }

    /// Parse, stamp and publish `body`.
    ///
    /// Returns how many outputs accepted the message.
    pub async fn ingest(&self, body: &[u8]) -> Result<usize, IngestError> {
        let message = self.message_from_body(body)?;
        trace!(
            log_type = %message.log_type,
            id = %message.id,
            bytes = body.len(),
            "Message ingested"
        );
        let delivered = self.hub.publish(message).await;
        debug!(delivered, "Message published");
        Ok(delivered)
    }

    #[must_use]
    pub fn default_type(&self) -> &str {
        &self.default_type
    }
}

fn raw_message(body: &[u8]) -> Message {
    let content = String::from_utf8_lossy(body);
    let raw = match &content {
        std::borrow::Cow::Borrowed(_) => None,
        std::borrow::Cow::Owned(_) => Some(body.to_vec()),
    };
    Message {
        content: content.into_owned(),
        priority: RAW_PRIORITY,
        tags: vec![RAW_TAG.to_string()],
        raw,
        ..Message::default()
    }
}
