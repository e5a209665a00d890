//! Message handlers.
//!
//! A handler receives a `Delivery` (message + ack handle). Returning `Ok`
//! acks and `Err` nacks, unless the handler already settled the handle itself.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info};

use super::ack_tracker::AckHandle;
use crate::domain::{HandlerError, Message};
use crate::ports::ContentStore;

/// A message handed to exactly one worker, with the handle that settles it.
#[derive(Debug, Clone)]
pub struct Delivery {
    pub message: Message,
    pub handle: AckHandle,
}

#[async_trait]
pub trait MessageHandler: Send + Sync {
    async fn handle(&self, delivery: &Delivery) -> Result<(), HandlerError>;
}

/// Logs each message and, when a store is configured, uploads the raw
/// delivery payload to `bucket` under the message's object name.
///
/// A failed upload is a `HandlerError`, so the message is nacked rather than
/// acked with its content lost.
pub struct ForwardingHandler {
    store: Option<Arc<dyn ContentStore>>,
    bucket: String,
}

impl ForwardingHandler {
    pub fn new(store: Arc<dyn ContentStore>, bucket: impl Into<String>) -> Self {
        Self {
            store: Some(store),
            bucket: bucket.into(),
        }
    }

    /// Log only, no forwarding.
    pub fn log_only() -> Self {
        Self {
            store: None,
            bucket: String::new(),
        }
    }
}

#[async_trait]
impl MessageHandler for ForwardingHandler {
    async fn handle(&self, delivery: &Delivery) -> Result<(), HandlerError> {
        let msg = &delivery.message;
        info!(
            message_id = msg.id(),
            key = msg.key(),
            bytes = msg.content().len(),
            "got message"
        );
        for (key, value) in msg.attributes() {
            debug!(message_id = msg.id(), %key, %value, "attribute");
        }

        let Some(store) = &self.store else {
            return Ok(());
        };
        store
            .store(&self.bucket, msg.object_name(), msg.payload())
            .await
            .map_err(|source| HandlerError::Forward {
                bucket: self.bucket.clone(),
                object: msg.object_name().to_string(),
                source,
            })
    }
}
