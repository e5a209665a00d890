use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tokio::time::Instant;

/// Key/value attributes attached to a delivery by the publisher.
pub type Attributes = BTreeMap<String, String>;

/// What a `MessageSource` hands out before decoding.
///
/// `ack_id` is the source-side identifier used to settle the delivery; the
/// engine never interprets it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawDelivery {
    pub ack_id: String,
    pub data: Vec<u8>,
    pub attributes: Attributes,
}

impl RawDelivery {
    pub fn new(ack_id: impl Into<String>, data: impl Into<Vec<u8>>) -> Self {
        Self {
            ack_id: ack_id.into(),
            data: data.into(),
            attributes: Attributes::new(),
        }
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }
}

/// Payload shape published onto the subscription.
///
/// All four fields are required; a payload missing one is a decode error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishedMessage {
    pub id: String,
    pub key: String,
    pub content: String,
    pub filename: String,
}

/// A decoded message, immutable once built.
///
/// Owned by the receive loop until it is submitted to the dispatch pool, then
/// by exactly one worker.
#[derive(Debug, Clone)]
pub struct Message {
    id: String,
    key: String,
    content: Vec<u8>,
    payload: Vec<u8>,
    object_name: String,
    attributes: Attributes,
    deadline: Instant,
}

impl Message {
    /// `payload` is the raw delivery body `published` was decoded from.
    pub fn new(
        published: PublishedMessage,
        payload: Vec<u8>,
        attributes: Attributes,
        deadline: Instant,
    ) -> Self {
        Self {
            id: published.id,
            key: published.key,
            content: published.content.into_bytes(),
            payload,
            object_name: published.filename,
            attributes,
            deadline,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn content(&self) -> &[u8] {
        &self.content
    }

    /// The undecoded delivery body; this is what forwarding uploads.
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Name under which forwarding stores the payload.
    pub fn object_name(&self) -> &str {
        &self.object_name
    }

    pub fn attributes(&self) -> &Attributes {
        &self.attributes
    }

    /// Point after which the message's ack handle expires.
    pub fn deadline(&self) -> Instant {
        self.deadline
    }
}
