//! ContentStore port - Blob ストレージ
//!
//! Destination for forwarded message payloads.

use async_trait::async_trait;

use crate::domain::StoreError;

#[async_trait]
pub trait ContentStore: Send + Sync {
    /// Write `content` as `object` inside `bucket`, replacing any previous
    /// object of the same name.
    async fn store(&self, bucket: &str, object: &str, content: &[u8]) -> Result<(), StoreError>;
}
