//! MessageSource port - 外部の pub/sub サブスクリプション
//!
//! The engine pulls deliveries one at a time and reports every terminal
//! outcome back. Redelivery policy, flow control on the wire and
//! authentication all live behind this trait.

use async_trait::async_trait;

use crate::domain::{Outcome, RawDelivery, TransportError};

#[async_trait]
pub trait MessageSource: Send + Sync {
    /// Establish the subscription. Called once per session before `receive`.
    async fn connect(&self) -> Result<(), TransportError>;

    /// Next delivery, waiting until one is available.
    ///
    /// `Ok(None)` means the subscription is exhausted. Must be cancel-safe:
    /// the receive loop drops this future when the session is cancelled.
    async fn receive(&self) -> Result<Option<RawDelivery>, TransportError>;

    /// Report the terminal outcome of a delivery.
    ///
    /// `Nacked` and `Expired` make the delivery a redelivery candidate.
    async fn settle(&self, ack_id: &str, outcome: Outcome) -> Result<(), TransportError>;
}
