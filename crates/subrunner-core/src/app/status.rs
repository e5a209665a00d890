//! Status - セッション終了時のレポート

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::SessionId;
use crate::observability::DeliveryCounts;

/// What triggered cancellation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CancelCause {
    /// The caller's shutdown token fired (Ctrl-C, SIGTERM, embedding code).
    Shutdown,
    /// The session's own deadline elapsed.
    SessionTimeout,
}

/// Why the receive loop stopped pulling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "reason", content = "cause")]
pub enum StopReason {
    Cancelled(CancelCause),
    /// The source reported end of stream.
    Exhausted,
    TransportFailure,
}

impl StopReason {
    pub fn is_clean(&self) -> bool {
        !matches!(self, StopReason::TransportFailure)
    }
}

/// Summary of one receive session, produced whether it ended cleanly or not.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionReport {
    pub session_id: SessionId,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub stop_reason: StopReason,
    /// Messages whose handler succeeded and were acked.
    pub processed: u64,
    pub counts: DeliveryCounts,
    pub peak_outstanding: usize,
    /// Slots still held when the report was taken; 0 after a full drain.
    pub outstanding_at_finish: usize,
    pub max_outstanding: usize,
}
