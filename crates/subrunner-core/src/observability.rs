use serde::{Deserialize, Serialize};

/// Per-session delivery counters.
///
/// `acked + nacked + expired` is the number of terminal outcomes; every
/// received delivery contributes exactly one once the session has drained.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryCounts {
    pub received: u64,
    pub acked: u64,
    pub nacked: u64,
    pub expired: u64,
    pub decode_errors: u64,
    pub handler_errors: u64,
    pub abandoned: u64,
    pub settle_failures: u64,
}

impl DeliveryCounts {
    pub fn terminal(&self) -> u64 {
        self.acked + self.nacked + self.expired
    }
}
