//! ReaperLoop - ack 期限切れの回収
//!
//! Drives `AckTracker::sweep` every `interval` until stopped. Redelivery of
//! expired messages is left to the source; this loop only detects expiry.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::ack_tracker::AckTracker;

pub struct ReaperLoop {
    tracker: Arc<AckTracker>,
    interval: Duration,
}

impl ReaperLoop {
    pub fn new(tracker: Arc<AckTracker>, interval: Duration) -> Self {
        Self { tracker, interval }
    }

    /// Sweep until `stop` fires. Returns how many handles were expired.
    pub async fn run(self, stop: CancellationToken) -> usize {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut total = 0;

        loop {
            tokio::select! {
                biased;
                _ = stop.cancelled() => break,
                _ = ticker.tick() => {
                    let n = self.tracker.sweep(Instant::now()).await;
                    if n > 0 {
                        debug!(expired = n, "sweep");
                    }
                    total += n;
                }
            }
        }
        total
    }
}
