//! AckTracker - 未 ack ハンドルの台帳
//!
//! Every dispatched message is registered here together with its deadline and
//! its limiter slot. An entry leaves the registry exactly once, by one of:
//! - `complete` (ack or nack through an `AckHandle`)
//! - `sweep` (deadline passed, marked `Expired`)
//! - `abandon_all` (session drain gave up, nacked)
//!
//! Whoever removes the entry owns the terminal transition: it flips the
//! handle cell, releases the slot and settles the delivery with the source.
//! Redelivery itself is the source's business.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, warn};

use super::limiter::Slot;
use crate::domain::{
    AckError, DecodeError, HandleCell, HandleId, HandleState, NackReason, Outcome, Settle,
};
use crate::observability::DeliveryCounts;
use crate::ports::{IdGenerator, MessageSource};

struct Entry {
    ack_id: String,
    message_id: String,
    deadline: Instant,
    cell: Arc<HandleCell>,
    slot: Slot,
}

#[derive(Default)]
struct Stats {
    received: AtomicU64,
    acked: AtomicU64,
    nacked: AtomicU64,
    expired: AtomicU64,
    decode_errors: AtomicU64,
    handler_errors: AtomicU64,
    abandoned: AtomicU64,
    settle_failures: AtomicU64,
}

fn bump(counter: &AtomicU64) {
    counter.fetch_add(1, Ordering::Relaxed);
}

pub struct AckTracker {
    source: Arc<dyn MessageSource>,
    ids: Arc<dyn IdGenerator>,
    registry: Mutex<HashMap<HandleId, Entry>>,
    stats: Stats,
}

impl AckTracker {
    pub fn new(source: Arc<dyn MessageSource>, ids: Arc<dyn IdGenerator>) -> Self {
        Self {
            source,
            ids,
            registry: Mutex::new(HashMap::new()),
            stats: Stats::default(),
        }
    }

    /// Record a dispatched message. The returned handle is the only way to
    /// settle it before its deadline.
    pub async fn register(
        self: &Arc<Self>,
        ack_id: String,
        message_id: String,
        deadline: Instant,
        slot: Slot,
    ) -> AckHandle {
        let id = self.ids.handle_id();
        let cell = Arc::new(HandleCell::new());
        let entry = Entry {
            ack_id,
            message_id,
            deadline,
            cell: Arc::clone(&cell),
            slot,
        };
        self.registry.lock().await.insert(id, entry);
        bump(&self.stats.received);

        AckHandle {
            id,
            cell,
            tracker: Arc::clone(self),
        }
    }

    /// Account for a delivery that never became a `Message`: nack it and
    /// give its slot back.
    pub async fn reject(&self, err: &DecodeError, slot: Slot) {
        bump(&self.stats.received);
        bump(&self.stats.decode_errors);
        bump(&self.stats.nacked);
        slot.release();
        warn!(ack_id = %err.ack_id, error = %err, "decode failed, nacking");
        self.settle_source(&err.ack_id, Outcome::Nacked).await;
    }

    /// Apply a terminal ack/nack for `handle`.
    pub async fn complete(&self, handle: &AckHandle, settle: Settle) -> Result<(), AckError> {
        let entry = {
            let mut registry = self.registry.lock().await;
            registry.remove(&handle.id)
        };
        let Some(entry) = entry else {
            return Err(refusal(handle.cell.get()));
        };

        if Instant::now() >= entry.deadline {
            // sweep より先に期限切れを観測した
            self.expire(entry).await;
            return Err(AckError::Expired);
        }

        let outcome = settle.outcome();
        if let Err(seen) = entry.cell.finish(outcome.into()) {
            return Err(refusal(seen));
        }
        entry.slot.release();

        match settle {
            Settle::Ack => bump(&self.stats.acked),
            Settle::Nack(reason) => {
                bump(&self.stats.nacked);
                match reason {
                    NackReason::Handler => bump(&self.stats.handler_errors),
                    NackReason::Abandoned => bump(&self.stats.abandoned),
                    NackReason::Decode => bump(&self.stats.decode_errors),
                    NackReason::Requested => {}
                }
            }
        }
        debug!(message_id = %entry.message_id, outcome = outcome.as_str(), "settled");
        self.settle_source(&entry.ack_id, outcome).await;
        Ok(())
    }

    /// Expire every entry whose deadline is at or before `now`.
    pub async fn sweep(&self, now: Instant) -> usize {
        let expired: Vec<Entry> = {
            let mut registry = self.registry.lock().await;
            let due: Vec<HandleId> = registry
                .iter()
                .filter(|(_, e)| e.deadline <= now)
                .map(|(id, _)| *id)
                .collect();
            due.into_iter().filter_map(|id| registry.remove(&id)).collect()
        };

        let n = expired.len();
        for entry in expired {
            self.expire(entry).await;
        }
        n
    }

    /// Nack everything still outstanding. Used when the drain timeout elapses.
    pub async fn abandon_all(&self) -> usize {
        let entries: Vec<Entry> = {
            let mut registry = self.registry.lock().await;
            registry.drain().map(|(_, e)| e).collect()
        };

        let n = entries.len();
        for entry in entries {
            if entry.cell.finish(HandleState::Nacked).is_err() {
                continue;
            }
            entry.slot.release();
            bump(&self.stats.nacked);
            bump(&self.stats.abandoned);
            warn!(message_id = %entry.message_id, "abandoned during drain, nacking");
            self.settle_source(&entry.ack_id, Outcome::Nacked).await;
        }
        n
    }

    /// Registered handles that have not reached a terminal state.
    pub async fn pending(&self) -> usize {
        self.registry.lock().await.len()
    }

    pub fn counts(&self) -> DeliveryCounts {
        let s = &self.stats;
        let load = |c: &AtomicU64| c.load(Ordering::Relaxed);
        DeliveryCounts {
            received: load(&s.received),
            acked: load(&s.acked),
            nacked: load(&s.nacked),
            expired: load(&s.expired),
            decode_errors: load(&s.decode_errors),
            handler_errors: load(&s.handler_errors),
            abandoned: load(&s.abandoned),
            settle_failures: load(&s.settle_failures),
        }
    }

    async fn expire(&self, entry: Entry) {
        if entry.cell.finish(HandleState::Expired).is_err() {
            return;
        }
        entry.slot.release();
        bump(&self.stats.expired);
        warn!(message_id = %entry.message_id, "ack deadline elapsed, marking expired");
        self.settle_source(&entry.ack_id, Outcome::Expired).await;
    }

    async fn settle_source(&self, ack_id: &str, outcome: Outcome) {
        if let Err(e) = self.source.settle(ack_id, outcome).await {
            bump(&self.stats.settle_failures);
            warn!(ack_id, outcome = outcome.as_str(), error = %e, "settle failed");
        }
    }
}

fn refusal(seen: HandleState) -> AckError {
    match seen {
        HandleState::Expired => AckError::Expired,
        _ => AckError::AlreadyTerminal,
    }
}

/// Opaque reference to one dispatched message.
///
/// `ack()` / `nack()` succeed at most once across all clones; after the
/// deadline both fail with `AckError::Expired`.
#[derive(Clone)]
pub struct AckHandle {
    id: HandleId,
    cell: Arc<HandleCell>,
    tracker: Arc<AckTracker>,
}

impl AckHandle {
    pub fn id(&self) -> HandleId {
        self.id
    }

    pub fn state(&self) -> HandleState {
        self.cell.get()
    }

    pub async fn ack(&self) -> Result<(), AckError> {
        self.tracker.complete(self, Settle::Ack).await
    }

    pub async fn nack(&self) -> Result<(), AckError> {
        self.tracker.complete(self, Settle::Nack(NackReason::Requested)).await
    }

    pub(crate) async fn nack_with(&self, reason: NackReason) -> Result<(), AckError> {
        self.tracker.complete(self, Settle::Nack(reason)).await
    }
}

impl fmt::Debug for AckHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AckHandle")
            .field("id", &self.id)
            .field("state", &self.cell.get())
            .finish_non_exhaustive()
    }
}
