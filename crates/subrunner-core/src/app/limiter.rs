//! OutstandingLimiter - 未 ack メッセージ数の上限
//!
//! A counting admission gate over `tokio::sync::Semaphore`, which hands out
//! permits in FIFO order, so a waiter is never overtaken indefinitely.
//!
//! One limiter lives for one session and is passed by `Arc` to the receive
//! loop and the ack tracker; there is no process-wide counter.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio_util::sync::CancellationToken;

use crate::domain::Cancelled;

#[derive(Debug)]
pub struct OutstandingLimiter {
    sem: Arc<Semaphore>,
    max: usize,
    counts: Arc<Counts>,
}

#[derive(Debug, Default)]
struct Counts {
    outstanding: AtomicUsize,
    peak: AtomicUsize,
}

impl OutstandingLimiter {
    pub fn new(max: usize) -> Self {
        Self {
            sem: Arc::new(Semaphore::new(max)),
            max,
            counts: Arc::new(Counts::default()),
        }
    }

    /// Wait for a free slot and take it.
    ///
    /// Returns `Cancelled` if `cancel` fires first; no slot is held then.
    pub async fn acquire(&self, cancel: &CancellationToken) -> Result<Slot, Cancelled> {
        let permit = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(Cancelled),
            permit = Arc::clone(&self.sem).acquire_owned() => permit.map_err(|_| Cancelled)?,
        };
        Ok(self.admit(permit))
    }

    /// Take a slot only if one is free right now.
    pub fn try_acquire(&self) -> Option<Slot> {
        Arc::clone(&self.sem)
            .try_acquire_owned()
            .ok()
            .map(|permit| self.admit(permit))
    }

    fn admit(&self, permit: OwnedSemaphorePermit) -> Slot {
        let now = self.counts.outstanding.fetch_add(1, Ordering::AcqRel) + 1;
        self.counts.peak.fetch_max(now, Ordering::AcqRel);
        Slot {
            permit: Some(permit),
            counts: Arc::clone(&self.counts),
        }
    }

    /// Slots currently held.
    pub fn outstanding(&self) -> usize {
        self.counts.outstanding.load(Ordering::Acquire)
    }

    /// Highest `outstanding()` ever observed.
    pub fn peak(&self) -> usize {
        self.counts.peak.load(Ordering::Acquire)
    }

    pub fn max(&self) -> usize {
        self.max
    }
}

/// One admitted message. Released by `release()` or on drop, exactly once.
#[derive(Debug)]
pub struct Slot {
    permit: Option<OwnedSemaphorePermit>,
    counts: Arc<Counts>,
}

impl Slot {
    pub fn release(mut self) {
        self.release_inner();
    }

    fn release_inner(&mut self) {
        if let Some(permit) = self.permit.take() {
            // 先にカウンタを下げてから permit を返す（outstanding <= max を保つ）
            self.counts.outstanding.fetch_sub(1, Ordering::AcqRel);
            drop(permit);
        }
    }
}

impl Drop for Slot {
    fn drop(&mut self) {
        self.release_inner();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn acquire_counts_up_to_max() {
        let limiter = OutstandingLimiter::new(2);
        let token = CancellationToken::new();

        let a = limiter.acquire(&token).await.unwrap();
        let b = limiter.acquire(&token).await.unwrap();
        assert_eq!(limiter.outstanding(), 2);
        assert!(limiter.try_acquire().is_none());

        a.release();
        assert_eq!(limiter.outstanding(), 1);
        drop(b);
        assert_eq!(limiter.outstanding(), 0);
        assert_eq!(limiter.peak(), 2);
    }

    #[tokio::test]
    async fn acquire_blocks_until_release() {
        let limiter = Arc::new(OutstandingLimiter::new(1));
        let token = CancellationToken::new();
        let held = limiter.acquire(&token).await.unwrap();

        let waiter = tokio::spawn({
            let limiter = Arc::clone(&limiter);
            let token = token.clone();
            async move { limiter.acquire(&token).await.map(|_| ()) }
        });

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!waiter.is_finished());

        held.release();
        let got = tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .unwrap()
            .unwrap();
        assert!(got.is_ok());
    }

    #[tokio::test]
    async fn blocked_acquire_returns_cancelled() {
        let limiter = Arc::new(OutstandingLimiter::new(1));
        let token = CancellationToken::new();
        let _held = limiter.acquire(&token).await.unwrap();

        let waiter = tokio::spawn({
            let limiter = Arc::clone(&limiter);
            let token = token.clone();
            async move { limiter.acquire(&token).await.map(|_| ()) }
        });

        tokio::time::sleep(Duration::from_millis(20)).await;
        token.cancel();

        let got = tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(got, Err(Cancelled));
        assert_eq!(limiter.outstanding(), 1);
    }

    #[tokio::test]
    async fn waiters_are_served_in_arrival_order() {
        let limiter = Arc::new(OutstandingLimiter::new(1));
        let token = CancellationToken::new();
        let held = limiter.acquire(&token).await.unwrap();
        let order = Arc::new(std::sync::Mutex::new(Vec::new()));

        let mut joins = Vec::new();
        for i in 0..3 {
            let limiter = Arc::clone(&limiter);
            let token = token.clone();
            let order = Arc::clone(&order);
            joins.push(tokio::spawn(async move {
                let slot = limiter.acquire(&token).await.unwrap();
                order.lock().unwrap().push(i);
                tokio::time::sleep(Duration::from_millis(5)).await;
                slot.release();
            }));
            // 到着順を確定させる
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        held.release();
        for j in joins {
            j.await.unwrap();
        }
        assert_eq!(*order.lock().unwrap(), vec![0, 1, 2]);
    }
}
