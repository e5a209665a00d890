//! DispatchPool - 固定数ワーカーによる handler 実行
//!
//! - bounded mpsc を N 個のワーカーで共有する（`Arc<Mutex<Receiver>>`）
//! - `close()` で送信側を落とすと、キューを捌き切ったワーカーから終了する
//! - `join()` は途中でキャンセルされても JoinHandle を失わない
//! - `abort()` は drain timeout 後の強制停止。実行中の handler も止める

use std::sync::Arc;

use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, debug_span, warn};

use super::handler::{Delivery, MessageHandler};
use crate::domain::{HandlerError, NackReason};

type SharedReceiver = Arc<Mutex<mpsc::Receiver<Delivery>>>;

pub struct DispatchPool {
    tx: Option<mpsc::Sender<Delivery>>,
    joins: Vec<JoinHandle<()>>,
    abort: CancellationToken,
}

impl DispatchPool {
    /// Spawn `n` workers sharing a queue of `capacity` deliveries.
    pub fn spawn(n: usize, capacity: usize, handler: Arc<dyn MessageHandler>) -> Self {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let rx: SharedReceiver = Arc::new(Mutex::new(rx));
        let abort = CancellationToken::new();

        let joins = (0..n)
            .map(|worker_id| {
                let rx = Arc::clone(&rx);
                let handler = Arc::clone(&handler);
                let abort = abort.clone();
                tokio::spawn(
                    worker_loop(rx, handler, abort).instrument(debug_span!("worker", worker_id)),
                )
            })
            .collect();

        Self {
            tx: Some(tx),
            joins,
            abort,
        }
    }

    /// Queue a delivery for the next free worker.
    ///
    /// Hands the delivery back if the pool is already closed.
    pub async fn submit(&self, delivery: Delivery) -> Result<(), Delivery> {
        match &self.tx {
            Some(tx) => tx.send(delivery).await.map_err(|e| e.0),
            None => Err(delivery),
        }
    }

    /// No more submissions; workers exit once the queue is drained.
    pub fn close(&mut self) {
        self.tx = None;
    }

    /// Wait for every worker to exit.
    pub async fn join(&mut self) {
        while let Some(join) = self.joins.last_mut() {
            if let Err(e) = join.await {
                warn!(error = %e, "worker task failed");
            }
            self.joins.pop();
        }
    }

    /// Stop workers now, cancelling handlers still running. Their handles
    /// are left for the tracker to settle.
    pub fn abort(&mut self) {
        self.close();
        self.abort.cancel();
    }

    pub fn workers(&self) -> usize {
        self.joins.len()
    }
}

async fn worker_loop(rx: SharedReceiver, handler: Arc<dyn MessageHandler>, abort: CancellationToken) {
    loop {
        let next = {
            let mut rx = rx.lock().await;
            tokio::select! {
                biased;
                _ = abort.cancelled() => None,
                delivery = rx.recv() => delivery,
            }
        };
        let Some(delivery) = next else {
            break;
        };
        dispatch(&handler, delivery, &abort).await;
    }
    debug!("worker exiting");
}

async fn dispatch(handler: &Arc<dyn MessageHandler>, delivery: Delivery, abort: &CancellationToken) {
    let message_id = delivery.message.id().to_string();

    // 別タスクで走らせれば panic は JoinError として返ってくる
    let task = tokio::spawn({
        let handler = Arc::clone(handler);
        let delivery = delivery.clone();
        async move { handler.handle(&delivery).await }
    });
    let abort_handle = task.abort_handle();

    let joined = tokio::select! {
        joined = task => joined,
        _ = abort.cancelled() => {
            abort_handle.abort();
            debug!(%message_id, "handler aborted");
            return;
        }
    };

    let settled = match joined {
        Ok(Ok(())) => delivery.handle.ack().await,
        Ok(Err(e)) => {
            warn!(%message_id, error = %e, "handler failed, nacking");
            delivery.handle.nack_with(NackReason::Handler).await
        }
        Err(e) if e.is_panic() => {
            warn!(%message_id, error = %HandlerError::Panicked, "nacking");
            delivery.handle.nack_with(NackReason::Handler).await
        }
        Err(_) => return,
    };

    // handler 自身が ack 済み、または期限切れ
    if let Err(e) = settled {
        debug!(%message_id, reason = %e, "terminal call skipped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::ack_tracker::{AckHandle, AckTracker};
    use crate::app::limiter::OutstandingLimiter;
    use crate::domain::{HandleState, Message, Outcome, PublishedMessage};
    use crate::impls::InMemorySource;
    use crate::ports::{SystemClock, UlidGenerator};
    use async_trait::async_trait;
    use std::time::Duration;
    use tokio::time::Instant;

    struct Fixture {
        source: Arc<InMemorySource>,
        tracker: Arc<AckTracker>,
        limiter: OutstandingLimiter,
    }

    fn fixture() -> Fixture {
        let source = Arc::new(InMemorySource::new());
        Fixture {
            tracker: Arc::new(AckTracker::new(
                source.clone(),
                Arc::new(UlidGenerator::new(SystemClock)),
            )),
            source,
            limiter: OutstandingLimiter::new(64),
        }
    }

    impl Fixture {
        async fn delivery(&self, id: &str) -> Delivery {
            let slot = self.limiter.try_acquire().unwrap();
            let deadline = Instant::now() + Duration::from_secs(30);
            let handle = self.tracker.register(id.into(), id.into(), deadline, slot).await;
            let message = Message::new(
                PublishedMessage {
                    id: id.into(),
                    key: "k".into(),
                    content: String::new(),
                    filename: "f".into(),
                },
                Vec::new(),
                Default::default(),
                deadline,
            );
            Delivery { message, handle }
        }
    }

    /// Behaviour keyed on the message id.
    struct Scripted;

    #[async_trait]
    impl MessageHandler for Scripted {
        async fn handle(&self, d: &Delivery) -> Result<(), HandlerError> {
            match d.message.id() {
                "fail" => Err(HandlerError::other("boom")),
                "panic" => panic!("handler blew up"),
                "self-ack" => {
                    d.handle.ack().await.map_err(|e| HandlerError::other(e.to_string()))?;
                    Ok(())
                }
                "hang" => {
                    tokio::time::sleep(Duration::from_secs(3600)).await;
                    Ok(())
                }
                _ => Ok(()),
            }
        }
    }

    async fn state_after_drain(f: &Fixture, ids: &[&str]) -> Vec<AckHandle> {
        let mut pool = DispatchPool::spawn(4, 8, Arc::new(Scripted));
        let mut handles = Vec::new();
        for id in ids {
            let d = f.delivery(id).await;
            handles.push(d.handle.clone());
            pool.submit(d).await.unwrap();
        }
        pool.close();
        tokio::time::timeout(Duration::from_secs(5), pool.join())
            .await
            .unwrap();
        handles
    }

    #[tokio::test]
    async fn success_acks_and_error_nacks() {
        let f = fixture();
        let handles = state_after_drain(&f, &["ok", "fail"]).await;

        assert_eq!(handles[0].state(), HandleState::Acked);
        assert_eq!(handles[1].state(), HandleState::Nacked);
        let counts = f.tracker.counts();
        assert_eq!(counts.handler_errors, 1);
        assert_eq!(f.limiter.outstanding(), 0);
    }

    #[tokio::test]
    async fn panic_is_contained_and_nacked() {
        let f = fixture();
        let handles = state_after_drain(&f, &["panic", "ok", "ok2"]).await;

        assert_eq!(handles[0].state(), HandleState::Nacked);
        assert_eq!(handles[1].state(), HandleState::Acked);
        assert_eq!(handles[2].state(), HandleState::Acked);
        assert_eq!(f.tracker.counts().handler_errors, 1);
    }

    #[tokio::test]
    async fn handler_that_acks_itself_is_settled_once() {
        let f = fixture();
        let handles = state_after_drain(&f, &["self-ack"]).await;

        assert_eq!(handles[0].state(), HandleState::Acked);
        assert_eq!(
            f.source.settlements().await,
            vec![("self-ack".to_string(), Outcome::Acked)]
        );
    }

    #[tokio::test]
    async fn submit_after_close_hands_delivery_back() {
        let f = fixture();
        let mut pool = DispatchPool::spawn(1, 1, Arc::new(Scripted));
        pool.close();

        let d = f.delivery("late").await;
        let back = pool.submit(d).await.unwrap_err();
        assert_eq!(back.message.id(), "late");
        pool.join().await;
    }

    #[tokio::test]
    async fn abort_stops_hung_handlers() {
        let f = fixture();
        let mut pool = DispatchPool::spawn(2, 4, Arc::new(Scripted));
        let d = f.delivery("hang").await;
        let handle = d.handle.clone();
        pool.submit(d).await.unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;

        pool.abort();
        tokio::time::timeout(Duration::from_secs(1), pool.join())
            .await
            .unwrap();

        assert_eq!(pool.workers(), 0);
        assert_eq!(handle.state(), HandleState::Pending);
        assert_eq!(f.tracker.abandon_all().await, 1);
        assert_eq!(handle.state(), HandleState::Nacked);
    }
}
