//! InMemorySource - テスト・組み込み用のサブスクリプション
//!
//! - `Mutex<State>` + `Notify` で blocking receive
//! - `close()` 後、キューが空になったら `Ok(None)`（exhausted）
//! - `fail_next_receive()` で transport 障害を注入できる
//! - settle された結果を記録する

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use tokio::sync::{Mutex, Notify};

use crate::domain::{Outcome, RawDelivery, TransportError};
use crate::ports::MessageSource;

#[derive(Default)]
struct State {
    ready: VecDeque<RawDelivery>,
    closed: bool,
    fail_connect: Option<String>,
    fail_receive: Option<String>,
    settlements: Vec<(String, Outcome)>,
}

pub struct InMemorySource {
    state: Arc<Mutex<State>>,
    notify: Arc<Notify>,
    received: AtomicUsize,
}

impl InMemorySource {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(State::default())),
            notify: Arc::new(Notify::new()),
            received: AtomicUsize::new(0),
        }
    }

    /// Source pre-loaded with `deliveries` and already closed.
    pub async fn with_deliveries(deliveries: impl IntoIterator<Item = RawDelivery>) -> Self {
        let source = Self::new();
        for d in deliveries {
            source.push(d).await;
        }
        source.close().await;
        source
    }

    pub async fn push(&self, delivery: RawDelivery) {
        self.state.lock().await.ready.push_back(delivery);
        self.notify.notify_one();
    }

    /// No more deliveries will arrive; `receive` returns `None` once drained.
    pub async fn close(&self) {
        self.state.lock().await.closed = true;
        self.notify.notify_waiters();
    }

    pub async fn fail_connect(&self, reason: impl Into<String>) {
        self.state.lock().await.fail_connect = Some(reason.into());
    }

    /// The next `receive` call fails with a transport error.
    pub async fn fail_next_receive(&self, reason: impl Into<String>) {
        self.state.lock().await.fail_receive = Some(reason.into());
        self.notify.notify_waiters();
    }

    pub async fn settlements(&self) -> Vec<(String, Outcome)> {
        self.state.lock().await.settlements.clone()
    }

    /// Deliveries still waiting to be received.
    pub async fn remaining(&self) -> usize {
        self.state.lock().await.ready.len()
    }

    /// Deliveries handed out so far.
    pub fn received(&self) -> usize {
        self.received.load(Ordering::Acquire)
    }
}

impl Default for InMemorySource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MessageSource for InMemorySource {
    async fn connect(&self) -> Result<(), TransportError> {
        match self.state.lock().await.fail_connect.take() {
            Some(reason) => Err(TransportError::Connect(reason)),
            None => Ok(()),
        }
    }

    async fn receive(&self) -> Result<Option<RawDelivery>, TransportError> {
        loop {
            // notified() をロック前に作っておけば、その後の notify を取りこぼさない
            let notified = self.notify.notified();
            {
                let mut state = self.state.lock().await;
                if let Some(reason) = state.fail_receive.take() {
                    return Err(TransportError::Receive(reason));
                }
                if let Some(delivery) = state.ready.pop_front() {
                    self.received.fetch_add(1, Ordering::AcqRel);
                    return Ok(Some(delivery));
                }
                if state.closed {
                    return Ok(None);
                }
            }
            notified.await;
        }
    }

    async fn settle(&self, ack_id: &str, outcome: Outcome) -> Result<(), TransportError> {
        self.state
            .lock()
            .await
            .settlements
            .push((ack_id.to_string(), outcome));
        Ok(())
    }
}
