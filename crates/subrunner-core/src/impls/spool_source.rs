//! SpoolSource - ファイルに溜めたサブスクリプション
//!
//! Layout: `<spool_dir>/<project_id>/<subscription_id>.jsonl`, one raw payload
//! per line (blank lines are skipped). The file is read on `connect`; a
//! missing file is a connect failure. Deliveries that end up nacked or
//! expired are appended to `<subscription_id>.redeliver.jsonl` beside it.
//! Nothing reads that file back: every run replays the whole subscription
//! file, and replaying the redelivery file is left to the operator.

use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::info;

use crate::domain::{Outcome, RawDelivery, TransportError};
use crate::ports::MessageSource;

#[derive(Default)]
struct State {
    ready: VecDeque<RawDelivery>,
    in_flight: HashMap<String, Vec<u8>>,
}

pub struct SpoolSource {
    path: PathBuf,
    redeliver_path: PathBuf,
    state: Mutex<State>,
}

impl SpoolSource {
    pub fn new(spool_dir: impl AsRef<Path>, project_id: &str, subscription_id: &str) -> Self {
        let dir = spool_dir.as_ref().join(project_id);
        Self {
            path: dir.join(format!("{subscription_id}.jsonl")),
            redeliver_path: dir.join(format!("{subscription_id}.redeliver.jsonl")),
            state: Mutex::new(State::default()),
        }
    }

    pub fn redeliver_path(&self) -> &Path {
        &self.redeliver_path
    }

    async fn append_redelivery(&self, data: &[u8]) -> Result<(), TransportError> {
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.redeliver_path)
            .await
            .map_err(|e| TransportError::Settle(format!("{}: {e}", self.redeliver_path.display())))?;
        file.write_all(data).await?;
        file.write_all(b"\n").await?;
        file.flush().await?;
        Ok(())
    }
}

#[async_trait]
impl MessageSource for SpoolSource {
    async fn connect(&self) -> Result<(), TransportError> {
        let raw = tokio::fs::read(&self.path)
            .await
            .map_err(|e| TransportError::Connect(format!("{}: {e}", self.path.display())))?;

        let mut state = self.state.lock().await;
        for (n, line) in raw.split(|b| *b == b'\n').enumerate() {
            let line = line.strip_suffix(b"\r").unwrap_or(line);
            if line.iter().all(u8::is_ascii_whitespace) {
                continue;
            }
            state
                .ready
                .push_back(RawDelivery::new(format!("line-{}", n + 1), line));
        }
        info!(path = %self.path.display(), pending = state.ready.len(), "spool opened");
        Ok(())
    }

    async fn receive(&self) -> Result<Option<RawDelivery>, TransportError> {
        let mut state = self.state.lock().await;
        let Some(delivery) = state.ready.pop_front() else {
            return Ok(None);
        };
        state
            .in_flight
            .insert(delivery.ack_id.clone(), delivery.data.clone());
        Ok(Some(delivery))
    }

    async fn settle(&self, ack_id: &str, outcome: Outcome) -> Result<(), TransportError> {
        let data = self.state.lock().await.in_flight.remove(ack_id);
        let Some(data) = data else {
            return Err(TransportError::Settle(format!("unknown ack_id {ack_id}")));
        };
        match outcome {
            Outcome::Acked => Ok(()),
            Outcome::Nacked | Outcome::Expired => self.append_redelivery(&data).await,
        }
    }
}
