//! ReceiveLoop - 1 セッション分の受信・配送
//!
//! # フロー
//! 1. `MessageSource::connect`
//! 2. slot を取る → receive → decode → tracker に登録 → pool へ submit
//! 3. 停止条件: shutdown token / session timeout / source の枯渇 / transport 障害
//! 4. 停止後は pull を止め、in-flight を drain timeout まで待つ
//! 5. 待ちきれなければ pool を abort し、残りを `Abandoned` として nack
//!
//! Transport failure is still drained before it is returned, so the
//! exactly-one-terminal-outcome rule holds on every exit path.

use std::sync::Arc;

use thiserror::Error;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, error, info, info_span, warn};

use super::ack_tracker::AckTracker;
use super::codec;
use super::dispatch_pool::DispatchPool;
use super::handler::{Delivery, MessageHandler};
use super::limiter::OutstandingLimiter;
use super::reaper_loop::ReaperLoop;
use super::status::{CancelCause, SessionReport, StopReason};
use crate::config::SessionConfig;
use crate::domain::{ErrorKind, NackReason, SessionId, TransportError};
use crate::ports::{Clock, IdGenerator, MessageSource};

/// A session that could not complete. The report covers whatever was
/// processed before the failure.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("transport failure: {source}")]
    Transport {
        #[source]
        source: TransportError,
        report: Box<SessionReport>,
    },
}

impl SessionError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            SessionError::Transport { .. } => ErrorKind::TransportFailure,
        }
    }

    pub fn report(&self) -> &SessionReport {
        match self {
            SessionError::Transport { report, .. } => report,
        }
    }
}

/// One bounded receive session. Built by `SessionBuilder`.
pub struct Session {
    pub(crate) id: SessionId,
    pub(crate) config: SessionConfig,
    pub(crate) source: Arc<dyn MessageSource>,
    pub(crate) handler: Arc<dyn MessageHandler>,
    pub(crate) clock: Arc<dyn Clock>,
    pub(crate) ids: Arc<dyn IdGenerator>,
}

/// How the pull loop ended.
enum Pulled {
    Stopped(StopReason),
    Failed(TransportError),
}

impl Session {
    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Run until `shutdown` fires, the session timeout elapses, the source
    /// is exhausted, or the transport fails.
    pub async fn run(self, shutdown: CancellationToken) -> Result<SessionReport, SessionError> {
        let span = info_span!("session", session_id = %self.id);
        self.run_inner(shutdown).instrument(span).await
    }

    async fn run_inner(self, shutdown: CancellationToken) -> Result<SessionReport, SessionError> {
        let started_at = self.clock.now();
        let limiter = OutstandingLimiter::new(self.config.max_outstanding);
        let tracker = Arc::new(AckTracker::new(
            Arc::clone(&self.source),
            Arc::clone(&self.ids),
        ));

        if let Err(e) = self.source.connect().await {
            error!(error = %e, "connect failed");
            let report = self.report(started_at, StopReason::TransportFailure, &tracker, &limiter);
            return Err(SessionError::Transport {
                source: e,
                report: Box::new(report),
            });
        }
        info!(
            pool_size = self.config.pool_size,
            max_outstanding = self.config.max_outstanding,
            "session started"
        );

        // session token = caller の token の子。timer が session timeout で cancel する
        let session = shutdown.child_token();
        let timer = tokio::spawn({
            let session = session.clone();
            let timeout = self.config.session_timeout;
            async move {
                tokio::select! {
                    _ = session.cancelled() => {}
                    _ = tokio::time::sleep(timeout) => {
                        info!("session timeout elapsed");
                        session.cancel();
                    }
                }
            }
            .in_current_span()
        });

        let reaper_stop = CancellationToken::new();
        let reaper = tokio::spawn(
            ReaperLoop::new(Arc::clone(&tracker), self.config.sweep_interval)
                .run(reaper_stop.clone())
                .in_current_span(),
        );

        let mut pool = DispatchPool::spawn(
            self.config.pool_size,
            self.config.max_outstanding,
            Arc::clone(&self.handler),
        );

        let pulled = self
            .pull(&session, &shutdown, &limiter, &tracker, &pool)
            .await;

        session.cancel();
        if let Err(e) = timer.await {
            debug!(error = %e, "session timer task failed");
        }

        self.drain(&mut pool, &tracker).await;
        reaper_stop.cancel();
        if let Err(e) = reaper.await {
            warn!(error = %e, "reaper task failed");
        }

        match pulled {
            Pulled::Stopped(reason) => {
                let report = self.report(started_at, reason, &tracker, &limiter);
                info!(
                    stop_reason = ?reason,
                    processed = report.processed,
                    received = report.counts.received,
                    "session finished"
                );
                Ok(report)
            }
            Pulled::Failed(e) => {
                error!(error = %e, "session ended by transport failure");
                let report = self.report(started_at, StopReason::TransportFailure, &tracker, &limiter);
                Err(SessionError::Transport {
                    source: e,
                    report: Box::new(report),
                })
            }
        }
    }

    async fn pull(
        &self,
        session: &CancellationToken,
        shutdown: &CancellationToken,
        limiter: &OutstandingLimiter,
        tracker: &Arc<AckTracker>,
        pool: &DispatchPool,
    ) -> Pulled {
        let cause = || {
            if shutdown.is_cancelled() {
                CancelCause::Shutdown
            } else {
                CancelCause::SessionTimeout
            }
        };

        loop {
            let Ok(slot) = limiter.acquire(session).await else {
                return Pulled::Stopped(StopReason::Cancelled(cause()));
            };

            // slot は drop で返却される
            let received = tokio::select! {
                biased;
                _ = session.cancelled() => return Pulled::Stopped(StopReason::Cancelled(cause())),
                received = self.source.receive() => received,
            };
            let raw = match received {
                Ok(Some(raw)) => raw,
                Ok(None) => {
                    info!("source exhausted");
                    return Pulled::Stopped(StopReason::Exhausted);
                }
                Err(e) => return Pulled::Failed(e),
            };

            let deadline = Instant::now() + self.config.message_deadline;
            let message = match codec::decode(&raw, deadline) {
                Ok(message) => message,
                Err(e) => {
                    tracker.reject(&e, slot).await;
                    continue;
                }
            };

            let handle = tracker
                .register(raw.ack_id, message.id().to_string(), deadline, slot)
                .await;
            debug!(message_id = message.id(), handle = %handle.id(), "dispatching");

            // キューが満杯のまま worker が詰まっても cancel で抜ける。
            // 捨てた delivery は tracker に残り、sweep か abandon_all が決着させる
            let submitted = tokio::select! {
                biased;
                _ = session.cancelled() => return Pulled::Stopped(StopReason::Cancelled(cause())),
                submitted = pool.submit(Delivery { message, handle }) => submitted,
            };
            if let Err(delivery) = submitted {
                // pool は drain まで閉じないので通常は起きない
                warn!(message_id = delivery.message.id(), "dispatch pool closed, nacking");
                settle_undispatched(&delivery).await;
            }
        }
    }

    async fn drain(&self, pool: &mut DispatchPool, tracker: &AckTracker) {
        let in_flight = tracker.pending().await;
        if in_flight > 0 {
            info!(in_flight, "draining");
        }

        pool.close();
        let drained = tokio::time::timeout(self.config.drain_timeout, pool.join()).await;
        if drained.is_err() {
            pool.abort();
            pool.join().await;
            let abandoned = tracker.abandon_all().await;
            warn!(abandoned, "drain timeout elapsed");
        }
    }

    fn report(
        &self,
        started_at: chrono::DateTime<chrono::Utc>,
        stop_reason: StopReason,
        tracker: &AckTracker,
        limiter: &OutstandingLimiter,
    ) -> SessionReport {
        let counts = tracker.counts();
        SessionReport {
            session_id: self.id,
            started_at,
            finished_at: self.clock.now(),
            stop_reason,
            processed: counts.acked,
            counts,
            peak_outstanding: limiter.peak(),
            outstanding_at_finish: limiter.outstanding(),
            max_outstanding: limiter.max(),
        }
    }
}

/// Nack a delivery no worker will see. Already settled or expired is fine.
async fn settle_undispatched(delivery: &Delivery) -> bool {
    match delivery.handle.nack_with(NackReason::Abandoned).await {
        Ok(()) => true,
        Err(e) => {
            debug!(message_id = delivery.message.id(), reason = %e, "terminal call skipped");
            false
        }
    }
}
