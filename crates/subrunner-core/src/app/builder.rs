//! SessionBuilder - セッションの構築とワイヤリング
//!
//! Fail-fast: 設定の不備は `build()` の時点で `BuildError` になり、
//! receive を始めてから気付くことはない。

use std::sync::Arc;

use thiserror::Error;

use super::handler::MessageHandler;
use super::receive_loop::Session;
use crate::config::{ConfigError, SessionConfig};
use crate::ports::{Clock, IdGenerator, MessageSource, SystemClock, UlidGenerator};

/// # 使用例
/// ```ignore
/// let session = SessionBuilder::new(source, handler)
///     .config(SessionConfig::from_env()?)
///     .build()?;
/// let report = session.run(shutdown).await?;
/// ```
pub struct SessionBuilder {
    source: Arc<dyn MessageSource>,
    handler: Arc<dyn MessageHandler>,
    config: SessionConfig,
    clock: Option<Arc<dyn Clock>>,
    ids: Option<Arc<dyn IdGenerator>>,
}

#[derive(Debug, Error)]
pub enum BuildError {
    #[error("invalid session config: {0}")]
    Config(#[from] ConfigError),
}

impl SessionBuilder {
    pub fn new(source: Arc<dyn MessageSource>, handler: Arc<dyn MessageHandler>) -> Self {
        Self {
            source,
            handler,
            config: SessionConfig::default(),
            clock: None,
            ids: None,
        }
    }

    pub fn config(mut self, config: SessionConfig) -> Self {
        self.config = config;
        self
    }

    /// Wall clock for report timestamps and id generation.
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn id_generator(mut self, ids: Arc<dyn IdGenerator>) -> Self {
        self.ids = Some(ids);
        self
    }

    pub fn build(self) -> Result<Session, BuildError> {
        self.config.validate()?;

        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock));
        let ids = self
            .ids
            .unwrap_or_else(|| Arc::new(UlidGenerator::new(ClockRef(Arc::clone(&clock)))));

        Ok(Session {
            id: ids.session_id(),
            config: self.config,
            source: self.source,
            handler: self.handler,
            clock,
            ids,
        })
    }
}

/// Shares the session clock with the default id generator.
struct ClockRef(Arc<dyn Clock>);

impl Clock for ClockRef {
    fn now(&self) -> chrono::DateTime<chrono::Utc> {
        self.0.now()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::handler::ForwardingHandler;
    use crate::impls::InMemorySource;
    use crate::ports::FixedClock;
    use chrono::{TimeZone, Utc};
    use std::time::Duration;

    fn builder() -> SessionBuilder {
        SessionBuilder::new(
            Arc::new(InMemorySource::new()),
            Arc::new(ForwardingHandler::log_only()),
        )
    }

    #[test]
    fn build_with_defaults() {
        let session = builder().build().unwrap();
        assert_eq!(session.config(), &SessionConfig::default());
    }

    #[test]
    fn invalid_config_fails_fast() {
        let config = SessionConfig {
            max_outstanding: 0,
            ..Default::default()
        };
        let err = builder().config(config).build().err().unwrap();
        assert!(matches!(err, BuildError::Config(ConfigError::Zero("max_outstanding"))));
    }

    #[test]
    fn zero_drain_timeout_is_allowed() {
        let config = SessionConfig {
            drain_timeout: Duration::ZERO,
            ..Default::default()
        };
        assert!(builder().config(config).build().is_ok());
    }

    #[test]
    fn session_id_follows_configured_clock() {
        let at = Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap();
        let session = builder()
            .clock(Arc::new(FixedClock::new(at)))
            .build()
            .unwrap();
        assert_eq!(
            session.id().as_ulid().timestamp_ms(),
            at.timestamp_millis() as u64
        );
    }
}
