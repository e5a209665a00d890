//! subrunner-core
//!
//! Bounded-concurrency consumption of pub/sub messages.
//!
//! # モジュール構成
//! - **domain**: ドメインモデル（ids, message, outcome, state, errors）
//! - **ports**: 抽象化レイヤー（MessageSource, ContentStore, Clock, IdGenerator）
//! - **app**: limiter, ack tracker, dispatch pool, receive loop, builder
//! - **impls**: 実装（InMemorySource, SpoolSource, LocalContentStore）
//! - **config**: `SessionConfig`（デフォルト値 + `SUBRUNNER_*` 環境変数）
//! - **observability**: カウンタのスナップショット

pub mod app;
pub mod config;
pub mod domain;
pub mod impls;
pub mod observability;
pub mod ports;

pub use app::{
    AckHandle, Delivery, ForwardingHandler, MessageHandler, Session, SessionBuilder,
    SessionError, SessionReport, StopReason,
};
pub use config::SessionConfig;
