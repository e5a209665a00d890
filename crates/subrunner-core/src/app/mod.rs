//! App - アプリケーション層
//!
//! ports を組み合わせて 1 セッション分の受信・配送を実装する。
//!
//! # 主要コンポーネント
//! - **OutstandingLimiter**: 未 ack 数の上限（FIFO semaphore）
//! - **AckTracker**: ハンドルと期限の台帳、終端遷移の一元管理
//! - **DispatchPool**: 固定数ワーカーで handler を実行
//! - **Session** (receive_loop): connect → acquire → receive → decode → dispatch → drain
//! - **ReaperLoop**: 期限切れの回収
//! - **SessionBuilder**: 構築と起動時検証

pub mod ack_tracker;
pub mod builder;
pub mod codec;
pub mod dispatch_pool;
pub mod handler;
pub mod limiter;
pub mod reaper_loop;
pub mod receive_loop;
pub mod status;

pub use self::ack_tracker::{AckHandle, AckTracker};
pub use self::builder::{BuildError, SessionBuilder};
pub use self::dispatch_pool::DispatchPool;
pub use self::handler::{Delivery, ForwardingHandler, MessageHandler};
pub use self::limiter::{OutstandingLimiter, Slot};
pub use self::reaper_loop::ReaperLoop;
pub use self::receive_loop::{Session, SessionError};
pub use self::status::{CancelCause, SessionReport, StopReason};
