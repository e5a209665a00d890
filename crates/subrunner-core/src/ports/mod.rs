//! Ports - 抽象化レイヤー
//!
//! 各 trait は外部システム（pub/sub サブスクリプション、Blob ストレージ、時計）
//! へのインターフェースで、実装の詳細は `impls` 側に置く。

pub mod clock;
pub mod content_store;
pub mod id_generator;
pub mod message_source;

pub use self::clock::{Clock, FixedClock, SystemClock};
pub use self::content_store::ContentStore;
pub use self::id_generator::{IdGenerator, UlidGenerator};
pub use self::message_source::MessageSource;
