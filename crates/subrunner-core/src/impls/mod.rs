//! Impls - ports の実装
//!
//! - **InMemorySource**: テスト・組み込み用のサブスクリプション
//! - **SpoolSource**: ファイルベースのサブスクリプション（CLI 用）
//! - **LocalContentStore**: ディレクトリベースの ContentStore

pub mod inmem_source;
pub mod local_store;
pub mod spool_source;

pub use self::inmem_source::InMemorySource;
pub use self::local_store::LocalContentStore;
pub use self::spool_source::SpoolSource;
