use std::path::PathBuf;

use anyhow::{Context, Result};
use subrunner_core::SessionConfig;

const DEFAULT_SPOOL_DIR: &str = "./spool";
const DEFAULT_BUCKET: &str = "bucket_frank";

// CLI configuration sourced from environment variables.
#[derive(Debug, Clone)]
pub struct CliConfig {
    // Root of the file-backed subscriptions.
    pub spool_dir: PathBuf,
    // Root of the local bucket store; forwarding is off when unset.
    pub store_root: Option<PathBuf>,
    // Bucket that forwarded content lands in.
    pub bucket: String,
    pub session: SessionConfig,
}

impl CliConfig {
    pub fn from_env() -> Result<Self> {
        let spool_dir = std::env::var("SUBRUNNER_SPOOL_DIR")
            .unwrap_or_else(|_| DEFAULT_SPOOL_DIR.to_string())
            .into();
        let store_root = std::env::var("SUBRUNNER_STORE_ROOT")
            .ok()
            .filter(|value| !value.is_empty())
            .map(PathBuf::from);
        let bucket = std::env::var("SUBRUNNER_BUCKET")
            .ok()
            .filter(|value| !value.is_empty())
            .unwrap_or_else(|| DEFAULT_BUCKET.to_string());
        let session = SessionConfig::from_env().context("read session config")?;
        Ok(Self {
            spool_dir,
            store_root,
            bucket,
            session,
        })
    }
}
