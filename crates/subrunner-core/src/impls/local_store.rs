//! LocalContentStore - ディレクトリを bucket とみなす ContentStore
//!
//! Objects land in `<root>/<bucket>/<object>`. Object and bucket names are
//! single path components; anything that could escape the root is refused.

use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use tracing::debug;

use crate::domain::StoreError;
use crate::ports::ContentStore;

pub struct LocalContentStore {
    root: PathBuf,
}

impl LocalContentStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn object_path(&self, bucket: &str, object: &str) -> Result<PathBuf, StoreError> {
        let bucket = single_component(bucket)?;
        let object = single_component(object)?;
        Ok(self.root.join(bucket).join(object))
    }
}

fn single_component(name: &str) -> Result<&str, StoreError> {
    let mut components = Path::new(name).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(_)), None) => Ok(name),
        _ => Err(StoreError::InvalidObjectName(name.to_string())),
    }
}

#[async_trait]
impl ContentStore for LocalContentStore {
    async fn store(&self, bucket: &str, object: &str, content: &[u8]) -> Result<(), StoreError> {
        let path = self.object_path(bucket, object)?;
        if let Some(dir) = path.parent() {
            tokio::fs::create_dir_all(dir).await?;
        }
        tokio::fs::write(&path, content).await?;
        debug!(path = %path.display(), bytes = content.len(), "stored object");
        Ok(())
    }
}
