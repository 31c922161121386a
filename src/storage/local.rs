//! Local-filesystem writer.

use super::{resolve_local, DataWriter};
use crate::error::MarkifyError;
use async_trait::async_trait;
use std::path::{Path, PathBuf};

/// Writes files below a root directory, creating parents on demand.
#[derive(Debug, Clone)]
pub struct LocalWriter {
    root: PathBuf,
}

impl LocalWriter {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Absolute location `path` would be written to.
    pub fn path_of(&self, path: &str) -> PathBuf {
        resolve_local(&self.root, path)
    }
}

#[async_trait]
impl DataWriter for LocalWriter {
    async fn write(&self, path: &str, data: &[u8]) -> Result<(), MarkifyError> {
        let target = self.path_of(path);
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| MarkifyError::io(parent, e))?;
        }
        tokio::fs::write(&target, data)
            .await
            .map_err(|e| MarkifyError::io(&target, e))
    }

    fn location(&self) -> String {
        self.root.display().to_string()
    }
}
