//! In-memory writer used to capture intermediate outputs.

use super::DataWriter;
use crate::error::MarkifyError;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;

/// Keeps every write in a map instead of persisting it.
#[derive(Debug, Default)]
pub struct MemoryWriter {
    files: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bytes last written to `path`.
    pub fn bytes(&self, path: &str) -> Option<Vec<u8>> {
        self.lock().get(path).cloned()
    }

    /// Content of `path` as UTF-8 (lossy).
    pub fn value(&self, path: &str) -> Option<String> {
        self.bytes(path)
            .map(|b| String::from_utf8_lossy(&b).into_owned())
    }

    pub fn paths(&self) -> Vec<String> {
        let mut paths: Vec<String> = self.lock().keys().cloned().collect();
        paths.sort();
        paths
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, Vec<u8>>> {
        self.files.lock().unwrap_or_else(|p| p.into_inner())
    }
}

#[async_trait]
impl DataWriter for MemoryWriter {
    async fn write(&self, path: &str, data: &[u8]) -> Result<(), MarkifyError> {
        self.lock().insert(path.to_string(), data.to_vec());
        Ok(())
    }

    fn location(&self) -> String {
        "memory".to_string()
    }
}
