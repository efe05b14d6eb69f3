//! Byte-level storage backends for record files

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

use crate::types::ArchiveError;

/// Where collection files live.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Read a named file; `None` when it does not exist yet.
    async fn read(&self, name: &str) -> Result<Option<String>, ArchiveError>;

    /// Replace a named file. Readers never observe a partial write.
    async fn write(&self, name: &str, contents: &str) -> Result<(), ArchiveError>;
}

/// Files in a data directory, replaced via write-to-temp then rename.
#[derive(Debug, Clone)]
pub struct FileStorage {
    dir: PathBuf,
}

impl FileStorage {
    pub async fn open(dir: impl Into<PathBuf>) -> Result<Self, ArchiveError> {
        let dir = dir.into();
        tokio::fs::create_dir_all(&dir).await.map_err(|e| {
            ArchiveError::Storage(format!("Failed to create {}: {}", dir.display(), e))
        })?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

#[async_trait]
impl Storage for FileStorage {
    async fn read(&self, name: &str) -> Result<Option<String>, ArchiveError> {
        let path = self.dir.join(name);
        match tokio::fs::read_to_string(&path).await {
            Ok(contents) => Ok(Some(contents)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(ArchiveError::Storage(format!(
                "Failed to read {}: {}",
                path.display(),
                e
            ))),
        }
    }

    async fn write(&self, name: &str, contents: &str) -> Result<(), ArchiveError> {
        let path = self.dir.join(name);
        let tmp = self.dir.join(format!(".{}.tmp", name));

        tokio::fs::write(&tmp, contents).await.map_err(|e| {
            ArchiveError::Storage(format!("Failed to write {}: {}", tmp.display(), e))
        })?;
        tokio::fs::rename(&tmp, &path).await.map_err(|e| {
            ArchiveError::Storage(format!("Failed to replace {}: {}", path.display(), e))
        })?;

        debug!("Wrote {} ({} bytes)", path.display(), contents.len());
        Ok(())
    }
}

/// In-memory storage, used by tests and by dry runs.
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    files: Arc<Mutex<HashMap<String, String>>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, name: &str, contents: impl Into<String>) {
        self.files
            .lock()
            .await
            .insert(name.to_string(), contents.into());
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn read(&self, name: &str) -> Result<Option<String>, ArchiveError> {
        Ok(self.files.lock().await.get(name).cloned())
    }

    async fn write(&self, name: &str, contents: &str) -> Result<(), ArchiveError> {
        self.insert(name, contents).await;
        Ok(())
    }
}
