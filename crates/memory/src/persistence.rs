use async_trait::async_trait;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::fs;

#[derive(Debug, Error)]
pub enum MemoryError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("Persistence error: {0}")]
    Persistence(String),
}

/// Durability seam for the stores. Implementations must replace the whole
/// value atomically; the stores tolerate any failure here by logging and
/// continuing in memory.
#[async_trait]
pub trait Persistence: Send + Sync {
    async fn load(&self, key: &str) -> Result<Option<Vec<u8>>, MemoryError>;
    async fn save(&self, key: &str, bytes: &[u8]) -> Result<(), MemoryError>;
}

/// File-backed persistence: one JSON file per key under a base directory.
/// Writes go to a temp file first, then rename, so a record is either fully
/// written or absent.
pub struct FilePersistence {
    base_path: PathBuf,
}

impl FilePersistence {
    pub fn new<P: AsRef<Path>>(base_path: P) -> Self {
        Self {
            base_path: base_path.as_ref().to_path_buf(),
        }
    }

    pub async fn initialize(&self) -> Result<(), MemoryError> {
        fs::create_dir_all(&self.base_path).await?;
        tracing::info!("Persistence initialized at {:?}", self.base_path);
        Ok(())
    }

    fn key_path(&self, key: &str) -> PathBuf {
        self.base_path.join(format!("{}.json", key))
    }
}

#[async_trait]
impl Persistence for FilePersistence {
    async fn load(&self, key: &str) -> Result<Option<Vec<u8>>, MemoryError> {
        let path = self.key_path(key);
        if !path.exists() {
            return Ok(None);
        }
        Ok(Some(fs::read(&path).await?))
    }

    async fn save(&self, key: &str, bytes: &[u8]) -> Result<(), MemoryError> {
        if let Some(parent) = self.key_path(key).parent() {
            fs::create_dir_all(parent).await?;
        }

        let path = self.key_path(key);
        let temp_path = path.with_extension("tmp");

        fs::write(&temp_path, bytes).await?;
        fs::rename(&temp_path, &path).await?;

        tracing::debug!("Persisted key: {}", key);
        Ok(())
    }
}
