use crate::canonical::{sha256_hex_short, to_canonical_json};
use crate::error::{Result, StoreError};
use argus_memory::CodebaseMemory;
use fs2::FileExt;
use std::path::PathBuf;

/// Blob name for a repository's memory artifact.
pub fn memory_blob_name(repo_id: &str) -> String {
    format!("{}_memory.json", sha256_hex_short(repo_id))
}

/// File-backed persistence for [`CodebaseMemory`].
///
/// Reads and writes hold an fs2 lock so parallel pushes from the same
/// workflow never interleave half-written memory.
#[derive(Debug, Clone)]
pub struct MemoryStore {
    storage_dir: PathBuf,
    repo_id: String,
}

impl MemoryStore {
    pub fn new(storage_dir: impl Into<PathBuf>, repo_id: impl Into<String>) -> Self {
        MemoryStore {
            storage_dir: storage_dir.into(),
            repo_id: repo_id.into(),
        }
    }

    pub fn blob_name(&self) -> String {
        memory_blob_name(&self.repo_id)
    }

    fn path(&self) -> PathBuf {
        self.storage_dir.join(self.blob_name())
    }

    pub async fn load(&self) -> Result<Option<CodebaseMemory>> {
        let path = self.path();
        if !path.exists() {
            return Ok(None);
        }

        let bytes = read_locked(path.clone()).await?;
        match serde_json::from_slice(&bytes) {
            Ok(memory) => Ok(Some(memory)),
            Err(e) => Err(StoreError::Structural {
                what: self.blob_name(),
                cause: e.to_string(),
            }),
        }
    }

    pub async fn save(&self, memory: &CodebaseMemory) -> Result<()> {
        tokio::fs::create_dir_all(&self.storage_dir).await?;
        let json = to_canonical_json(memory)?;
        write_locked(self.path(), json.into_bytes()).await
    }
}

async fn read_locked(path: PathBuf) -> Result<Vec<u8>> {
    tokio::task::spawn_blocking(move || -> Result<Vec<u8>> {
        let file = std::fs::File::open(&path)?;
        file.lock_shared()?;
        let result = std::fs::read(&path);
        let _ = file.unlock();
        Ok(result?)
    })
    .await
    .map_err(|e| StoreError::Structural {
        what: "memory read task".to_string(),
        cause: e.to_string(),
    })?
}

async fn write_locked(path: PathBuf, bytes: Vec<u8>) -> Result<()> {
    tokio::task::spawn_blocking(move || -> Result<()> {
        use std::io::Write;
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(&path)?;
        file.lock_exclusive()?;
        let result = (|| -> std::io::Result<()> {
            file.set_len(0)?;
            file.write_all(&bytes)?;
            file.sync_all()
        })();
        let _ = file.unlock();
        Ok(result?)
    })
    .await
    .map_err(|e| StoreError::Structural {
        what: "memory write task".to_string(),
        cause: e.to_string(),
    })?
}
