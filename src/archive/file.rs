use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::{info, warn};

use super::{TranscriptArchive, TranscriptArchiveEntry};
use crate::error::ArchiveError;
use crate::transcript::Transcript;

/// Archive persisted as a single JSON array on disk (newest entry first)
pub struct JsonFileArchive {
    path: PathBuf,
    /// Serializes read-modify-write cycles
    lock: Mutex<()>,
}

impl JsonFileArchive {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read_entries(&self) -> Result<Vec<TranscriptArchiveEntry>, ArchiveError> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) if bytes.is_empty() => Ok(Vec::new()),
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(e.into()),
        }
    }

    async fn write_entries(&self, entries: &[TranscriptArchiveEntry]) -> Result<(), ArchiveError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        // Write to a sibling file first so a crash never truncates the archive
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, serde_json::to_vec_pretty(entries)?).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl TranscriptArchive for JsonFileArchive {
    async fn save(&self, transcript: Transcript) -> Result<TranscriptArchiveEntry, ArchiveError> {
        let entry = TranscriptArchiveEntry::from_transcript(transcript)?;

        let _guard = self.lock.lock().await;
        let mut entries = self.read_entries().await?;
        entries.insert(0, entry.clone());
        self.write_entries(&entries).await?;

        info!(
            "Archived transcript {} ({} messages) to {}",
            entry.id,
            entry.messages.len(),
            self.path.display()
        );

        Ok(entry)
    }

    async fn list(&self) -> Result<Vec<TranscriptArchiveEntry>, ArchiveError> {
        let _guard = self.lock.lock().await;
        self.read_entries().await
    }

    async fn delete(&self, id: &str) -> Result<(), ArchiveError> {
        let _guard = self.lock.lock().await;
        let mut entries = self.read_entries().await?;
        let before = entries.len();
        entries.retain(|e| e.id != id);

        if entries.len() == before {
            warn!("Archive entry {} not found", id);
            return Err(ArchiveError::NotFound(id.to_string()));
        }

        self.write_entries(&entries).await
    }

    async fn clear(&self) -> Result<(), ArchiveError> {
        let _guard = self.lock.lock().await;
        self.write_entries(&[]).await?;
        info!("Cleared transcript archive at {}", self.path.display());
        Ok(())
    }
}
