//! Finished transcript storage
//!
//! The session commits its transcript here at teardown. Only fully
//! finalized transcripts are accepted; entries are immutable once written.

mod file;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::error::ArchiveError;
use crate::transcript::{Transcript, TranscriptMessage};

pub use file::JsonFileArchive;

/// One archived conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptArchiveEntry {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub messages: Vec<TranscriptMessage>,
}

impl TranscriptArchiveEntry {
    /// Build an entry, rejecting transcripts that still hold partials
    pub fn from_transcript(transcript: Transcript) -> Result<Self, ArchiveError> {
        if let Some(partial) = transcript.messages().iter().find(|m| m.is_partial) {
            return Err(ArchiveError::NotFinalized(partial.id));
        }

        Ok(Self {
            id: uuid::Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            messages: transcript.into_messages(),
        })
    }
}

#[async_trait::async_trait]
pub trait TranscriptArchive: Send + Sync {
    async fn save(&self, transcript: Transcript) -> Result<TranscriptArchiveEntry, ArchiveError>;

    /// Entries, newest first
    async fn list(&self) -> Result<Vec<TranscriptArchiveEntry>, ArchiveError>;

    async fn delete(&self, id: &str) -> Result<(), ArchiveError>;

    async fn clear(&self) -> Result<(), ArchiveError>;
}

/// Archive kept in process memory
#[derive(Debug, Default)]
pub struct MemoryArchive {
    entries: Mutex<Vec<TranscriptArchiveEntry>>,
}

impl MemoryArchive {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl TranscriptArchive for MemoryArchive {
    async fn save(&self, transcript: Transcript) -> Result<TranscriptArchiveEntry, ArchiveError> {
        let entry = TranscriptArchiveEntry::from_transcript(transcript)?;
        self.entries.lock().await.insert(0, entry.clone());
        Ok(entry)
    }

    async fn list(&self) -> Result<Vec<TranscriptArchiveEntry>, ArchiveError> {
        Ok(self.entries.lock().await.clone())
    }

    async fn delete(&self, id: &str) -> Result<(), ArchiveError> {
        let mut entries = self.entries.lock().await;
        let before = entries.len();
        entries.retain(|e| e.id != id);
        if entries.len() == before {
            return Err(ArchiveError::NotFound(id.to_string()));
        }
        Ok(())
    }

    async fn clear(&self) -> Result<(), ArchiveError> {
        self.entries.lock().await.clear();
        Ok(())
    }
}
