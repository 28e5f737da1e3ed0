use serde::{Deserialize, Serialize};
use std::fmt;

/// Who produced a transcript message
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Speaker {
    User,
    Agent,
    System,
}

impl fmt::Display for Speaker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Speaker::User => write!(f, "user"),
            Speaker::Agent => write!(f, "agent"),
            Speaker::System => write!(f, "system"),
        }
    }
}

/// A single transcript entry. Identity is `(id, speaker)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranscriptMessage {
    pub id: u64,
    pub speaker: Speaker,
    pub text: String,
    /// Partial messages may still change; finalized ones never do
    pub is_partial: bool,
}

/// Change produced by the reconciler
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TranscriptUpdate {
    /// A new partial message was opened
    Opened(TranscriptMessage),
    /// The open partial's text was replaced
    Updated(TranscriptMessage),
    /// The open partial became final
    Finalized(TranscriptMessage),
    /// The open partial was dropped without being finalized
    Discarded { id: u64, speaker: Speaker },
}

/// Ordered sequence of transcript messages.
///
/// Append-only, except that a speaker's open partial may be replaced by an
/// update, by its finalized form, or removed when it is discarded.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Transcript {
    messages: Vec<TranscriptMessage>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold a reconciler update into the transcript
    pub fn apply(&mut self, update: &TranscriptUpdate) {
        match update {
            TranscriptUpdate::Opened(msg) => self.messages.push(msg.clone()),
            TranscriptUpdate::Updated(msg) | TranscriptUpdate::Finalized(msg) => {
                match self.open_partial_mut(msg.id, msg.speaker) {
                    Some(existing) => *existing = msg.clone(),
                    None if !msg.is_partial => self.messages.push(msg.clone()),
                    None => tracing::warn!(
                        "Dropping update for unknown partial {} ({})",
                        msg.id,
                        msg.speaker
                    ),
                }
            }
            TranscriptUpdate::Discarded { id, speaker } => {
                self.messages
                    .retain(|m| !(m.is_partial && m.id == *id && m.speaker == *speaker));
            }
        }
    }

    fn open_partial_mut(&mut self, id: u64, speaker: Speaker) -> Option<&mut TranscriptMessage> {
        self.messages
            .iter_mut()
            .rev()
            .find(|m| m.is_partial && m.id == id && m.speaker == speaker)
    }

    /// Drop every partial message, keeping only finalized ones
    pub fn retain_finalized(&mut self) -> usize {
        let before = self.messages.len();
        self.messages.retain(|m| !m.is_partial);
        before - self.messages.len()
    }

    pub fn is_finalized(&self) -> bool {
        self.messages.iter().all(|m| !m.is_partial)
    }

    pub fn messages(&self) -> &[TranscriptMessage] {
        &self.messages
    }

    pub fn into_messages(self) -> Vec<TranscriptMessage> {
        self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

impl From<Vec<TranscriptMessage>> for Transcript {
    fn from(messages: Vec<TranscriptMessage>) -> Self {
        Self { messages }
    }
}
