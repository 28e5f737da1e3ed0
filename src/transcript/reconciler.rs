// Partial transcript reconciliation
//
// Inbound transcription text is cumulative: every partial carries the whole
// utterance so far. The reconciler keeps at most one open partial per
// speaker and turns transport signals into transcript updates.

use std::collections::BTreeMap;
use tracing::debug;

use super::message::{Speaker, TranscriptMessage, TranscriptUpdate};

#[derive(Debug, Clone)]
struct OpenPartial {
    id: u64,
    text: String,
}

/// Coalesces partial transcriptions into finalized turns
#[derive(Debug, Default)]
pub struct TranscriptReconciler {
    open: BTreeMap<Speaker, OpenPartial>,
    next_id: u64,
}

impl TranscriptReconciler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the latest cumulative text for `speaker`
    pub fn apply_partial(&mut self, speaker: Speaker, text: &str) -> TranscriptUpdate {
        match self.open.get_mut(&speaker) {
            Some(partial) => {
                partial.text = text.to_string();
                TranscriptUpdate::Updated(partial_message(speaker, partial))
            }
            None => {
                self.next_id += 1;
                let partial = OpenPartial {
                    id: self.next_id,
                    text: text.to_string(),
                };
                let message = partial_message(speaker, &partial);
                self.open.insert(speaker, partial);
                TranscriptUpdate::Opened(message)
            }
        }
    }

    /// Close the current turn.
    ///
    /// Every non-empty open partial is finalized with its last text. Empty
    /// partials are discarded. All slots are cleared afterwards.
    pub fn finalize_turn(&mut self) -> Vec<TranscriptUpdate> {
        std::mem::take(&mut self.open)
            .into_iter()
            .map(|(speaker, partial)| {
                if partial.text.is_empty() {
                    TranscriptUpdate::Discarded {
                        id: partial.id,
                        speaker,
                    }
                } else {
                    debug!("Finalized {} message {}", speaker, partial.id);
                    TranscriptUpdate::Finalized(TranscriptMessage {
                        id: partial.id,
                        speaker,
                        text: partial.text,
                        is_partial: false,
                    })
                }
            })
            .collect()
    }

    /// Drop every open partial without finalizing it (barge-in)
    pub fn interrupt(&mut self) -> Vec<TranscriptUpdate> {
        std::mem::take(&mut self.open)
            .into_iter()
            .map(|(speaker, partial)| TranscriptUpdate::Discarded {
                id: partial.id,
                speaker,
            })
            .collect()
    }

    pub fn open_partial(&self, speaker: Speaker) -> Option<TranscriptMessage> {
        self.open
            .get(&speaker)
            .map(|partial| partial_message(speaker, partial))
    }

    pub fn has_open_partials(&self) -> bool {
        !self.open.is_empty()
    }
}

fn partial_message(speaker: Speaker, partial: &OpenPartial) -> TranscriptMessage {
    TranscriptMessage {
        id: partial.id,
        speaker,
        text: partial.text.clone(),
        is_partial: true,
    }
}
