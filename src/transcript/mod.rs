//! Transcript model and partial-text reconciliation

mod message;
mod reconciler;

pub use message::{Speaker, Transcript, TranscriptMessage, TranscriptUpdate};
pub use reconciler::TranscriptReconciler;
