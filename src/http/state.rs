use crate::archive::TranscriptArchive;
use crate::session::LiveClient;
use std::sync::Arc;

/// Shared application state for HTTP handlers
#[derive(Clone)]
pub struct AppState {
    /// Handle to the live session actor
    pub client: LiveClient,

    /// Finished transcripts
    pub archive: Arc<dyn TranscriptArchive>,
}

impl AppState {
    pub fn new(client: LiveClient, archive: Arc<dyn TranscriptArchive>) -> Self {
        Self { client, archive }
    }
}
