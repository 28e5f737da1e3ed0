use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::capture::{run_capture_pump, CaptureGate};
use super::config::SessionConfig;
use super::stats::SessionStats;
use super::status::{SessionState, StatusUpdate};
use crate::archive::TranscriptArchive;
use crate::audio::codec;
use crate::audio::{AudioBackend, AudioOutput, PlaybackScheduler};
use crate::error::{SessionError, SessionResult};
use crate::transport::{Connection, ServerContent, Transport, TransportEvent};
use crate::transcript::{Speaker, Transcript, TranscriptReconciler, TranscriptUpdate};

/// Capacity of the status broadcast channel
const STATUS_CAPACITY: usize = 256;

/// Work delivered to the session's dispatch point.
///
/// Every event carries the epoch of the session that produced it; events
/// from an earlier session are discarded.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    Transport { epoch: u64, event: TransportEvent },
    PlaybackEnded { epoch: u64, id: u64 },
    CaptureEnded { epoch: u64 },
}

impl SessionEvent {
    pub fn epoch(&self) -> u64 {
        match self {
            SessionEvent::Transport { epoch, .. }
            | SessionEvent::PlaybackEnded { epoch, .. }
            | SessionEvent::CaptureEnded { epoch } => *epoch,
        }
    }
}

/// Resources acquired for one session, released in teardown
struct LiveResources {
    gate: Arc<CaptureGate>,
    mic_started: bool,
    output_open: bool,
    pump: Option<JoinHandle<()>>,
    events: Option<mpsc::Receiver<TransportEvent>>,
    playback_ended: Option<mpsc::UnboundedReceiver<u64>>,
    connection: Option<Box<dyn Connection>>,
}

impl LiveResources {
    fn new(gate: Arc<CaptureGate>) -> Self {
        Self {
            gate,
            mic_started: false,
            output_open: false,
            pump: None,
            events: None,
            playback_ended: None,
            connection: None,
        }
    }
}

/// A live duplex voice session.
///
/// Owns the reconciler, the playback scheduler and the transcript, and
/// serializes everything that touches them through [`LiveSession::dispatch`].
pub struct LiveSession {
    config: SessionConfig,
    state: SessionState,
    epoch: u64,

    microphone: Box<dyn AudioBackend>,
    output: Box<dyn AudioOutput>,
    transport: Arc<dyn Transport>,
    archive: Arc<dyn TranscriptArchive>,

    scheduler: PlaybackScheduler,
    reconciler: TranscriptReconciler,
    transcript: Transcript,

    live: Option<LiveResources>,
    /// Gate of the current (or last) session, kept for stats
    gate: Arc<CaptureGate>,
    /// Whether the microphone is still delivering frames
    listening: bool,

    internal_tx: mpsc::UnboundedSender<SessionEvent>,
    internal_rx: mpsc::UnboundedReceiver<SessionEvent>,
    status_tx: broadcast::Sender<StatusUpdate>,
    state_tx: watch::Sender<SessionState>,
    last_status: String,

    started_at: Option<DateTime<Utc>>,
    chunks_scheduled: u64,
    decode_errors: u64,
    messages_received: u64,
    archived_entry: Option<String>,
}

impl LiveSession {
    pub fn new(
        config: SessionConfig,
        microphone: Box<dyn AudioBackend>,
        output: Box<dyn AudioOutput>,
        transport: Arc<dyn Transport>,
        archive: Arc<dyn TranscriptArchive>,
    ) -> Self {
        let (internal_tx, internal_rx) = mpsc::unbounded_channel();
        let (status_tx, _) = broadcast::channel(STATUS_CAPACITY);
        let (state_tx, _) = watch::channel(SessionState::Idle);

        Self {
            config,
            state: SessionState::Idle,
            epoch: 0,
            microphone,
            output,
            transport,
            archive,
            scheduler: PlaybackScheduler::new(),
            reconciler: TranscriptReconciler::new(),
            transcript: Transcript::new(),
            live: None,
            gate: Arc::new(CaptureGate::new(0)),
            listening: false,
            internal_tx,
            internal_rx,
            status_tx,
            state_tx,
            last_status: "Ready to connect".to_string(),
            started_at: None,
            chunks_scheduled: 0,
            decode_errors: 0,
            messages_received: 0,
            archived_entry: None,
        }
    }

    // ------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------

    /// Idle → Connecting: acquire the microphone and output, open the
    /// remote stream, and start the capture pump with its gate closed.
    pub async fn start(&mut self) -> SessionResult<()> {
        if self.state != SessionState::Idle {
            warn!("Session already running ({})", self.state);
            return Err(SessionError::AlreadyRunning(self.state));
        }

        self.config.validate()?;

        self.epoch += 1;
        self.reconciler = TranscriptReconciler::new();
        self.transcript = Transcript::new();
        self.started_at = Some(Utc::now());
        self.chunks_scheduled = 0;
        self.decode_errors = 0;
        self.messages_received = 0;
        self.archived_entry = None;
        self.gate = Arc::new(CaptureGate::new(self.epoch));
        self.live = Some(LiveResources::new(Arc::clone(&self.gate)));

        info!("Starting live session (epoch {})", self.epoch);
        self.set_state(SessionState::Connecting, "Connecting...");

        if let Err(e) = self.acquire().await {
            error!("Failed to start session: {}", e);
            let failed = matches!(
                e,
                SessionError::Transport(_) | SessionError::TransportClosed(_)
            );
            self.teardown(e.to_string(), failed).await;
            return Err(e);
        }

        Ok(())
    }

    async fn acquire(&mut self) -> SessionResult<()> {
        info!("Acquiring microphone ({})", self.microphone.name());
        let frames = self.microphone.start().await?;
        self.listening = true;
        if let Some(live) = self.live.as_mut() {
            live.mic_started = true;
        }

        let (ended_tx, ended_rx) = mpsc::unbounded_channel();
        self.output
            .open(ended_tx)
            .map_err(|e| SessionError::DeviceUnavailable(format!("audio output: {:#}", e)))?;
        if let Some(live) = self.live.as_mut() {
            live.output_open = true;
            live.playback_ended = Some(ended_rx);
        }

        info!("Opening remote stream ({})", self.transport.name());
        let pending = self.transport.connect(self.config.setup()).await?;

        let pump = tokio::spawn(run_capture_pump(
            frames,
            Arc::clone(&self.gate),
            pending.outbound,
            self.config.input_sample_rate,
            self.config.channels,
            self.internal_tx.clone(),
        ));

        if let Some(live) = self.live.as_mut() {
            live.events = Some(pending.events);
            live.connection = Some(pending.connection);
            live.pump = Some(pump);
        }

        Ok(())
    }

    /// Stop the session and commit its transcript. No-op when not running.
    pub async fn stop(&mut self) -> SessionStats {
        if !self.state.is_running() {
            debug!("Stop requested while {}, nothing to do", self.state);
            return self.stats();
        }

        info!("Stopping live session (epoch {})", self.epoch);
        self.teardown("Session ended".to_string(), false).await;
        self.stats()
    }

    async fn fail(&mut self, error: SessionError) {
        error!("Session failed: {}", error);
        self.teardown(error.to_string(), true).await;
    }

    /// Release everything in order. Each step is guarded on its own so one
    /// failure never skips the rest. Always ends in Idle.
    async fn teardown(&mut self, message: String, failed: bool) {
        if failed {
            self.set_state(SessionState::Failed, &message);
        }
        self.set_state(SessionState::Closing, "Closing...");

        if let Some(mut live) = self.live.take() {
            live.gate.close();

            if live.mic_started {
                if let Err(e) = self.microphone.stop().await {
                    warn!("Failed to stop microphone capture: {:#}", e);
                }
            }

            if let Some(pump) = live.pump.take() {
                pump.abort();
            }

            if live.mic_started {
                if let Err(e) = self.microphone.release().await {
                    warn!("Failed to release microphone: {:#}", e);
                }
            }

            self.scheduler.flush_all(self.output.as_mut());

            if live.output_open {
                if let Err(e) = self.output.release() {
                    warn!("Failed to release audio output: {:#}", e);
                }
            }

            if let Some(mut connection) = live.connection.take() {
                if let Err(e) = connection.close().await {
                    warn!("Failed to close remote stream: {:#}", e);
                }
            }
        }

        self.listening = false;
        self.commit_transcript().await;
        self.set_state(SessionState::Idle, &message);
    }

    /// Drop unfinished partials and archive what was finalized
    async fn commit_transcript(&mut self) {
        for update in self.reconciler.interrupt() {
            self.apply_transcript_update(update);
        }
        let stray = self.transcript.retain_finalized();
        if stray > 0 {
            warn!("Dropped {} stray partial messages before archiving", stray);
        }

        if self.transcript.is_empty() {
            info!("Transcript is empty, nothing to archive");
            return;
        }

        match self.archive.save(self.transcript.clone()).await {
            Ok(entry) => {
                info!(
                    "Transcript archived as {} ({} messages)",
                    entry.id,
                    entry.messages.len()
                );
                self.archived_entry = Some(entry.id);
            }
            Err(e) => error!("Failed to archive transcript: {}", e),
        }
    }

    // ------------------------------------------------------------------
    // Event dispatch
    // ------------------------------------------------------------------

    /// Wait for the next event of the running session.
    ///
    /// Returns `None` immediately when no session is running.
    pub async fn next_event(&mut self) -> Option<SessionEvent> {
        let epoch = self.epoch;
        let live = self.live.as_mut()?;
        let LiveResources {
            events,
            playback_ended,
            ..
        } = live;
        let internal = &mut self.internal_rx;

        tokio::select! {
            biased;
            event = async {
                match events.as_mut() {
                    Some(rx) => rx.recv().await,
                    None => std::future::pending().await,
                }
            } => Some(SessionEvent::Transport {
                epoch,
                event: event.unwrap_or(TransportEvent::Closed(None)),
            }),
            Some(id) = async {
                match playback_ended.as_mut() {
                    Some(rx) => rx.recv().await,
                    None => std::future::pending().await,
                }
            } => Some(SessionEvent::PlaybackEnded { epoch, id }),
            Some(event) = internal.recv() => Some(event),
        }
    }

    /// Next event that is already waiting, without blocking
    pub fn try_next_event(&mut self) -> Option<SessionEvent> {
        let epoch = self.epoch;
        let live = self.live.as_mut()?;

        if let Some(rx) = live.events.as_mut() {
            match rx.try_recv() {
                Ok(event) => return Some(SessionEvent::Transport { epoch, event }),
                Err(mpsc::error::TryRecvError::Disconnected) => {
                    return Some(SessionEvent::Transport {
                        epoch,
                        event: TransportEvent::Closed(None),
                    })
                }
                Err(mpsc::error::TryRecvError::Empty) => {}
            }
        }

        if let Some(Ok(id)) = live.playback_ended.as_mut().map(|rx| rx.try_recv()) {
            return Some(SessionEvent::PlaybackEnded { epoch, id });
        }

        self.internal_rx.try_recv().ok()
    }

    /// Dispatch every event that is already waiting. Returns how many ran.
    pub async fn drain_pending(&mut self) -> usize {
        let mut handled = 0;
        while let Some(event) = self.try_next_event() {
            self.dispatch(event).await;
            handled += 1;
        }
        handled
    }

    /// Single dispatch point for everything that changes session state
    pub async fn dispatch(&mut self, event: SessionEvent) {
        if event.epoch() != self.epoch {
            debug!(
                "Discarding stale event from epoch {} (current {})",
                event.epoch(),
                self.epoch
            );
            return;
        }

        match event {
            SessionEvent::Transport { event, .. } => self.handle_transport_event(event).await,
            SessionEvent::PlaybackEnded { id, .. } => self.handle_playback_ended(id),
            SessionEvent::CaptureEnded { .. } => self.handle_capture_ended(),
        }
    }

    async fn handle_transport_event(&mut self, event: TransportEvent) {
        match event {
            TransportEvent::Opened => {
                if self.state != SessionState::Connecting {
                    debug!("Ignoring duplicate open acknowledgment ({})", self.state);
                    return;
                }
                if let Some(live) = self.live.as_ref() {
                    live.gate.open();
                }
                self.set_state(SessionState::Active, "Connected. Start speaking!");
            }
            TransportEvent::Content(content) => {
                if self.state != SessionState::Active {
                    warn!("Ignoring agent content received while {}", self.state);
                    return;
                }
                self.messages_received += 1;
                self.handle_content(content);
            }
            TransportEvent::Error(message) => {
                if self.state.is_running() {
                    self.fail(SessionError::Transport(message)).await;
                }
            }
            TransportEvent::Closed(reason) => {
                if self.state.is_running() {
                    self.fail(SessionError::TransportClosed(reason)).await;
                }
            }
        }
    }

    /// Apply one inbound message, field by field: transcriptions, audio,
    /// turn completion, interruption. Later fields see earlier effects.
    fn handle_content(&mut self, content: ServerContent) {
        if let Some(transcription) = content.input_transcription {
            self.apply_partial(Speaker::User, &transcription.text);
        }

        if let Some(transcription) = content.output_transcription {
            self.apply_partial(Speaker::Agent, &transcription.text);
        }

        if let Some(turn) = content.model_turn {
            for blob in turn.audio() {
                let buffer = match codec::decode_blob(
                    blob,
                    self.config.output_sample_rate,
                    self.config.channels,
                ) {
                    Ok(buffer) => buffer,
                    Err(e) => {
                        self.decode_errors += 1;
                        warn!("Dropping malformed audio chunk: {}", e);
                        continue;
                    }
                };

                match self.scheduler.enqueue(buffer, self.output.as_mut()) {
                    Ok(_) => self.chunks_scheduled += 1,
                    Err(e) => warn!("Failed to schedule audio chunk: {:#}", e),
                }
            }
        }

        if content.turn_complete {
            for update in self.reconciler.finalize_turn() {
                self.apply_transcript_update(update);
            }
            let message = if self.listening {
                "Listening..."
            } else if !self.scheduler.is_idle() {
                "Finishing playback..."
            } else {
                "Ready"
            };
            self.emit_activity(message);
        }

        if content.interrupted {
            let flushed = self.scheduler.flush_all(self.output.as_mut());
            for update in self.reconciler.interrupt() {
                self.apply_transcript_update(update);
            }
            info!("Interrupted: flushed {} audio chunks", flushed);
            self.emit_activity("Interrupted");
        }
    }

    fn apply_partial(&mut self, speaker: Speaker, text: &str) {
        let update = self.reconciler.apply_partial(speaker, text);
        self.apply_transcript_update(update);

        match speaker {
            Speaker::User => self.emit_activity("You are speaking..."),
            Speaker::Agent => self.emit_activity("Agent is speaking..."),
            Speaker::System => {}
        }
    }

    fn apply_transcript_update(&mut self, update: TranscriptUpdate) {
        self.transcript.apply(&update);
        let _ = self.status_tx.send(StatusUpdate::Transcript { update });
    }

    fn handle_playback_ended(&mut self, id: u64) {
        if self.scheduler.on_playback_ended(id) && !self.listening {
            self.emit_activity("Ready");
        }
    }

    fn handle_capture_ended(&mut self) {
        if !self.listening {
            return;
        }
        info!("Microphone stream ended");
        self.listening = false;
        self.emit_activity("Microphone stopped");
        if self.scheduler.is_idle() {
            self.emit_activity("Ready");
        }
    }

    // ------------------------------------------------------------------
    // Status
    // ------------------------------------------------------------------

    fn set_state(&mut self, state: SessionState, message: &str) {
        if self.state != state {
            info!("Session state: {} -> {} ({})", self.state, state, message);
        }
        self.state = state;
        self.last_status = message.to_string();
        self.state_tx.send_replace(state);
        let _ = self.status_tx.send(StatusUpdate::State {
            state,
            message: message.to_string(),
        });
    }

    fn emit_activity(&mut self, message: &str) {
        debug!("Status: {}", message);
        self.last_status = message.to_string();
        let _ = self.status_tx.send(StatusUpdate::Activity {
            message: message.to_string(),
        });
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StatusUpdate> {
        self.status_tx.subscribe()
    }

    pub(crate) fn status_sender(&self) -> broadcast::Sender<StatusUpdate> {
        self.status_tx.clone()
    }

    pub fn watch_state(&self) -> watch::Receiver<SessionState> {
        self.state_tx.subscribe()
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.live.is_some()
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn last_status(&self) -> &str {
        &self.last_status
    }

    pub fn is_listening(&self) -> bool {
        self.listening
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    pub fn scheduler(&self) -> &PlaybackScheduler {
        &self.scheduler
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn stats(&self) -> SessionStats {
        let duration_secs = self
            .started_at
            .map(|t| Utc::now().signed_duration_since(t).num_milliseconds() as f64 / 1000.0)
            .unwrap_or(0.0);

        SessionStats {
            state: self.state,
            started_at: self.started_at,
            duration_secs,
            frames_sent: self.gate.frames_sent(),
            frames_dropped_before_open: self.gate.frames_dropped_before_open(),
            frames_dropped_backpressure: self.gate.frames_dropped_backpressure(),
            chunks_scheduled: self.chunks_scheduled,
            chunks_live: self.scheduler.live_count(),
            decode_errors: self.decode_errors,
            messages_received: self.messages_received,
            transcript_messages: self.transcript.len(),
            archived_entry: self.archived_entry.clone(),
        }
    }
}
