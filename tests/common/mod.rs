// Test doubles for the session's collaborators
//
// Every fake reports into one shared `Rig`, which the test uses both to
// drive the session (microphone frames, server events, ended chunks) and to
// observe what the session did to its resources.

#![allow(dead_code)]

use anyhow::Result;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;

use live_voice::audio::codec;
use live_voice::audio::AudioBlob;
use live_voice::session::SessionConfig;
use live_voice::transport::{
    ClientMessage, Connection, LiveSetup, ModelTurn, Part, PendingConnection, ServerContent,
    Transcription, OUTBOUND_CAPACITY,
};
use live_voice::{
    AudioBackend, AudioFrame, AudioOutput, LiveSession, MemoryArchive, PlaybackHandle,
    PlaybackStopFailure, SessionError, Transport, TransportEvent,
};

#[derive(Default)]
pub struct Rig {
    pub mic_fails: bool,
    pub connect_fails: bool,

    mic_frames: Mutex<Option<mpsc::Sender<AudioFrame>>>,
    pub mic_started: AtomicUsize,
    pub mic_stopped: AtomicUsize,
    pub mic_released: AtomicUsize,

    clock: Mutex<f64>,
    pub played: Mutex<Vec<(u64, f64, f64)>>,
    pub stopped: Mutex<Vec<u64>>,
    ended: Mutex<Option<mpsc::UnboundedSender<u64>>>,
    finished: Mutex<Vec<u64>>,
    pub output_opened: AtomicUsize,
    pub output_released: AtomicUsize,

    server: Mutex<Option<mpsc::Sender<TransportEvent>>>,
    outbound: Mutex<Option<mpsc::Receiver<ClientMessage>>>,
    pub setups: Mutex<Vec<LiveSetup>>,
    pub closed: AtomicUsize,
}

impl Rig {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn failing_microphone() -> Arc<Self> {
        Arc::new(Self {
            mic_fails: true,
            ..Self::default()
        })
    }

    pub fn failing_transport() -> Arc<Self> {
        Arc::new(Self {
            connect_fails: true,
            ..Self::default()
        })
    }

    /// Deliver one captured frame from the microphone
    pub async fn capture(&self, frame: AudioFrame) {
        let tx = self.mic_frames.lock().unwrap().clone();
        tx.expect("microphone not started")
            .send(frame.stamped())
            .await
            .unwrap();
    }

    /// End the microphone stream
    pub fn end_capture(&self) {
        self.mic_frames.lock().unwrap().take();
    }

    /// Deliver one event from the remote side
    pub async fn server_send(&self, event: TransportEvent) {
        let tx = self.server.lock().unwrap().clone();
        tx.expect("stream not connected").send(event).await.unwrap();
    }

    /// Drop the remote side of the event channel
    pub fn server_hang_up(&self) {
        self.server.lock().unwrap().take();
    }

    pub fn take_outbound(&self) -> mpsc::Receiver<ClientMessage> {
        self.outbound.lock().unwrap().take().expect("stream not connected")
    }

    pub fn set_clock(&self, now: f64) {
        *self.clock.lock().unwrap() = now;
    }

    /// Report a chunk as finished playing
    pub fn finish_chunk(&self, id: u64) {
        self.finished.lock().unwrap().push(id);
        if let Some(tx) = self.ended.lock().unwrap().as_ref() {
            let _ = tx.send(id);
        }
    }

    pub fn played(&self) -> Vec<(u64, f64, f64)> {
        self.played.lock().unwrap().clone()
    }

    pub fn stopped(&self) -> Vec<u64> {
        self.stopped.lock().unwrap().clone()
    }

    pub fn count(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::SeqCst)
    }
}

pub struct MockMicrophone {
    rig: Arc<Rig>,
}

#[async_trait::async_trait]
impl AudioBackend for MockMicrophone {
    async fn start(&mut self) -> Result<mpsc::Receiver<AudioFrame>, SessionError> {
        if self.rig.mic_fails {
            return Err(SessionError::DeviceUnavailable(
                "permission denied".to_string(),
            ));
        }
        let (tx, rx) = mpsc::channel(32);
        *self.rig.mic_frames.lock().unwrap() = Some(tx);
        self.rig.mic_started.fetch_add(1, Ordering::SeqCst);
        Ok(rx)
    }

    async fn stop(&mut self) -> Result<()> {
        self.rig.mic_frames.lock().unwrap().take();
        self.rig.mic_stopped.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn release(&mut self) -> Result<()> {
        self.rig.mic_released.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn is_capturing(&self) -> bool {
        self.rig.mic_frames.lock().unwrap().is_some()
    }

    fn name(&self) -> &str {
        "mock microphone"
    }
}

/// Output whose clock only moves when the test says so
pub struct ManualOutput {
    rig: Arc<Rig>,
}

impl AudioOutput for ManualOutput {
    fn open(&mut self, ended: mpsc::UnboundedSender<u64>) -> Result<()> {
        *self.rig.ended.lock().unwrap() = Some(ended);
        self.rig.output_opened.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn now(&self) -> f64 {
        *self.rig.clock.lock().unwrap()
    }

    fn play(&mut self, handle: &PlaybackHandle) -> Result<()> {
        self.rig
            .played
            .lock()
            .unwrap()
            .push((handle.id, handle.start_time, handle.duration_seconds));
        Ok(())
    }

    fn stop(&mut self, id: u64) -> Result<(), PlaybackStopFailure> {
        if self.rig.finished.lock().unwrap().contains(&id) {
            return Err(PlaybackStopFailure { id });
        }
        self.rig.stopped.lock().unwrap().push(id);
        Ok(())
    }

    fn release(&mut self) -> Result<()> {
        self.rig.ended.lock().unwrap().take();
        self.rig.output_released.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

pub struct MockTransport {
    rig: Arc<Rig>,
}

struct MockConnection {
    rig: Arc<Rig>,
}

#[async_trait::async_trait]
impl Connection for MockConnection {
    async fn close(&mut self) -> Result<()> {
        self.rig.closed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[async_trait::async_trait]
impl Transport for MockTransport {
    async fn connect(&self, setup: LiveSetup) -> Result<PendingConnection, SessionError> {
        if self.rig.connect_fails {
            return Err(SessionError::Transport("connection refused".to_string()));
        }

        self.rig.setups.lock().unwrap().push(setup);

        let (outbound_tx, outbound_rx) = mpsc::channel(OUTBOUND_CAPACITY);
        let (event_tx, event_rx) = mpsc::channel(32);
        *self.rig.outbound.lock().unwrap() = Some(outbound_rx);
        *self.rig.server.lock().unwrap() = Some(event_tx);

        Ok(PendingConnection {
            outbound: outbound_tx,
            events: event_rx,
            connection: Box::new(MockConnection {
                rig: Arc::clone(&self.rig),
            }),
        })
    }

    fn name(&self) -> &str {
        "mock transport"
    }
}

pub fn session(rig: &Arc<Rig>) -> (LiveSession, Arc<MemoryArchive>) {
    let archive = Arc::new(MemoryArchive::new());
    let session = LiveSession::new(
        SessionConfig::default(),
        Box::new(MockMicrophone {
            rig: Arc::clone(rig),
        }),
        Box::new(ManualOutput {
            rig: Arc::clone(rig),
        }),
        Arc::new(MockTransport {
            rig: Arc::clone(rig),
        }),
        archive.clone(),
    );
    (session, archive)
}

/// Dispatch the next event, failing the test if none arrives
pub async fn step(session: &mut LiveSession) {
    let event = tokio::time::timeout(Duration::from_secs(1), session.next_event())
        .await
        .expect("timed out waiting for a session event")
        .expect("session is not running");
    session.dispatch(event).await;
}

/// Let spawned tasks run until `done` holds
pub async fn wait_until(mut done: impl FnMut() -> bool) {
    tokio::time::timeout(Duration::from_secs(1), async {
        while !done() {
            tokio::task::yield_now().await;
        }
    })
    .await
    .expect("condition not reached in time");
}

pub fn frame(timestamp_ms: u64) -> AudioFrame {
    AudioFrame {
        samples: vec![0.25; 1600],
        sample_rate: 16000,
        channels: 1,
        timestamp_ms,
        sequence: 0,
    }
}

/// PCM blob of `seconds` of silence at 24 kHz
pub fn audio_blob(seconds: f64) -> AudioBlob {
    let samples = vec![0.0; (24000.0 * seconds) as usize];
    codec::encode(&samples, 24000).to_blob()
}

pub fn agent_text(text: &str) -> TransportEvent {
    TransportEvent::Content(ServerContent {
        output_transcription: Some(Transcription {
            text: text.to_string(),
        }),
        ..ServerContent::default()
    })
}

pub fn user_text(text: &str) -> TransportEvent {
    TransportEvent::Content(ServerContent {
        input_transcription: Some(Transcription {
            text: text.to_string(),
        }),
        ..ServerContent::default()
    })
}

pub fn turn_complete() -> TransportEvent {
    TransportEvent::Content(ServerContent {
        turn_complete: true,
        ..ServerContent::default()
    })
}

pub fn model_turn(blobs: Vec<AudioBlob>) -> ModelTurn {
    ModelTurn {
        parts: blobs
            .into_iter()
            .map(|blob| Part {
                inline_data: Some(blob),
                text: None,
            })
            .collect(),
    }
}

pub fn audio(blobs: Vec<AudioBlob>) -> TransportEvent {
    TransportEvent::Content(ServerContent {
        model_turn: Some(model_turn(blobs)),
        ..ServerContent::default()
    })
}

/// Start a session and complete the handshake
pub async fn activate(session: &mut LiveSession, rig: &Rig) {
    session.start().await.unwrap();
    rig.server_send(TransportEvent::Opened).await;
    step(session).await;
}
