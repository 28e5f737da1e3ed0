// Microphone → transport pump
//
// Runs outside the session actor. It only touches the gate and the outbound
// sender, never session state, and never waits on the remote side.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, info, warn};

use super::SessionEvent;
use crate::audio::backend::{capture_watermark, AudioFrame};
use crate::audio::codec;
use crate::audio::FrameConverter;
use crate::transport::{ClientMessage, RealtimeInput};

const CLOSED: u64 = u64::MAX;

/// Admits capture frames only once the stream handshake has completed.
///
/// Opening records the capture watermark, so a frame is judged by when it
/// was captured, not by when the pump gets to it. Frames still buffered
/// from before the handshake are dropped even if read afterwards.
#[derive(Debug)]
pub struct CaptureGate {
    epoch: u64,
    opened_at: AtomicU64,
    sent: AtomicU64,
    dropped_before_open: AtomicU64,
    dropped_backpressure: AtomicU64,
}

impl CaptureGate {
    pub fn new(epoch: u64) -> Self {
        Self {
            epoch,
            opened_at: AtomicU64::new(CLOSED),
            sent: AtomicU64::new(0),
            dropped_before_open: AtomicU64::new(0),
            dropped_backpressure: AtomicU64::new(0),
        }
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Admit frames captured from now on. Opening twice keeps the first mark.
    pub fn open(&self) {
        let _ = self.opened_at.compare_exchange(
            CLOSED,
            capture_watermark(),
            Ordering::SeqCst,
            Ordering::SeqCst,
        );
    }

    pub fn close(&self) {
        self.opened_at.store(CLOSED, Ordering::SeqCst);
    }

    pub fn is_open(&self) -> bool {
        self.opened_at.load(Ordering::SeqCst) != CLOSED
    }

    /// Whether `frame` was captured after the gate opened
    pub fn admits(&self, frame: &AudioFrame) -> bool {
        frame.sequence >= self.opened_at.load(Ordering::SeqCst)
    }

    pub fn frames_sent(&self) -> u64 {
        self.sent.load(Ordering::SeqCst)
    }

    /// Frames captured before the handshake completed
    pub fn frames_dropped_before_open(&self) -> u64 {
        self.dropped_before_open.load(Ordering::SeqCst)
    }

    /// Frames dropped because the outbound channel was full
    pub fn frames_dropped_backpressure(&self) -> u64 {
        self.dropped_backpressure.load(Ordering::SeqCst)
    }
}

/// Encode and forward every frame captured while the gate is open.
///
/// Frames captured while the gate was closed are dropped, not queued.
pub(crate) async fn run_capture_pump(
    mut frames: mpsc::Receiver<AudioFrame>,
    gate: Arc<CaptureGate>,
    outbound: mpsc::Sender<ClientMessage>,
    input_sample_rate: u32,
    channels: u16,
    events: mpsc::UnboundedSender<SessionEvent>,
) {
    info!("Capture pump started (epoch {})", gate.epoch());

    let mut converter = FrameConverter::new(input_sample_rate, channels);

    while let Some(frame) = frames.recv().await {
        if !gate.admits(&frame) {
            gate.dropped_before_open.fetch_add(1, Ordering::SeqCst);
            debug!(
                "Dropping capture frame at {}ms: captured before the stream opened",
                frame.timestamp_ms
            );
            continue;
        }

        let frame = match converter.convert(frame) {
            Ok(frame) if frame.samples.is_empty() => continue,
            Ok(frame) => frame,
            Err(e) => {
                warn!("Failed to convert capture frame: {:#}", e);
                continue;
            }
        };

        let encoded = codec::encode(&frame.samples, frame.sample_rate);
        let message = ClientMessage::RealtimeInput(RealtimeInput {
            media_chunks: vec![encoded.to_blob()],
        });

        match outbound.try_send(message) {
            Ok(()) => {
                gate.sent.fetch_add(1, Ordering::SeqCst);
            }
            Err(TrySendError::Full(_)) => {
                gate.dropped_backpressure.fetch_add(1, Ordering::SeqCst);
                warn!("Outbound stream is backed up, dropping capture frame");
            }
            Err(TrySendError::Closed(_)) => {
                debug!("Outbound stream closed, stopping capture pump");
                break;
            }
        }
    }

    info!(
        "Capture pump stopped ({} sent, {} before open, {} backed up)",
        gate.frames_sent(),
        gate.frames_dropped_before_open(),
        gate.frames_dropped_backpressure()
    );

    let _ = events.send(SessionEvent::CaptureEnded {
        epoch: gate.epoch(),
    });
}
