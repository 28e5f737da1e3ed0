use anyhow::Result;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::mpsc;

use crate::error::SessionError;

/// One capture-callback delivery (float PCM, interleaved)
#[derive(Debug, Clone)]
pub struct AudioFrame {
    /// Raw audio samples in [-1, 1], interleaved
    pub samples: Vec<f32>,
    /// Sample rate in Hz
    pub sample_rate: u32,
    /// Number of channels
    pub channels: u16,
    /// Timestamp in milliseconds since capture started
    pub timestamp_ms: u64,
    /// Process-wide capture order, assigned on delivery by [`AudioFrame::stamped`].
    /// Zero means the frame was never delivered by a backend.
    pub sequence: u64,
}

static CAPTURE_SEQUENCE: AtomicU64 = AtomicU64::new(0);

impl AudioFrame {
    /// Stamp the frame with the next capture sequence number.
    ///
    /// Backends call this at the moment a frame leaves the device, so the
    /// stamp orders it against [`capture_watermark`] readings.
    pub fn stamped(mut self) -> Self {
        self.sequence = CAPTURE_SEQUENCE.fetch_add(1, Ordering::SeqCst) + 1;
        self
    }
}

/// Sequence number the next delivered frame will carry. Every frame
/// delivered before this call has a smaller one.
pub fn capture_watermark() -> u64 {
    CAPTURE_SEQUENCE.load(Ordering::SeqCst) + 1
}

/// Configuration for audio capture backends
#[derive(Debug, Clone)]
pub struct AudioBackendConfig {
    /// Target sample rate (frames are decimated to this rate)
    pub target_sample_rate: u32,
    /// Target channel count (1 = mono)
    pub target_channels: u16,
    /// Frame size in milliseconds (affects latency)
    pub buffer_duration_ms: u64,
}

impl Default for AudioBackendConfig {
    fn default() -> Self {
        Self {
            target_sample_rate: 16000, // realtime input rate
            target_channels: 1,        // Mono
            buffer_duration_ms: 100,   // 100ms frames
        }
    }
}

/// Microphone capture backend
///
/// Lifecycle per session: `start` acquires the device and begins
/// delivering frames, `stop` halts capture, `release` gives the device back.
#[async_trait::async_trait]
pub trait AudioBackend: Send + Sync {
    /// Start capturing audio
    ///
    /// Returns a channel receiver that will receive audio frames. Fails with
    /// [`SessionError::DeviceUnavailable`] when the device is missing or
    /// permission is denied.
    async fn start(&mut self) -> Result<mpsc::Receiver<AudioFrame>, SessionError>;

    /// Stop capturing audio
    async fn stop(&mut self) -> Result<()>;

    /// Release the underlying device
    async fn release(&mut self) -> Result<()> {
        Ok(())
    }

    /// Check if backend is currently capturing
    fn is_capturing(&self) -> bool;

    /// Get backend name for logging
    fn name(&self) -> &str;
}

/// Audio source type
#[derive(Debug, Clone)]
pub enum AudioSource {
    /// WAV file played back as if captured live
    File(PathBuf),
}

/// Audio backend factory
pub struct AudioBackendFactory;

impl AudioBackendFactory {
    /// Create audio backend for the given source
    pub fn create(source: AudioSource, config: AudioBackendConfig) -> Box<dyn AudioBackend> {
        match source {
            AudioSource::File(path) => Box::new(super::file::FileBackend::new(path, config)),
        }
    }
}

/// Bring a captured frame to the target format: mono, then decimated.
///
/// Only whole-number rate ratios are decimated. Any other rate is left as
/// it is so the frame never claims a rate its samples don't have; use
/// [`FrameConverter`](super::resample::FrameConverter) to resample those.
pub fn process_frame(frame: AudioFrame, target_sample_rate: u32, target_channels: u16) -> AudioFrame {
    let mut processed = frame;

    // Convert to mono first so decimation steps over whole frames
    if processed.channels != target_channels && target_channels == 1 {
        processed = downmix_to_mono(processed);
    }

    if processed.sample_rate != target_sample_rate {
        processed = downsample_frame(processed, target_sample_rate);
    }

    processed
}

/// Downsample audio frame by decimation
fn downsample_frame(frame: AudioFrame, target_rate: u32) -> AudioFrame {
    if frame.sample_rate == target_rate || target_rate == 0 {
        return frame;
    }

    let ratio = frame.sample_rate / target_rate;
    if ratio <= 1 || frame.sample_rate % target_rate != 0 {
        return frame; // Can't upsample, won't mislabel
    }

    let channels = frame.channels.max(1) as usize;
    let downsampled: Vec<f32> = frame
        .samples
        .chunks(channels)
        .step_by(ratio as usize)
        .flatten()
        .copied()
        .collect();

    AudioFrame {
        samples: downsampled,
        sample_rate: target_rate,
        ..frame
    }
}

/// Convert interleaved multi-channel audio to mono by averaging
fn downmix_to_mono(frame: AudioFrame) -> AudioFrame {
    if frame.channels <= 1 {
        return frame;
    }

    let channels = frame.channels as usize;
    let mono_samples = frame
        .samples
        .chunks_exact(channels)
        .map(|chunk| chunk.iter().sum::<f32>() / channels as f32)
        .collect();

    AudioFrame {
        samples: mono_samples,
        channels: 1,
        ..frame
    }
}
