// Capture-side format conversion
//
// Frames are downmixed and, for whole-number ratios, decimated by
// `process_frame`. Other ratios (44.1 kHz WAV input is the usual case) go
// through an FFT resampler that keeps its state across frames, so frame
// boundaries don't click. Output length varies per frame; leftovers wait
// for the next frame.

use anyhow::Result;
use rubato::{FftFixedIn, Resampler};
use tracing::{debug, info};

use super::backend::{process_frame, AudioFrame};

/// Resampler for one fixed input/output rate pair (mono)
pub struct StreamResampler {
    resampler: FftFixedIn<f32>,
    input_buffer: Vec<f32>,
    chunk_size: usize,
    from_rate: u32,
    to_rate: u32,
}

impl StreamResampler {
    /// Create a resampler that consumes 10ms of input per step
    pub fn new(from_rate: u32, to_rate: u32) -> Result<Self> {
        let chunk_size = (from_rate as usize / 100).max(1);
        let resampler = FftFixedIn::<f32>::new(
            from_rate as usize,
            to_rate as usize,
            chunk_size,
            1, // sub chunks
            1, // channels (mono)
        )?;

        info!(
            "Capture resampler {}Hz -> {}Hz ({} samples per step)",
            from_rate, to_rate, chunk_size
        );

        Ok(Self {
            resampler,
            input_buffer: Vec::with_capacity(chunk_size * 2),
            chunk_size,
            from_rate,
            to_rate,
        })
    }

    pub fn from_rate(&self) -> u32 {
        self.from_rate
    }

    pub fn to_rate(&self) -> u32 {
        self.to_rate
    }

    /// Feed mono samples, returning whatever full steps produced
    pub fn process(&mut self, input: &[f32]) -> Result<Vec<f32>> {
        self.input_buffer.extend_from_slice(input);

        let mut output = Vec::new();
        while self.input_buffer.len() >= self.chunk_size {
            let chunk: Vec<f32> = self.input_buffer.drain(..self.chunk_size).collect();
            let resampled = self.resampler.process(&[chunk], None)?;
            output.extend_from_slice(&resampled[0]);
        }

        Ok(output)
    }
}

/// Converts captured frames to the session's input format.
///
/// Held by the capture pump for the lifetime of one session.
pub struct FrameConverter {
    target_sample_rate: u32,
    target_channels: u16,
    resampler: Option<StreamResampler>,
}

impl FrameConverter {
    pub fn new(target_sample_rate: u32, target_channels: u16) -> Self {
        Self {
            target_sample_rate,
            target_channels,
            resampler: None,
        }
    }

    /// Convert one frame. The result may hold fewer (or no) samples while
    /// the resampler is buffering.
    pub fn convert(&mut self, frame: AudioFrame) -> Result<AudioFrame> {
        let frame = process_frame(frame, self.target_sample_rate, self.target_channels);
        if frame.sample_rate == self.target_sample_rate || frame.channels != 1 {
            return Ok(frame);
        }

        let resampler = match self.resampler.take() {
            Some(r) if r.from_rate() == frame.sample_rate => r,
            previous => {
                if let Some(r) = previous {
                    debug!("Capture rate changed from {}Hz, rebuilding resampler", r.from_rate());
                }
                StreamResampler::new(frame.sample_rate, self.target_sample_rate)?
            }
        };
        let resampler = self.resampler.insert(resampler);
        let samples = resampler.process(&frame.samples)?;

        Ok(AudioFrame {
            samples,
            sample_rate: resampler.to_rate(),
            ..frame
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(samples: Vec<f32>, sample_rate: u32) -> AudioFrame {
        AudioFrame {
            samples,
            sample_rate,
            channels: 1,
            timestamp_ms: 0,
            sequence: 0,
        }
    }

    #[test]
    fn test_441k_is_resampled_to_16k() {
        let mut converter = FrameConverter::new(16000, 1);

        // One second of 100ms frames
        let mut total = 0;
        for _ in 0..10 {
            let out = converter.convert(frame(vec![0.25; 4410], 44100)).unwrap();
            assert_eq!(out.sample_rate, 16000);
            total += out.samples.len();
        }

        assert!(
            (15_500..=16_000).contains(&total),
            "expected about one second at 16kHz, got {} samples",
            total
        );
    }

    #[test]
    fn test_integer_ratio_skips_resampler() {
        let mut converter = FrameConverter::new(16000, 1);
        let out = converter.convert(frame(vec![0.1; 4800], 48000)).unwrap();

        assert_eq!(out.sample_rate, 16000);
        assert_eq!(out.samples.len(), 1600);
        assert!(converter.resampler.is_none());
    }

    #[test]
    fn test_partial_step_is_buffered() {
        let mut resampler = StreamResampler::new(44100, 16000).unwrap();

        assert!(resampler.process(&[0.0; 200]).unwrap().is_empty());
        assert_eq!(resampler.input_buffer.len(), 200);

        resampler.process(&[0.0; 300]).unwrap();
        assert_eq!(resampler.input_buffer.len(), 500 - 441);
    }
}
