// PCM codec for the realtime transport
//
// Outgoing capture audio is float32 in [-1, 1]; the transport carries
// 16-bit signed little-endian PCM tagged with `audio/pcm;rate=N`.
// Sample rate and channel count are never embedded in the payload.

use base64::Engine;
use serde::{Deserialize, Serialize};

use crate::error::DecodeError;

/// MIME type prefix understood by the transport
pub const PCM_MIME_TYPE: &str = "audio/pcm";

/// Bytes per encoded sample
pub const SAMPLE_WIDTH: usize = 2;

const POSITIVE_SCALE: f32 = i16::MAX as f32; // 32767
const NEGATIVE_SCALE: f32 = -(i16::MIN as f32); // 32768

/// Decoded, playable audio
#[derive(Debug, Clone, PartialEq)]
pub struct AudioBuffer {
    /// Interleaved float samples
    pub samples: Vec<f32>,
    pub sample_rate: u32,
    pub channels: u16,
}

impl AudioBuffer {
    /// Playback length in seconds
    pub fn duration_seconds(&self) -> f64 {
        if self.sample_rate == 0 || self.channels == 0 {
            return 0.0;
        }
        let frames = self.samples.len() / self.channels as usize;
        frames as f64 / self.sample_rate as f64
    }
}

/// One encoded frame, ready for the transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedAudio {
    pub mime_type: String,
    pub data: Vec<u8>,
}

/// Wire form of an audio payload (base64 data + MIME tag)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AudioBlob {
    pub mime_type: String,
    pub data: String,
}

impl EncodedAudio {
    pub fn to_blob(&self) -> AudioBlob {
        AudioBlob {
            mime_type: self.mime_type.clone(),
            data: base64::engine::general_purpose::STANDARD.encode(&self.data),
        }
    }
}

/// MIME tag for PCM at the given rate
pub fn mime_for_rate(sample_rate: u32) -> String {
    format!("{};rate={}", PCM_MIME_TYPE, sample_rate)
}

/// Map one float sample to 16-bit PCM.
///
/// 1.0 maps to `i16::MAX`, -1.0 to `i16::MIN`. Out-of-range input is clamped
/// and NaN encodes as silence.
pub fn sample_to_i16(sample: f32) -> i16 {
    if sample.is_nan() {
        return 0;
    }
    let s = sample.clamp(-1.0, 1.0);
    let scaled = if s < 0.0 {
        s * NEGATIVE_SCALE
    } else {
        s * POSITIVE_SCALE
    };
    scaled.round() as i16
}

/// Inverse of [`sample_to_i16`]
pub fn i16_to_sample(value: i16) -> f32 {
    if value < 0 {
        value as f32 / NEGATIVE_SCALE
    } else {
        value as f32 / POSITIVE_SCALE
    }
}

/// Encode float samples as tagged 16-bit little-endian PCM
pub fn encode(samples: &[f32], sample_rate: u32) -> EncodedAudio {
    let data: Vec<u8> = samples
        .iter()
        .flat_map(|&s| sample_to_i16(s).to_le_bytes())
        .collect();

    EncodedAudio {
        mime_type: mime_for_rate(sample_rate),
        data,
    }
}

/// Decode 16-bit little-endian PCM into a playable buffer
pub fn decode(data: &[u8], sample_rate: u32, channels: u16) -> Result<AudioBuffer, DecodeError> {
    if data.len() % SAMPLE_WIDTH != 0 {
        return Err(DecodeError::InvalidLength {
            len: data.len(),
            width: SAMPLE_WIDTH,
        });
    }

    let samples = data
        .chunks_exact(SAMPLE_WIDTH)
        .map(|chunk| i16_to_sample(i16::from_le_bytes([chunk[0], chunk[1]])))
        .collect();

    Ok(AudioBuffer {
        samples,
        sample_rate,
        channels,
    })
}

/// Decode a wire blob. The rate comes from the MIME tag when present,
/// otherwise `default_rate` is used.
pub fn decode_blob(
    blob: &AudioBlob,
    default_rate: u32,
    channels: u16,
) -> Result<AudioBuffer, DecodeError> {
    let sample_rate = parse_mime_rate(&blob.mime_type)?.unwrap_or(default_rate);
    let bytes = base64::engine::general_purpose::STANDARD.decode(&blob.data)?;
    decode(&bytes, sample_rate, channels)
}

fn parse_mime_rate(mime_type: &str) -> Result<Option<u32>, DecodeError> {
    let mut parts = mime_type.split(';').map(str::trim);
    let base = parts.next().unwrap_or_default();
    if !base.eq_ignore_ascii_case(PCM_MIME_TYPE) {
        return Err(DecodeError::UnsupportedMime(mime_type.to_string()));
    }

    Ok(parts
        .filter_map(|p| p.strip_prefix("rate="))
        .find_map(|rate| rate.parse().ok()))
}
