pub mod backend;
pub mod codec;
pub mod file;
pub mod output;
pub mod playback;
pub mod resample;

pub use backend::{AudioBackend, AudioBackendConfig, AudioBackendFactory, AudioFrame, AudioSource};
pub use codec::{AudioBlob, AudioBuffer, EncodedAudio};
pub use file::{AudioFile, FileBackend};
pub use output::{AudioOutput, TimedOutput};
pub use playback::{PlaybackHandle, PlaybackScheduler};
pub use resample::{FrameConverter, StreamResampler};
