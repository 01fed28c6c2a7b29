//! Public API for the audio pipeline

pub use crate::audio::capture::{
    spawn_capture_forwarder, CaptureFeed, CaptureFrame, CaptureSummary, CaptureWorklet,
    FrameAccumulator, WorkletInput, WorkletOutput,
};
pub use crate::audio::config::AudioConfig;
pub use crate::audio::contexts::{AudioContext, AudioContextCache};
pub use crate::audio::error::{AudioError, AudioResult};
pub use crate::audio::pcm::{decode_base64, encode_base64, f32_to_pcm16, pcm16_to_f32};
pub use crate::audio::pipeline::{AudioPipeline, CaptureHandle};
pub use crate::audio::playback::{GapStats, PlaybackChunk, PlaybackSession, PlaybackState};
pub use crate::audio::ring::SampleRing;
