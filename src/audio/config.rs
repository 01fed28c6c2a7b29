//! Audio pipeline configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Playback and capture settings, the `[audio]` table of the config file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    /// Sample rate of audio received from the backend
    pub playback_sample_rate: u32,
    /// Sample rate of microphone audio sent to the backend
    pub capture_sample_rate: u32,
    /// Samples per capture frame
    pub capture_frame_samples: usize,
    /// Ring buffer length in seconds of playback audio
    pub ring_seconds: u32,
    /// Length of each chunk the scheduler pulls
    pub chunk_ms: u64,
    /// Buffered audio required before playback (re)starts
    pub initial_threshold_ms: f64,
    pub min_threshold_ms: f64,
    pub max_threshold_ms: f64,
    /// Arrival gaps at or below this are jitter-free
    pub noise_floor_ms: f64,
    pub threshold_step_ms: f64,
    /// Consecutive low-gap arrivals before the threshold relaxes
    pub relax_after_frames: u32,
    pub relax_step_ms: f64,
    pub volume: f32,
    /// Capacity of the capture worklet channels
    pub channel_capacity: usize,
    /// Open audio contexts kept before the oldest is evicted
    pub max_contexts: usize,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            playback_sample_rate: 24_000,
            capture_sample_rate: 16_000,
            capture_frame_samples: 1_600,
            ring_seconds: 180,
            chunk_ms: 20,
            initial_threshold_ms: 100.0,
            min_threshold_ms: 40.0,
            max_threshold_ms: 500.0,
            noise_floor_ms: 60.0,
            threshold_step_ms: 20.0,
            relax_after_frames: 50,
            relax_step_ms: 10.0,
            volume: 1.0,
            channel_capacity: 32,
            max_contexts: 4,
        }
    }
}

impl AudioConfig {
    pub fn chunk_duration(&self) -> Duration {
        Duration::from_millis(self.chunk_ms.max(1))
    }

    pub fn ring_capacity(&self) -> usize {
        (self.playback_sample_rate as usize).saturating_mul(self.ring_seconds.max(1) as usize)
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.playback_sample_rate == 0 || self.capture_sample_rate == 0 {
            return Err("audio sample rates must be greater than zero".to_string());
        }
        if self.capture_frame_samples == 0 {
            return Err("audio.capture_frame_samples must be at least 1".to_string());
        }
        if self.max_contexts == 0 {
            return Err("audio.max_contexts must be at least 1".to_string());
        }
        if self.channel_capacity == 0 {
            return Err("audio.channel_capacity must be at least 1".to_string());
        }
        if !(self.min_threshold_ms <= self.initial_threshold_ms
            && self.initial_threshold_ms <= self.max_threshold_ms)
        {
            return Err(
                "audio thresholds must satisfy min <= initial <= max".to_string(),
            );
        }
        if !(0.0..=1.0).contains(&self.volume) {
            return Err("audio.volume must be between 0 and 1".to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = AudioConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.ring_capacity(), 24_000 * 180);
    }

    #[test]
    fn test_partial_table_uses_defaults() {
        let config: AudioConfig = toml::from_str("max_threshold_ms = 800.0").unwrap();
        assert_eq!(config.max_threshold_ms, 800.0);
        assert_eq!(config.chunk_ms, 20);
    }

    #[test]
    fn test_inverted_thresholds_rejected() {
        let config = AudioConfig {
            min_threshold_ms: 300.0,
            ..AudioConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
