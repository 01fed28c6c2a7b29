//! Jitter-tolerant playback session
//!
//! Frames from the backend are appended to a [`SampleRing`]; the scheduler
//! pulls fixed-length chunks back to back against the audio clock. Playback
//! only (re)starts once the buffered audio reaches an adaptive threshold:
//! arrival gaps above the noise floor raise it, a long run of calm arrivals
//! lowers it again.
//!
//! ```text
//! Idle --frame--> Buffering --threshold reached--> Playing
//!                     ^                               |
//!                     +----frame---- Underrun <--ring ran dry
//! ```
//!
//! Running dry is never an error: the session logs it, reports an
//! [`AudioEventType::Underrun`] and waits for data to re-accumulate.

use crate::audio::config::AudioConfig;
use crate::audio::error::AudioResult;
use crate::audio::pcm::{decode_base64, ms_to_samples, samples_to_ms};
use crate::audio::ring::SampleRing;
use crate::notifications::api::{publish_quietly, AudioEvent, AudioEventType, Event, SharedNotifications};
use serde::Serialize;
use std::time::Duration;
use tokio::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, strum_macros::Display)]
pub enum PlaybackState {
    Idle,
    Buffering,
    Playing,
    Underrun,
}

/// Arrival-gap statistics for diagnostics
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct GapStats {
    pub frames: u64,
    /// Gaps above the noise floor
    pub gap_count: u64,
    pub max_gap_ms: f64,
    pub average_gap_ms: f64,
    pub underruns: u64,
    pub overflows: u64,
    pub threshold_ms: f64,
}

/// One scheduled chunk of playback audio, volume already applied
#[derive(Debug, Clone, PartialEq)]
pub struct PlaybackChunk {
    pub samples: Vec<f32>,
    pub play_at: Instant,
    pub duration: Duration,
}

pub struct PlaybackSession {
    config: AudioConfig,
    ring: SampleRing,
    state: PlaybackState,
    threshold_ms: f64,
    volume: f32,
    next_play_time: Option<Instant>,
    last_arrival: Option<Instant>,
    calm_streak: u32,
    frames: u64,
    gap_count: u64,
    gap_total_ms: f64,
    gap_measurements: u64,
    max_gap_ms: f64,
    notifications: Option<SharedNotifications>,
}

impl PlaybackSession {
    pub fn new(config: AudioConfig) -> Self {
        Self {
            ring: SampleRing::new(config.ring_capacity()),
            state: PlaybackState::Idle,
            threshold_ms: config.initial_threshold_ms,
            volume: config.volume.clamp(0.0, 1.0),
            next_play_time: None,
            last_arrival: None,
            calm_streak: 0,
            frames: 0,
            gap_count: 0,
            gap_total_ms: 0.0,
            gap_measurements: 0,
            max_gap_ms: 0.0,
            notifications: None,
            config,
        }
    }

    pub fn with_notifications(mut self, notifications: SharedNotifications) -> Self {
        self.notifications = Some(notifications);
        self
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    pub fn threshold_ms(&self) -> f64 {
        self.threshold_ms
    }

    pub fn volume(&self) -> f32 {
        self.volume
    }

    /// Set the playback volume, clamped to `0.0..=1.0`; returns the applied value
    pub fn set_volume(&mut self, volume: f32) -> f32 {
        self.volume = if volume.is_nan() { 0.0 } else { volume.clamp(0.0, 1.0) };
        self.volume
    }

    pub fn buffered_ms(&self) -> f64 {
        samples_to_ms(self.ring.available(), self.config.playback_sample_rate)
    }

    pub fn gap_stats(&self) -> GapStats {
        GapStats {
            frames: self.frames,
            gap_count: self.gap_count,
            max_gap_ms: self.max_gap_ms,
            average_gap_ms: if self.gap_measurements == 0 {
                0.0
            } else {
                self.gap_total_ms / self.gap_measurements as f64
            },
            underruns: self.ring.underrun_count(),
            overflows: self.ring.overflow_count(),
            threshold_ms: self.threshold_ms,
        }
    }

    /// Append a received frame and advance the state machine
    pub fn push_frame(&mut self, samples: &[f32], now: Instant) {
        if samples.is_empty() {
            return;
        }
        if self.state != PlaybackState::Idle {
            if let Some(previous) = self.last_arrival {
                self.record_gap(now.saturating_duration_since(previous));
            }
        }
        self.last_arrival = Some(now);
        self.frames += 1;
        self.ring.write(samples);

        match self.state {
            PlaybackState::Idle | PlaybackState::Underrun => {
                self.state = PlaybackState::Buffering;
                self.maybe_start();
            }
            PlaybackState::Buffering => self.maybe_start(),
            PlaybackState::Playing => {}
        }
    }

    /// Decode a base64 PCM16 frame and append it
    pub fn push_base64(&mut self, encoded: &str, now: Instant) -> AudioResult<()> {
        let samples = decode_base64(encoded)?;
        self.push_frame(&samples, now);
        Ok(())
    }

    /// Pull the next chunk while playing
    ///
    /// Chunks are scheduled back to back: each starts at
    /// `max(now, next_play_time)`. A short read delivers the remaining tail
    /// and moves the session to `Underrun`.
    pub fn pull(&mut self, now: Instant) -> Option<PlaybackChunk> {
        if self.state != PlaybackState::Playing {
            return None;
        }

        let chunk_samples = ms_to_samples(self.config.chunk_ms as f64, self.config.playback_sample_rate).max(1);
        let mut samples = vec![0.0; chunk_samples];
        let read = self.ring.read(&mut samples);
        if read < chunk_samples {
            self.enter_underrun();
            if read == 0 {
                return None;
            }
            samples.truncate(read);
        }

        for sample in samples.iter_mut() {
            *sample *= self.volume;
        }

        let play_at = self.next_play_time.map_or(now, |next| next.max(now));
        let duration = Duration::from_nanos(
            read as u64 * 1_000_000_000 / u64::from(self.config.playback_sample_rate.max(1)),
        );
        self.next_play_time = Some(play_at + duration);

        Some(PlaybackChunk {
            samples,
            play_at,
            duration,
        })
    }

    /// Pull every chunk due to start within `lookahead` of `now`
    pub fn pull_due(&mut self, now: Instant, lookahead: Duration) -> Vec<PlaybackChunk> {
        let horizon = now + lookahead;
        let mut chunks = Vec::new();
        while self.next_play_time.map_or(true, |next| next <= horizon) {
            match self.pull(now) {
                Some(chunk) => chunks.push(chunk),
                None => break,
            }
        }
        chunks
    }

    /// Drop buffered audio and return to `Idle` (interruption or end of turn)
    pub fn stop(&mut self) {
        self.ring.clear();
        self.next_play_time = None;
        self.last_arrival = None;
        self.calm_streak = 0;
        if self.state != PlaybackState::Idle {
            self.state = PlaybackState::Idle;
            self.publish(AudioEvent::new(AudioEventType::PlaybackStopped));
        }
    }

    fn maybe_start(&mut self) {
        if self.buffered_ms() >= self.threshold_ms {
            self.state = PlaybackState::Playing;
            self.next_play_time = None;
            log::debug!(
                "Playback started with {:.0}ms buffered (threshold {:.0}ms)",
                self.buffered_ms(),
                self.threshold_ms
            );
            self.publish(AudioEvent::with_threshold(
                AudioEventType::PlaybackStarted,
                self.threshold_ms,
            ));
        }
    }

    fn enter_underrun(&mut self) {
        self.state = PlaybackState::Underrun;
        self.next_play_time = None;
        log::warn!(
            "Playback underrun: ring buffer empty, rebuffering to {:.0}ms",
            self.threshold_ms
        );
        self.publish(AudioEvent::with_threshold(AudioEventType::Underrun, self.threshold_ms));
    }

    fn record_gap(&mut self, gap: Duration) {
        let gap_ms = gap.as_secs_f64() * 1000.0;
        self.gap_total_ms += gap_ms;
        self.gap_measurements += 1;
        self.max_gap_ms = self.max_gap_ms.max(gap_ms);

        if gap_ms > self.config.noise_floor_ms {
            self.gap_count += 1;
            self.calm_streak = 0;
            let raised = (self.threshold_ms + self.config.threshold_step_ms).min(self.config.max_threshold_ms);
            if raised > self.threshold_ms {
                self.threshold_ms = raised;
                log::debug!("Arrival gap {:.0}ms, threshold raised to {:.0}ms", gap_ms, raised);
                self.publish(AudioEvent::with_threshold(AudioEventType::ThresholdRaised, raised));
            }
            return;
        }

        self.calm_streak += 1;
        if self.calm_streak >= self.config.relax_after_frames.max(1) {
            self.calm_streak = 0;
            let relaxed = (self.threshold_ms - self.config.relax_step_ms).max(self.config.min_threshold_ms);
            if relaxed < self.threshold_ms {
                self.threshold_ms = relaxed;
                log::debug!("Arrivals steady, threshold relaxed to {:.0}ms", relaxed);
            }
        }
    }

    fn publish(&self, event: AudioEvent) {
        if let Some(notifications) = &self.notifications {
            publish_quietly(notifications, Event::Audio(event));
        }
    }
}
