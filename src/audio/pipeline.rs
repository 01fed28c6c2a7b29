//! AudioPipeline - playback and capture for one client session

use crate::audio::capture::{spawn_capture_forwarder, CaptureFeed, CaptureSummary, CaptureWorklet};
use crate::audio::config::AudioConfig;
use crate::audio::contexts::{AudioContext, AudioContextCache};
use crate::audio::error::{AudioError, AudioResult};
use crate::audio::pcm::pcm16_to_f32;
use crate::audio::playback::{GapStats, PlaybackChunk, PlaybackSession, PlaybackState};
use crate::notifications::api::SharedNotifications;
use crate::queue::api::{MessageQueueManager, Payload};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;

const PLAYBACK_CONTEXT: &str = "playback";
const CAPTURE_CONTEXT: &str = "capture";

/// Registers the playback session in the context cache; closing it stops playback
struct PlaybackContext {
    session: Arc<Mutex<PlaybackSession>>,
}

impl AudioContext for PlaybackContext {
    fn id(&self) -> &str {
        PLAYBACK_CONTEXT
    }

    fn close(&mut self) {
        if let Ok(mut session) = self.session.lock() {
            session.stop();
        }
    }
}

/// A running capture: the feed for raw blocks and the forwarder task
pub struct CaptureHandle {
    pub feed: CaptureFeed,
    pub forwarder: JoinHandle<CaptureSummary>,
}

pub struct AudioPipeline {
    config: AudioConfig,
    playback: Arc<Mutex<PlaybackSession>>,
    contexts: Mutex<AudioContextCache>,
}

impl AudioPipeline {
    pub fn new(config: AudioConfig, notifications: SharedNotifications) -> Self {
        let playback = Arc::new(Mutex::new(
            PlaybackSession::new(config.clone()).with_notifications(notifications),
        ));
        let mut contexts = AudioContextCache::new(config.max_contexts);
        contexts.add(Box::new(PlaybackContext {
            session: Arc::clone(&playback),
        }));

        Self {
            config,
            playback,
            contexts: Mutex::new(contexts),
        }
    }

    pub fn config(&self) -> &AudioConfig {
        &self.config
    }

    /// Feed a received audio payload (PCM16 little-endian) into playback
    pub fn handle_inbound(&self, payload: &Payload, now: Instant) -> AudioResult<()> {
        let Payload::Binary(bytes) = payload else {
            return Err(AudioError::InvalidFrame(
                "audio payload must be binary PCM16".to_string(),
            ));
        };
        let samples = pcm16_to_f32(bytes)?;
        self.playback.lock().unwrap().push_frame(&samples, now);
        Ok(())
    }

    /// React to a turn-control message; an interruption drops buffered audio
    pub fn handle_turn_control(&self, value: &serde_json::Value) {
        let interrupted = value
            .get("interrupted")
            .and_then(|v| v.as_bool())
            .unwrap_or(false);
        if interrupted {
            log::info!("Turn interrupted, stopping playback");
            self.playback.lock().unwrap().stop();
        }
    }

    pub fn pull_due(&self, now: Instant, lookahead: Duration) -> Vec<PlaybackChunk> {
        self.playback.lock().unwrap().pull_due(now, lookahead)
    }

    pub fn playback_state(&self) -> PlaybackState {
        self.playback.lock().unwrap().state()
    }

    pub fn buffered_ms(&self) -> f64 {
        self.playback.lock().unwrap().buffered_ms()
    }

    pub fn gap_stats(&self) -> GapStats {
        self.playback.lock().unwrap().gap_stats()
    }

    pub fn volume(&self) -> f32 {
        self.playback.lock().unwrap().volume()
    }

    pub fn set_volume(&self, volume: f32) -> f32 {
        self.playback.lock().unwrap().set_volume(volume)
    }

    /// Start the capture worklet and forward its frames through `manager`
    ///
    /// Replaces any capture already running. Needs a tokio runtime.
    pub fn start_capture(&self, manager: &Arc<MessageQueueManager>) -> AudioResult<CaptureHandle> {
        if tokio::runtime::Handle::try_current().is_err() {
            return Err(AudioError::WorkletStopped);
        }
        let (worklet, feed, frames) = CaptureWorklet::spawn(
            CAPTURE_CONTEXT,
            self.config.capture_frame_samples,
            self.config.channel_capacity,
        )?;
        self.contexts.lock().unwrap().add(Box::new(worklet));
        let forwarder = spawn_capture_forwarder(Arc::clone(manager), frames);
        log::info!(
            "Capture started ({} samples per frame at {} Hz)",
            self.config.capture_frame_samples,
            self.config.capture_sample_rate
        );
        Ok(CaptureHandle { feed, forwarder })
    }

    pub fn stop_capture(&self) -> bool {
        self.contexts.lock().unwrap().remove(CAPTURE_CONTEXT)
    }

    pub fn is_capturing(&self) -> bool {
        self.contexts.lock().unwrap().contains(CAPTURE_CONTEXT)
    }

    pub fn context_count(&self) -> usize {
        self.contexts.lock().unwrap().len()
    }

    /// Release every audio context; returns how many were closed
    pub fn close(&self) -> usize {
        let closed = self.contexts.lock().unwrap().cleanup();
        log::debug!("Closed {} audio context(s)", closed);
        closed
    }
}
