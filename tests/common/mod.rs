//! Shared fixtures for integration tests

#![allow(dead_code)]

use livequeue::app::simulation::SimulationConfig;
use livequeue::audio::api::AudioConfig;
use livequeue::core::registry::Registry;
use livequeue::queue::api::ManagerConfig;
use std::sync::Arc;

/// Fast loopback: no refused connects, short timers
pub fn quick_simulation() -> SimulationConfig {
    SimulationConfig {
        text_interval_ms: 50,
        video_interval_ms: 40,
        refuse_connects: 0,
        ..SimulationConfig::default()
    }
}

/// Small capture frames and a low start threshold so playback begins quickly
pub fn quick_audio() -> AudioConfig {
    AudioConfig {
        capture_frame_samples: 320,
        initial_threshold_ms: 20.0,
        min_threshold_ms: 20.0,
        ..AudioConfig::default()
    }
}

pub fn initialised_registry(config: ManagerConfig) -> Arc<Registry> {
    let registry = Arc::new(Registry::new());
    registry
        .init(config, quick_audio())
        .expect("registry should initialise");
    registry
}
