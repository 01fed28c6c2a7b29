//! Diagnostics console
//!
//! Human-readable summaries for an operator or a debug UI, plus the volume
//! control entry point. Reading a summary never mutates queue state.

use crate::core::registry::{Registry, RegistryError};
use crate::core::styles::StyleRole;
use crate::core::version;
use crate::diagnostics::tables::{audio_gap_table, queue_health_table, transmission_table};
use std::sync::Arc;

pub struct DiagnosticsConsole {
    registry: Arc<Registry>,
    color: bool,
}

impl DiagnosticsConsole {
    pub fn new(registry: Arc<Registry>, color: bool) -> Self {
        Self { registry, color }
    }

    pub fn transmission_summary(&self) -> Result<String, RegistryError> {
        let status = self.registry.manager()?.status();
        Ok(transmission_table(&status, self.color).to_string())
    }

    pub fn queue_health_summary(&self) -> Result<String, RegistryError> {
        let status = self.registry.manager()?.status();
        Ok(queue_health_table(&status, self.color).to_string())
    }

    pub fn audio_gap_summary(&self) -> Result<String, RegistryError> {
        let audio = self.registry.audio()?;
        let table = audio_gap_table(
            &audio.gap_stats(),
            audio.playback_state(),
            audio.volume(),
            self.color,
        );
        Ok(table.to_string())
    }

    /// Set playback volume (clamped to 0.0..=1.0); returns the applied value
    pub fn set_volume(&self, volume: f32) -> Result<f32, RegistryError> {
        let applied = self.registry.audio()?.set_volume(volume);
        log::info!("Playback volume set to {:.0}%", applied * 100.0);
        Ok(applied)
    }

    /// Every summary under a timestamped banner
    pub fn report(&self) -> Result<String, RegistryError> {
        let banner = format!(
            "{} at {}",
            version::banner(),
            chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
        );
        Ok(format!(
            "{}\n\n{}\n{}\n{}",
            StyleRole::Dim.paint(&banner, self.color),
            self.transmission_summary()?,
            self.queue_health_summary()?,
            self.audio_gap_summary()?
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::api::AudioConfig;
    use crate::queue::api::{ManagerConfig, Payload, SendOptions, TrafficClass};

    fn console() -> (DiagnosticsConsole, Arc<Registry>) {
        let registry = Arc::new(Registry::new());
        registry
            .init(ManagerConfig::default(), AudioConfig::default())
            .unwrap();
        (DiagnosticsConsole::new(Arc::clone(&registry), false), registry)
    }

    #[test]
    fn test_summaries_need_initialised_registry() {
        let console = DiagnosticsConsole::new(Arc::new(Registry::new()), false);
        assert!(matches!(
            console.transmission_summary(),
            Err(RegistryError::NotInitialised)
        ));
        assert!(console.set_volume(0.5).is_err());
    }

    #[test]
    fn test_queue_health_summary_lists_every_queue() {
        let (console, registry) = console();
        let manager = registry.manager().unwrap();
        manager.send(TrafficClass::Text, Payload::from("hi"), SendOptions::default());

        let summary = console.queue_health_summary().unwrap();
        for name in ["outbound.text", "inbound.audio", "overall", "healthy"] {
            assert!(summary.contains(name), "missing {} in\n{}", name, summary);
        }
        assert_eq!(manager.queue_depth(TrafficClass::Text), 1);
    }

    #[test]
    fn test_transmission_summary_reports_counters() {
        let (console, registry) = console();
        let manager = registry.manager().unwrap();
        manager.set_send_handler(|_, _| Ok(()));
        manager.send_direct(TrafficClass::Audio, Payload::Binary(vec![0, 0]));

        let summary = console.transmission_summary().unwrap();
        assert!(summary.contains("direct sends"));
        assert!(summary.contains("online / good"));
    }

    #[test]
    fn test_volume_and_audio_summary() {
        let (console, _registry) = console();
        assert_eq!(console.set_volume(2.0).unwrap(), 1.0);
        assert_eq!(console.set_volume(0.25).unwrap(), 0.25);

        let summary = console.audio_gap_summary().unwrap();
        assert!(summary.contains("25%"));
        assert!(summary.contains("Idle"));
        assert!(console.report().unwrap().contains("livequeue"));
    }
}
