//! TOML configuration file
//!
//! Every key is optional. Values present in the file are applied on top of
//! the built-in per-class defaults, and command line flags are applied on
//! top of the file. Layout:
//!
//! ```toml
//! enabled = true
//! auto_tuning = true
//! processing_interval_ms = 16
//!
//! [logging]
//! level = "debug"
//!
//! [outbound.video]
//! max_size = 5
//! overflow_strategy = "replace_newest"
//!
//! [inbound.audio]
//! ordering_window_ms = 150
//!
//! [audio]
//! max_threshold_ms = 800.0
//!
//! [simulation]
//! duration_secs = 5
//! ```

use crate::app::simulation::SimulationConfig;
use crate::audio::api::AudioConfig;
use crate::core::error_handling::ContextualError;
use crate::queue::api::{
    HealthThresholds, ManagerConfig, OrderingExpiry, OverflowStrategy, Priority,
    PriorityQueueConfig, ProcessingMode, ProcessingQueueConfig, ReplaceScope, TrafficClass,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use strum::IntoEnumIterator;

// Copy every `Some` field of `$from` onto `$to`
macro_rules! apply_present {
    ($from:expr => $to:expr; $($field:ident),+ $(,)?) => {
        $( if let Some(value) = $from.$field { $to.$field = value; } )+
    };
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Cannot read configuration file {path}: {reason}")]
    Read { path: PathBuf, reason: String },

    #[error("Cannot parse configuration file {path}: {reason}")]
    Parse { path: PathBuf, reason: String },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

impl ContextualError for ConfigError {
    fn is_user_actionable(&self) -> bool {
        true
    }

    fn user_message(&self) -> Option<&str> {
        match self {
            ConfigError::Read { .. } => Some("Configuration file could not be read"),
            ConfigError::Parse { .. } => Some("Configuration file is not valid TOML"),
            ConfigError::Invalid(message) => Some(message),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingSection {
    pub level: Option<String>,
    pub format: Option<String>,
    pub file: Option<PathBuf>,
    pub color: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OutboundOverrides {
    pub max_size: Option<usize>,
    pub rate_limit_ms: Option<u64>,
    pub batch_size: Option<usize>,
    pub timeout_ms: Option<u64>,
    pub priority: Option<Priority>,
    pub overflow_strategy: Option<OverflowStrategy>,
    pub compression_threshold: Option<f64>,
    pub replace_scope: Option<ReplaceScope>,
    pub max_retries: Option<u32>,
}

impl OutboundOverrides {
    fn apply(&self, target: &mut PriorityQueueConfig) {
        apply_present!(self => target;
            max_size,
            rate_limit_ms,
            batch_size,
            timeout_ms,
            priority,
            overflow_strategy,
            compression_threshold,
            replace_scope,
            max_retries
        );
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct InboundOverrides {
    pub mode: Option<ProcessingMode>,
    pub buffer_size_ms: Option<u64>,
    pub max_buffer_size: Option<usize>,
    pub chunk_timeout_ms: Option<u64>,
    pub enable_ordering: Option<bool>,
    pub ordering_window_ms: Option<u64>,
    pub initial_sequence: Option<u64>,
    pub ordering_expiry: Option<OrderingExpiry>,
}

impl InboundOverrides {
    fn apply(&self, target: &mut ProcessingQueueConfig) {
        apply_present!(self => target;
            mode,
            buffer_size_ms,
            max_buffer_size,
            chunk_timeout_ms,
            enable_ordering,
            ordering_window_ms,
            initial_sequence,
            ordering_expiry
        );
    }
}

/// Raw contents of the configuration file
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConfigFile {
    pub enabled: Option<bool>,
    pub debug_mode: Option<bool>,
    pub max_memory_mb: Option<u64>,
    pub health_check_interval_ms: Option<u64>,
    pub processing_interval_ms: Option<u64>,
    pub auto_tuning: Option<bool>,
    pub offline_buffer_size: Option<usize>,
    pub offline_flush_delay_ms: Option<u64>,
    pub health: Option<HealthThresholds>,
    pub outbound: BTreeMap<String, OutboundOverrides>,
    pub inbound: BTreeMap<String, InboundOverrides>,
    pub logging: LoggingSection,
    pub audio: Option<AudioConfig>,
    pub simulation: Option<SimulationConfig>,
}

/// Fully resolved settings for one run
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct EffectiveConfig {
    #[serde(flatten)]
    pub queue: ManagerConfig,
    pub audio: AudioConfig,
    pub simulation: SimulationConfig,
}

impl EffectiveConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.queue.validate().map_err(ConfigError::Invalid)?;
        self.audio.validate().map_err(ConfigError::Invalid)
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::Invalid(e.to_string()))
    }
}

/// `<config dir>/Livequeue/livequeue.toml`
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("Livequeue").join("livequeue.toml"))
}

fn class_named(name: &str) -> Result<TrafficClass, ConfigError> {
    TrafficClass::iter()
        .find(|class| class.to_string() == name)
        .ok_or_else(|| {
            ConfigError::Invalid(format!(
                "unknown traffic class '{}' (expected control, audio, text or video)",
                name
            ))
        })
}

impl ConfigFile {
    pub fn parse(contents: &str, path: &Path) -> Result<Self, ConfigError> {
        toml::from_str(contents).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }

    /// Load the explicit file (which must exist) or the default one if present
    pub async fn load(explicit: Option<&Path>) -> Result<Option<(PathBuf, Self)>, ConfigError> {
        let path = match explicit {
            Some(path) => path.to_path_buf(),
            None => match default_config_path() {
                Some(path) if path.exists() => path,
                _ => return Ok(None),
            },
        };

        let contents = tokio::fs::read_to_string(&path)
            .await
            .map_err(|e| ConfigError::Read {
                path: path.clone(),
                reason: e.to_string(),
            })?;
        let file = Self::parse(&contents, &path)?;
        log::debug!("Loaded configuration from {}", path.display());
        Ok(Some((path, file)))
    }

    /// Apply every value present in the file
    pub fn apply(&self, target: &mut EffectiveConfig) -> Result<(), ConfigError> {
        let queue = &mut target.queue;
        apply_present!(self => queue;
            enabled,
            debug_mode,
            max_memory_mb,
            health_check_interval_ms,
            processing_interval_ms,
            auto_tuning,
            offline_buffer_size,
            offline_flush_delay_ms,
            health
        );

        for (name, overrides) in &self.outbound {
            overrides.apply(queue.outbound.get_mut(class_named(name)?));
        }
        for (name, overrides) in &self.inbound {
            overrides.apply(queue.inbound.get_mut(class_named(name)?));
        }
        if let Some(audio) = &self.audio {
            target.audio = audio.clone();
        }
        if let Some(simulation) = &self.simulation {
            target.simulation = simulation.clone();
        }
        Ok(())
    }
}
