//! Queue configuration
//!
//! Defaults are per traffic class: audio is rate-limited and compressible,
//! video keeps only the latest frames, text batches generously and control
//! is never rate-limited.

use crate::queue::metrics::HealthThresholds;
use crate::queue::types::{
    ConnectionQuality, OrderingExpiry, OverflowStrategy, Priority, ProcessingMode, ReplaceScope,
    TrafficClass,
};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Settings of one outbound priority queue
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriorityQueueConfig {
    pub max_size: usize,
    pub rate_limit_ms: u64,
    pub batch_size: usize,
    pub timeout_ms: u64,
    pub priority: Priority,
    pub overflow_strategy: OverflowStrategy,
    /// Target fill ratio after a `Compress` pass
    pub compression_threshold: f64,
    pub replace_scope: ReplaceScope,
    pub max_retries: u32,
}

impl PriorityQueueConfig {
    pub fn for_class(class: TrafficClass) -> Self {
        match class {
            TrafficClass::Audio => Self {
                max_size: 50,
                rate_limit_ms: 20,
                batch_size: 5,
                timeout_ms: 1_000,
                priority: Priority::High,
                overflow_strategy: OverflowStrategy::Compress,
                compression_threshold: 0.5,
                replace_scope: ReplaceScope::LowOnly,
                max_retries: 1,
            },
            TrafficClass::Video => Self {
                max_size: 10,
                rate_limit_ms: 100,
                batch_size: 1,
                timeout_ms: 500,
                priority: Priority::Low,
                overflow_strategy: OverflowStrategy::ReplaceNewest,
                compression_threshold: 0.5,
                replace_scope: ReplaceScope::LowOnly,
                max_retries: 0,
            },
            TrafficClass::Text => Self {
                max_size: 100,
                rate_limit_ms: 50,
                batch_size: 10,
                timeout_ms: 30_000,
                priority: Priority::Medium,
                overflow_strategy: OverflowStrategy::FailSend,
                compression_threshold: 0.5,
                replace_scope: ReplaceScope::LowOnly,
                max_retries: 2,
            },
            TrafficClass::Control => Self {
                max_size: 20,
                rate_limit_ms: 0,
                batch_size: 1,
                timeout_ms: 5_000,
                priority: Priority::Urgent,
                overflow_strategy: OverflowStrategy::FailSend,
                compression_threshold: 0.5,
                replace_scope: ReplaceScope::LowOnly,
                max_retries: 2,
            },
        }
    }

    pub fn rate_limit(&self) -> Duration {
        Duration::from_millis(self.rate_limit_ms)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Rate limit and capacity to use under `quality`
    ///
    /// Good restores the configured values; Offline leaves them alone since
    /// nothing drains while offline.
    pub fn tuned_for(&self, class: TrafficClass, quality: ConnectionQuality) -> (u64, usize) {
        let (rate_factor, size_factor) = match (class, quality) {
            (_, ConnectionQuality::Good) | (_, ConnectionQuality::Offline) => (1.0, 1.0),
            (TrafficClass::Audio, ConnectionQuality::Fair) => (1.5, 0.75),
            (TrafficClass::Video, ConnectionQuality::Fair) => (2.0, 0.75),
            (TrafficClass::Audio, ConnectionQuality::Poor) => (2.0, 0.5),
            (TrafficClass::Video, ConnectionQuality::Poor) => (4.0, 0.5),
            (TrafficClass::Text, ConnectionQuality::Poor) => (1.0, 0.5),
            (TrafficClass::Text, ConnectionQuality::Fair) | (TrafficClass::Control, _) => {
                (1.0, 1.0)
            }
        };
        let rate = (self.rate_limit_ms as f64 * rate_factor).round() as u64;
        let size = ((self.max_size as f64 * size_factor).round() as usize).max(1);
        (rate, size)
    }
}

impl Default for PriorityQueueConfig {
    fn default() -> Self {
        Self::for_class(TrafficClass::Text)
    }
}

/// Settings of one inbound processing queue
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessingQueueConfig {
    pub mode: ProcessingMode,
    pub buffer_size_ms: u64,
    pub max_buffer_size: usize,
    pub chunk_timeout_ms: u64,
    pub enable_ordering: bool,
    pub ordering_window_ms: u64,
    pub initial_sequence: u64,
    pub ordering_expiry: OrderingExpiry,
}

impl ProcessingQueueConfig {
    pub fn for_class(class: TrafficClass) -> Self {
        let base = Self::default();
        match class {
            TrafficClass::Audio => Self {
                mode: ProcessingMode::Realtime,
                enable_ordering: true,
                ordering_window_ms: 100,
                ..base
            },
            TrafficClass::Video => Self {
                mode: ProcessingMode::Realtime,
                enable_ordering: false,
                ..base
            },
            TrafficClass::Text => Self {
                mode: ProcessingMode::Chunked,
                chunk_timeout_ms: 5_000,
                ..base
            },
            TrafficClass::Control => base,
        }
    }

    pub fn buffer_window(&self) -> Duration {
        Duration::from_millis(self.buffer_size_ms)
    }

    pub fn chunk_timeout(&self) -> Duration {
        Duration::from_millis(self.chunk_timeout_ms)
    }

    pub fn ordering_window(&self) -> Duration {
        Duration::from_millis(self.ordering_window_ms)
    }
}

impl Default for ProcessingQueueConfig {
    fn default() -> Self {
        Self {
            mode: ProcessingMode::Immediate,
            buffer_size_ms: 50,
            max_buffer_size: 10,
            chunk_timeout_ms: 5_000,
            enable_ordering: false,
            ordering_window_ms: 100,
            initial_sequence: 0,
            ordering_expiry: OrderingExpiry::ForceThrough,
        }
    }
}

/// One value per traffic class
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerClass<T> {
    pub audio: T,
    pub video: T,
    pub text: T,
    pub control: T,
}

impl<T> PerClass<T> {
    pub fn from_fn(mut f: impl FnMut(TrafficClass) -> T) -> Self {
        Self {
            audio: f(TrafficClass::Audio),
            video: f(TrafficClass::Video),
            text: f(TrafficClass::Text),
            control: f(TrafficClass::Control),
        }
    }

    pub fn get(&self, class: TrafficClass) -> &T {
        match class {
            TrafficClass::Audio => &self.audio,
            TrafficClass::Video => &self.video,
            TrafficClass::Text => &self.text,
            TrafficClass::Control => &self.control,
        }
    }

    pub fn get_mut(&mut self, class: TrafficClass) -> &mut T {
        match class {
            TrafficClass::Audio => &mut self.audio,
            TrafficClass::Video => &mut self.video,
            TrafficClass::Text => &mut self.text,
            TrafficClass::Control => &mut self.control,
        }
    }
}

impl Default for PerClass<PriorityQueueConfig> {
    fn default() -> Self {
        Self::from_fn(PriorityQueueConfig::for_class)
    }
}

impl Default for PerClass<ProcessingQueueConfig> {
    fn default() -> Self {
        Self::from_fn(ProcessingQueueConfig::for_class)
    }
}

/// Manager-wide configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManagerConfig {
    pub enabled: bool,
    pub debug_mode: bool,
    pub max_memory_mb: u64,
    pub health_check_interval_ms: u64,
    pub processing_interval_ms: u64,
    pub auto_tuning: bool,
    pub offline_buffer_size: usize,
    pub offline_flush_delay_ms: u64,
    pub health: HealthThresholds,
    pub outbound: PerClass<PriorityQueueConfig>,
    pub inbound: PerClass<ProcessingQueueConfig>,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            debug_mode: false,
            max_memory_mb: 50,
            health_check_interval_ms: 5_000,
            processing_interval_ms: 16,
            auto_tuning: true,
            offline_buffer_size: 100,
            offline_flush_delay_ms: 10,
            health: HealthThresholds::default(),
            outbound: PerClass::default(),
            inbound: PerClass::default(),
        }
    }
}

impl ManagerConfig {
    pub fn processing_interval(&self) -> Duration {
        Duration::from_millis(self.processing_interval_ms.max(1))
    }

    pub fn health_check_interval(&self) -> Duration {
        Duration::from_millis(self.health_check_interval_ms.max(1))
    }

    pub fn offline_flush_delay(&self) -> Duration {
        Duration::from_millis(self.offline_flush_delay_ms)
    }

    pub fn max_memory_bytes(&self) -> usize {
        (self.max_memory_mb as usize).saturating_mul(1024 * 1024)
    }

    /// Reject settings the queues cannot operate with
    pub fn validate(&self) -> Result<(), String> {
        use strum::IntoEnumIterator;

        if self.processing_interval_ms == 0 {
            return Err("processing_interval_ms must be greater than zero".to_string());
        }
        for class in TrafficClass::iter() {
            let out = self.outbound.get(class);
            if out.max_size == 0 {
                return Err(format!("outbound.{}.max_size must be at least 1", class));
            }
            if out.batch_size == 0 {
                return Err(format!("outbound.{}.batch_size must be at least 1", class));
            }
            if !(0.0..=1.0).contains(&out.compression_threshold) {
                return Err(format!(
                    "outbound.{}.compression_threshold must be between 0 and 1",
                    class
                ));
            }
            let inb = self.inbound.get(class);
            if inb.max_buffer_size == 0 {
                return Err(format!("inbound.{}.max_buffer_size must be at least 1", class));
            }
        }
        Ok(())
    }
}
