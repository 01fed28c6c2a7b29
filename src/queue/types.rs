//! Type definitions for the queue system
//!
//! Traffic classes, priorities, admission policies and the other small
//! value types shared by the outbound and inbound queues.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use strum_macros::{Display, EnumIter};

/// Unique identifier for a queued or processing message
pub type MessageId = u64;

/// Traffic class; each class owns one outbound and one inbound queue
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, EnumIter, Display,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum TrafficClass {
    Control,
    Audio,
    Text,
    Video,
}

impl TrafficClass {
    /// Priority assigned by convention to this class
    pub fn default_priority(self) -> Priority {
        match self {
            TrafficClass::Control => Priority::Urgent,
            TrafficClass::Audio => Priority::High,
            TrafficClass::Text => Priority::Medium,
            TrafficClass::Video => Priority::Low,
        }
    }
}

/// Drain priority; lower ordinal drains first
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, EnumIter, Display,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Priority {
    Urgent = 0,
    High = 1,
    Medium = 2,
    Low = 3,
}

impl Priority {
    /// All priorities in drain order
    pub const DRAIN_ORDER: [Priority; 4] = [
        Priority::Urgent,
        Priority::High,
        Priority::Medium,
        Priority::Low,
    ];

    /// All priorities in eviction order (lowest first)
    pub const EVICTION_ORDER: [Priority; 4] = [
        Priority::Low,
        Priority::Medium,
        Priority::High,
        Priority::Urgent,
    ];

    pub fn index(self) -> usize {
        self as usize
    }
}

/// Admission policy applied when a bounded queue is full
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum OverflowStrategy {
    DropOldest,
    DropNewest,
    ReplaceNewest,
    FailSend,
    Compress,
}

/// Which incoming priorities `ReplaceNewest` may replace within
///
/// Outside the scope the strategy behaves like `DropOldest`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ReplaceScope {
    /// Only LOW-priority (video-like) traffic keeps "latest frame wins"
    #[default]
    LowOnly,
    /// Any priority replaces the newest message of its own bucket
    AnyPriority,
}

impl ReplaceScope {
    pub fn covers(self, priority: Priority) -> bool {
        match self {
            ReplaceScope::LowOnly => priority == Priority::Low,
            ReplaceScope::AnyPriority => true,
        }
    }
}

/// Externally observed connection quality
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, Default)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ConnectionQuality {
    #[default]
    Good,
    Fair,
    Poor,
    Offline,
}

/// Derived health classification; ordered from best to worst
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Display, Default,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum HealthStatus {
    #[default]
    Healthy,
    Degraded,
    Critical,
}

/// Inbound processing mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ProcessingMode {
    Immediate,
    Buffered,
    Chunked,
    Realtime,
}

/// What happens to a held message whose ordering window expires
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum OrderingExpiry {
    /// Give up on the gap and deliver the held message in order
    #[default]
    ForceThrough,
    /// Drop the held message (counted as dropped)
    Discard,
}

/// Per-message send options
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct SendOptions {
    /// Force URGENT priority regardless of queue defaults
    pub urgent: bool,
    /// May be grouped with neighbours into a batch dispatch
    pub batchable: bool,
    /// May be thinned out by the `Compress` overflow strategy
    pub compressible: bool,
    /// Explicit priority override (ignored when `urgent`)
    #[serde(default)]
    pub priority: Option<Priority>,
    /// Per-message timeout override
    #[serde(default)]
    pub timeout: Option<Duration>,
}

impl SendOptions {
    pub fn urgent() -> Self {
        Self {
            urgent: true,
            ..Self::default()
        }
    }

    pub fn batchable() -> Self {
        Self {
            batchable: true,
            ..Self::default()
        }
    }

    /// Defaults used when a class sends without explicit options
    pub fn for_class(class: TrafficClass) -> Self {
        match class {
            TrafficClass::Audio => Self {
                batchable: true,
                compressible: true,
                ..Self::default()
            },
            TrafficClass::Text => Self::batchable(),
            TrafficClass::Control | TrafficClass::Video => Self::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;

    #[test]
    fn test_class_priority_convention() {
        assert_eq!(TrafficClass::Control.default_priority(), Priority::Urgent);
        assert_eq!(TrafficClass::Audio.default_priority(), Priority::High);
        assert_eq!(TrafficClass::Text.default_priority(), Priority::Medium);
        assert_eq!(TrafficClass::Video.default_priority(), Priority::Low);
    }

    #[test]
    fn test_priority_ordering() {
        assert!(Priority::Urgent < Priority::High);
        assert!(Priority::Medium < Priority::Low);
        let drained: Vec<Priority> = Priority::iter().collect();
        assert_eq!(drained, Priority::DRAIN_ORDER.to_vec());
    }

    #[test]
    fn test_health_worst_is_max() {
        let worst = [
            HealthStatus::Healthy,
            HealthStatus::Critical,
            HealthStatus::Degraded,
        ]
        .into_iter()
        .max()
        .unwrap();
        assert_eq!(worst, HealthStatus::Critical);
    }

    #[test]
    fn test_replace_scope() {
        assert!(ReplaceScope::LowOnly.covers(Priority::Low));
        assert!(!ReplaceScope::LowOnly.covers(Priority::High));
        assert!(ReplaceScope::AnyPriority.covers(Priority::Urgent));
    }

    #[test]
    fn test_display_names_match_wire_names() {
        assert_eq!(TrafficClass::Audio.to_string(), "audio");
        assert_eq!(OverflowStrategy::ReplaceNewest.to_string(), "replace_newest");
        assert_eq!(
            serde_json::to_string(&OverflowStrategy::DropOldest).unwrap(),
            "\"drop_oldest\""
        );
    }
}
