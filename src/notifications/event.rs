//! Event types for the notification system

use std::time::SystemTime;

use crate::queue::api::{ConnectionQuality, HealthStatus, QueueNotice, TrafficClass};

#[derive(Clone, Debug, PartialEq)]
pub enum QueueEventType {
    Overflow,
    BufferFull,
    Error,
    Expired,
    PartialAssembly,
    StaleSequence,
    Cleared,
}

#[derive(Clone, Debug, PartialEq)]
pub enum HealthEventType {
    Changed,
    MemoryPressure,
}

#[derive(Clone, Debug, PartialEq)]
pub enum ConnectionEventType {
    Online,
    Offline,
    QualityChanged,
    Retuned,
    OfflineFlushed,
    SendFailed,
}

#[derive(Clone, Debug, PartialEq)]
pub enum AudioEventType {
    PlaybackStarted,
    Underrun,
    ThresholdRaised,
    PlaybackStopped,
    CaptureError,
}

#[derive(Clone, Debug, PartialEq)]
pub enum SystemEventType {
    Startup,
    Shutdown,
}

#[derive(Clone, Debug)]
pub struct QueueEvent {
    pub event_type: QueueEventType,
    pub timestamp: SystemTime,
    pub queue_id: String,
    pub class: Option<TrafficClass>,
    pub count: Option<usize>,
    pub message: Option<String>,
}

impl QueueEvent {
    pub fn new(event_type: QueueEventType, queue_id: String) -> Self {
        Self {
            event_type,
            timestamp: SystemTime::now(),
            queue_id,
            class: None,
            count: None,
            message: None,
        }
    }

    pub fn with_count(event_type: QueueEventType, queue_id: String, count: usize) -> Self {
        Self {
            count: Some(count),
            ..Self::new(event_type, queue_id)
        }
    }

    pub fn with_message(event_type: QueueEventType, queue_id: String, message: String) -> Self {
        Self {
            message: Some(message),
            ..Self::new(event_type, queue_id)
        }
    }
}

impl From<QueueNotice> for QueueEvent {
    fn from(notice: QueueNotice) -> Self {
        match notice {
            QueueNotice::Overflow {
                queue,
                strategy,
                dropped,
                depth,
            } => QueueEvent::with_message(
                QueueEventType::Overflow,
                queue,
                format!("{} dropped {} (depth {})", strategy, dropped, depth),
            )
            .counted(dropped),
            QueueNotice::BufferFull { queue, depth } => {
                QueueEvent::with_count(QueueEventType::BufferFull, queue, depth)
            }
            QueueNotice::Error {
                queue,
                class,
                message,
            } => {
                let mut event = QueueEvent::with_message(QueueEventType::Error, queue, message);
                event.class = class;
                event
            }
            QueueNotice::Expired { queue, count } => {
                QueueEvent::with_count(QueueEventType::Expired, queue, count)
            }
            QueueNotice::PartialAssembly {
                queue,
                chunk_id,
                received,
                expected,
            } => QueueEvent::with_message(
                QueueEventType::PartialAssembly,
                queue,
                format!("{}: {}/{} chunks", chunk_id, received, expected),
            )
            .counted(received),
            QueueNotice::StaleSequence {
                queue,
                sequence,
                expected,
            } => QueueEvent::with_message(
                QueueEventType::StaleSequence,
                queue,
                format!("sequence {} arrived while expecting {}", sequence, expected),
            ),
        }
    }
}

impl QueueEvent {
    fn counted(mut self, count: usize) -> Self {
        self.count = Some(count);
        self
    }
}

#[derive(Clone, Debug)]
pub struct HealthEvent {
    pub event_type: HealthEventType,
    pub timestamp: SystemTime,
    pub previous: HealthStatus,
    pub current: HealthStatus,
    pub message: Option<String>,
}

impl HealthEvent {
    pub fn changed(previous: HealthStatus, current: HealthStatus) -> Self {
        Self {
            event_type: HealthEventType::Changed,
            timestamp: SystemTime::now(),
            previous,
            current,
            message: None,
        }
    }

    pub fn memory_pressure(current: HealthStatus, message: String) -> Self {
        Self {
            event_type: HealthEventType::MemoryPressure,
            timestamp: SystemTime::now(),
            previous: current,
            current,
            message: Some(message),
        }
    }
}

#[derive(Clone, Debug)]
pub struct ConnectionEvent {
    pub event_type: ConnectionEventType,
    pub timestamp: SystemTime,
    pub connected: bool,
    pub quality: ConnectionQuality,
    pub message: Option<String>,
}

impl ConnectionEvent {
    pub fn new(event_type: ConnectionEventType, connected: bool, quality: ConnectionQuality) -> Self {
        Self {
            event_type,
            timestamp: SystemTime::now(),
            connected,
            quality,
            message: None,
        }
    }

    pub fn with_message(
        event_type: ConnectionEventType,
        connected: bool,
        quality: ConnectionQuality,
        message: String,
    ) -> Self {
        Self {
            message: Some(message),
            ..Self::new(event_type, connected, quality)
        }
    }
}

#[derive(Clone, Debug)]
pub struct AudioEvent {
    pub event_type: AudioEventType,
    pub timestamp: SystemTime,
    pub threshold_ms: Option<f64>,
    pub message: Option<String>,
}

impl AudioEvent {
    pub fn new(event_type: AudioEventType) -> Self {
        Self {
            event_type,
            timestamp: SystemTime::now(),
            threshold_ms: None,
            message: None,
        }
    }

    pub fn with_threshold(event_type: AudioEventType, threshold_ms: f64) -> Self {
        Self {
            threshold_ms: Some(threshold_ms),
            ..Self::new(event_type)
        }
    }

    pub fn with_message(event_type: AudioEventType, message: String) -> Self {
        Self {
            message: Some(message),
            ..Self::new(event_type)
        }
    }
}

#[derive(Clone, Debug)]
pub struct SystemEvent {
    pub event_type: SystemEventType,
    pub timestamp: SystemTime,
    pub message: Option<String>,
}

impl SystemEvent {
    pub fn new(event_type: SystemEventType) -> Self {
        Self {
            event_type,
            timestamp: SystemTime::now(),
            message: None,
        }
    }

    pub fn with_message(event_type: SystemEventType, message: String) -> Self {
        Self {
            event_type,
            timestamp: SystemTime::now(),
            message: Some(message),
        }
    }
}

/// Main event enum that wraps all event types
#[derive(Clone, Debug)]
pub enum Event {
    Queue(QueueEvent),
    Health(HealthEvent),
    Connection(ConnectionEvent),
    Audio(AudioEvent),
    System(SystemEvent),
}

impl Event {
    pub fn kind(&self) -> &'static str {
        match self {
            Event::Queue(_) => "Queue",
            Event::Health(_) => "Health",
            Event::Connection(_) => "Connection",
            Event::Audio(_) => "Audio",
            Event::System(_) => "System",
        }
    }
}

/// Event filter for subscribers
#[derive(Clone, Debug, PartialEq)]
pub enum EventFilter {
    QueueOnly,
    HealthOnly,
    ConnectionOnly,
    AudioOnly,
    SystemOnly,
    HealthAndConnection,
    All,
}

impl EventFilter {
    /// Check if an event matches this filter
    pub fn accepts(&self, event: &Event) -> bool {
        matches!(
            (self, event),
            (EventFilter::QueueOnly, Event::Queue(_))
                | (EventFilter::HealthOnly, Event::Health(_))
                | (EventFilter::ConnectionOnly, Event::Connection(_))
                | (EventFilter::AudioOnly, Event::Audio(_))
                | (EventFilter::SystemOnly, Event::System(_))
                | (EventFilter::HealthAndConnection, Event::Health(_))
                | (EventFilter::HealthAndConnection, Event::Connection(_))
                | (EventFilter::All, _)
        )
    }
}
