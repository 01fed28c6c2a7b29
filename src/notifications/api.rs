//! Public API for the notification system
//!
//! External modules should import from here rather than directly from
//! internal modules. There is no global instance: the queue manager owns a
//! shared [`NotificationManager`] and exposes subscribe/unsubscribe.

// Core event types and enums
pub use crate::notifications::event::{
    AudioEvent, AudioEventType, ConnectionEvent, ConnectionEventType, Event, EventFilter,
    HealthEvent, HealthEventType, QueueEvent, QueueEventType, SystemEvent, SystemEventType,
};

// Manager and utilities
pub use crate::notifications::error::NotificationError;
pub use crate::notifications::manager::{EventReceiver, NotificationManager};
pub use crate::notifications::statistics::SubscriberStatistics;

use std::sync::{Arc, Mutex};

/// Shared handle to a notification manager
pub type SharedNotifications = Arc<Mutex<NotificationManager>>;

pub fn shared() -> SharedNotifications {
    Arc::new(Mutex::new(NotificationManager::new()))
}

/// Publish without caring whether every subscriber is still listening
pub fn publish_quietly(notifications: &SharedNotifications, event: Event) {
    if let Ok(mut manager) = notifications.lock() {
        if let Err(err) = manager.publish(event) {
            log::trace!("{}", err);
        }
    }
}
