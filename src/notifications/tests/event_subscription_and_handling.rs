//! Tests for event subscription and handling framework

use std::time::Duration;
use tokio::time::timeout;

use crate::notifications::api::{
    AudioEvent, AudioEventType, ConnectionEvent, ConnectionEventType, Event, EventFilter,
    HealthEvent, NotificationManager, SystemEvent, SystemEventType,
};
use crate::queue::api::{ConnectionQuality, HealthStatus};

#[tokio::test]
async fn test_event_subscription_filtering() {
    let mut notification_manager = NotificationManager::new();

    let mut receiver = notification_manager.subscribe(
        "test-subscriber-1".to_string(),
        EventFilter::AudioOnly,
        "test-source".to_string(),
    );

    notification_manager
        .publish(Event::Audio(AudioEvent::with_threshold(
            AudioEventType::ThresholdRaised,
            250.0,
        )))
        .unwrap();

    let event_result = timeout(Duration::from_millis(100), receiver.recv()).await;
    assert!(matches!(
        event_result,
        Ok(Some(Event::Audio(AudioEvent {
            threshold_ms: Some(t),
            ..
        }))) if t == 250.0
    ));

    // A system event does not match the audio filter
    notification_manager
        .publish(Event::System(SystemEvent::new(SystemEventType::Startup)))
        .unwrap();

    let timeout_result = timeout(Duration::from_millis(50), receiver.recv()).await;
    assert!(timeout_result.is_err());
}

#[tokio::test]
async fn test_events_arrive_in_publish_order() {
    let mut notification_manager = NotificationManager::new();
    let mut receiver = notification_manager.subscribe(
        "ordered".to_string(),
        EventFilter::HealthAndConnection,
        "test".to_string(),
    );

    notification_manager
        .publish(Event::Connection(ConnectionEvent::new(
            ConnectionEventType::Offline,
            false,
            ConnectionQuality::Offline,
        )))
        .unwrap();
    notification_manager
        .publish(Event::Health(HealthEvent::changed(
            HealthStatus::Healthy,
            HealthStatus::Degraded,
        )))
        .unwrap();

    assert!(matches!(
        receiver.recv().await,
        Some(Event::Connection(ConnectionEvent {
            event_type: ConnectionEventType::Offline,
            ..
        }))
    ));
    assert!(matches!(
        receiver.recv().await,
        Some(Event::Health(HealthEvent {
            current: HealthStatus::Degraded,
            ..
        }))
    ));
}

#[tokio::test]
async fn test_resubscribe_replaces_previous_channel() {
    let mut notification_manager = NotificationManager::new();
    let mut first = notification_manager.subscribe(
        "dup".to_string(),
        EventFilter::All,
        "first".to_string(),
    );
    let mut second = notification_manager.subscribe(
        "dup".to_string(),
        EventFilter::All,
        "second".to_string(),
    );
    assert_eq!(notification_manager.subscriber_count(), 1);

    notification_manager
        .publish(Event::System(SystemEvent::new(SystemEventType::Shutdown)))
        .unwrap();

    assert!(second.recv().await.is_some());
    // The replaced sender was dropped, so the first channel is closed
    assert!(first.recv().await.is_none());
}
