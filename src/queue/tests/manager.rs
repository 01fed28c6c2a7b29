//! MessageQueueManager orchestration

#[cfg(test)]
mod tests {
    use crate::notifications::api::{
        ConnectionEventType, Event, EventFilter, HealthEventType, SystemEventType,
    };
    use crate::queue::api::{
        ConnectionQuality, HealthStatus, ManagerConfig, MessageMetadata, MessageQueueManager,
        OverflowStrategy, Payload, QueueError, Receipt, SendOptions, TrafficClass,
    };
    use crate::transport::TransportError;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    type Sent = Arc<Mutex<Vec<(TrafficClass, String)>>>;

    fn quiet_config() -> ManagerConfig {
        ManagerConfig {
            offline_flush_delay_ms: 0,
            ..ManagerConfig::default()
        }
    }

    fn recording_manager(config: ManagerConfig) -> (Arc<MessageQueueManager>, Sent) {
        let manager = Arc::new(MessageQueueManager::new(config));
        let sent: Sent = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&sent);
        manager.set_send_handler(move |class, dispatch| {
            let mut sink = sink.lock().unwrap();
            for message in dispatch.messages() {
                let text = message.payload.as_text().unwrap_or_default().to_string();
                sink.push((class, text));
            }
            Ok(())
        });
        (manager, sent)
    }

    fn drain_events(rx: &mut tokio::sync::mpsc::UnboundedReceiver<Event>) -> Vec<Event> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    #[test]
    fn test_disabled_manager_is_passthrough() {
        let config = ManagerConfig {
            enabled: false,
            ..quiet_config()
        };
        let (manager, sent) = recording_manager(config);

        assert!(manager.send(TrafficClass::Text, Payload::from("hi"), SendOptions::default()));
        assert_eq!(
            sent.lock().unwrap().as_slice(),
            &[(TrafficClass::Text, "hi".to_string())]
        );
        assert_eq!(manager.queue_depth(TrafficClass::Text), 0);

        manager.set_receive_handler(|_, message| Ok(Some(message.payload.clone())));
        let receipt = manager.receive(
            TrafficClass::Audio,
            Payload::from("pcm"),
            MessageMetadata::sequenced(9),
        );
        assert_eq!(receipt, Receipt::Processed(Some(Payload::from("pcm"))));
        assert_eq!(manager.inbound_depth(TrafficClass::Audio), 0);
        assert_eq!(manager.status().metrics.total_queued, 0);
    }

    #[test]
    fn test_tick_drains_control_before_text() {
        let (manager, sent) = recording_manager(quiet_config());
        assert!(manager.send(TrafficClass::Text, Payload::from("chat"), SendOptions::default()));
        assert!(manager.send(TrafficClass::Control, Payload::from("stop"), SendOptions::default()));
        assert_eq!(manager.queue_depth(TrafficClass::Text), 1);

        let summary = manager.process_tick();
        assert_eq!(summary.dispatched, 2);
        let order: Vec<TrafficClass> = sent.lock().unwrap().iter().map(|(c, _)| *c).collect();
        assert_eq!(order, vec![TrafficClass::Control, TrafficClass::Text]);
        assert_eq!(manager.transmission().sent_messages, 2);
    }

    #[test]
    fn test_tick_without_send_handler_keeps_messages_queued() {
        let manager = MessageQueueManager::new(quiet_config());
        manager.send(TrafficClass::Text, Payload::from("later"), SendOptions::default());
        assert_eq!(manager.process_tick().dispatched, 0);
        assert_eq!(manager.queue_depth(TrafficClass::Text), 1);
    }

    #[test]
    fn test_offline_sends_buffered_and_replayed_in_order() {
        let (manager, sent) = recording_manager(quiet_config());
        manager.set_connection_state(false, ConnectionQuality::Offline);

        assert!(manager.send(TrafficClass::Text, Payload::from("one"), SendOptions::batchable()));
        assert!(manager.send(TrafficClass::Text, Payload::from("two"), SendOptions::batchable()));
        assert!(!manager.send(TrafficClass::Control, Payload::from("ping"), SendOptions::default()));
        assert_eq!(manager.offline_len(), 2);
        assert_eq!(manager.process_tick().dispatched, 0);

        manager.set_connection_state(true, ConnectionQuality::Good);
        assert_eq!(manager.offline_len(), 0);
        assert_eq!(manager.queue_depth(TrafficClass::Text), 2);

        manager.process_tick();
        let texts: Vec<String> = sent.lock().unwrap().iter().map(|(_, t)| t.clone()).collect();
        assert_eq!(texts, vec!["one", "two"]);

        let stats = manager.transmission();
        assert_eq!(stats.offline_buffered, 2);
        assert_eq!(stats.offline_replayed, 2);
        assert_eq!(stats.rejected, 1);
    }

    #[test]
    fn test_poor_connection_retunes_media_queues() {
        let (manager, _sent) = recording_manager(quiet_config());
        manager.set_connection_state(true, ConnectionQuality::Poor);

        let status = manager.status();
        let audio = status.outbound(TrafficClass::Audio).unwrap();
        assert_eq!((audio.rate_limit_ms, audio.max_size), (40, 25));
        let video = status.outbound(TrafficClass::Video).unwrap();
        assert_eq!((video.rate_limit_ms, video.max_size), (400, 5));
        let text = status.outbound(TrafficClass::Text).unwrap();
        assert_eq!((text.rate_limit_ms, text.max_size), (50, 50));
        let control = status.outbound(TrafficClass::Control).unwrap();
        assert_eq!((control.rate_limit_ms, control.max_size), (0, 20));
        assert_eq!(manager.tuned_for(), ConnectionQuality::Poor);

        manager.set_connection_state(true, ConnectionQuality::Good);
        let audio = manager.status().outbound(TrafficClass::Audio).cloned().unwrap();
        assert_eq!((audio.rate_limit_ms, audio.max_size), (20, 50));
    }

    #[test]
    fn test_auto_tuning_disabled_leaves_queues_alone() {
        let config = ManagerConfig {
            auto_tuning: false,
            ..quiet_config()
        };
        let (manager, _sent) = recording_manager(config);
        manager.set_connection_state(true, ConnectionQuality::Poor);

        let status = manager.status();
        let audio = status.outbound(TrafficClass::Audio).unwrap();
        assert_eq!((audio.rate_limit_ms, audio.max_size), (20, 50));
        assert_eq!(status.connection.quality, ConnectionQuality::Poor);
    }

    #[test]
    fn test_send_error_applies_conservative_settings() {
        let manager = Arc::new(MessageQueueManager::new(quiet_config()));
        let mut events = manager.subscribe("test", EventFilter::ConnectionOnly, "test:send-error");
        manager.set_send_handler(|_, _| Err(TransportError::Send("connection reset".into())));

        manager.send(TrafficClass::Text, Payload::from("x"), SendOptions::default());
        assert_eq!(manager.process_tick().dispatched, 0);

        assert_eq!(manager.transmission().send_errors, 1);
        assert_eq!(manager.tuned_for(), ConnectionQuality::Poor);
        // requeued for retry
        assert_eq!(manager.queue_depth(TrafficClass::Text), 1);

        let kinds: Vec<ConnectionEventType> = drain_events(&mut events)
            .into_iter()
            .filter_map(|event| match event {
                Event::Connection(e) => Some(e.event_type),
                _ => None,
            })
            .collect();
        assert_eq!(
            kinds,
            vec![ConnectionEventType::SendFailed, ConnectionEventType::Retuned]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_conservative_settings_lifted_after_successful_send() {
        let manager = Arc::new(MessageQueueManager::new(quiet_config()));
        let healthy = Arc::new(std::sync::atomic::AtomicBool::new(false));
        let link = Arc::clone(&healthy);
        manager.set_send_handler(move |_, _| {
            if link.load(std::sync::atomic::Ordering::SeqCst) {
                Ok(())
            } else {
                Err(TransportError::Send("connection reset".into()))
            }
        });

        manager.send(TrafficClass::Text, Payload::from("x"), SendOptions::default());
        manager.process_tick();
        assert_eq!(manager.tuned_for(), ConnectionQuality::Poor);

        healthy.store(true, std::sync::atomic::Ordering::SeqCst);
        tokio::time::advance(Duration::from_millis(100)).await;
        assert_eq!(manager.process_tick().dispatched, 1);
        assert_eq!(manager.tuned_for(), ConnectionQuality::Good);
        assert_eq!(manager.connection().quality, ConnectionQuality::Good);
    }

    #[test]
    fn test_memory_pressure_reported_once_per_episode() {
        let config = ManagerConfig {
            max_memory_mb: 1,
            ..quiet_config()
        };
        let manager = MessageQueueManager::new(config);
        let mut events = manager.subscribe("memory", EventFilter::HealthOnly, "test:memory");
        let pressure_events = |events: Vec<Event>| {
            events
                .into_iter()
                .filter(|event| matches!(
                    event,
                    Event::Health(e) if e.event_type == HealthEventType::MemoryPressure
                ))
                .count()
        };

        assert!(manager.send(
            TrafficClass::Text,
            Payload::from(vec![0u8; 900 * 1024]),
            SendOptions::default(),
        ));

        assert_eq!(manager.check_health(), HealthStatus::Degraded);
        assert_eq!(pressure_events(drain_events(&mut events)), 1);
        assert_eq!(manager.check_health(), HealthStatus::Degraded);
        assert_eq!(pressure_events(drain_events(&mut events)), 0);

        manager.clear_queue(TrafficClass::Text);
        manager.check_health();
        assert!(manager.send(
            TrafficClass::Text,
            Payload::from(vec![0u8; 900 * 1024]),
            SendOptions::default(),
        ));
        manager.check_health();
        assert_eq!(pressure_events(drain_events(&mut events)), 1);
    }

    #[test]
    fn test_panicking_consumer_leaves_queue_usable() {
        let manager = MessageQueueManager::new(quiet_config());
        manager.set_receive_handler(|_, message| {
            if message.payload.as_text() == Some("boom") {
                panic!("consumer bug");
            }
            Ok(None)
        });

        let panicked = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            manager.receive(TrafficClass::Control, Payload::from("boom"), MessageMetadata::default())
        }));
        assert!(panicked.is_err());

        let receipt = manager.receive(TrafficClass::Control, Payload::from("fine"), MessageMetadata::default());
        assert_eq!(receipt, Receipt::Processed(None));
        assert_eq!(manager.inbound_depth(TrafficClass::Control), 0);
    }

    #[test]
    fn test_drop_rate_makes_health_critical_until_reset() {
        let mut config = quiet_config();
        config.outbound.text.max_size = 10;
        config.outbound.text.overflow_strategy = OverflowStrategy::FailSend;
        let manager = MessageQueueManager::new(config);
        let mut events = manager.subscribe("health", EventFilter::HealthOnly, "test:health");

        let accepted = (0..15)
            .filter(|n| {
                manager.send(
                    TrafficClass::Text,
                    Payload::from(n.to_string()),
                    SendOptions::default(),
                )
            })
            .count();
        assert_eq!(accepted, 10);

        assert_eq!(manager.check_health(), HealthStatus::Critical);
        assert!(drain_events(&mut events).iter().any(|event| matches!(
            event,
            Event::Health(e) if e.event_type == HealthEventType::Changed
                && e.current == HealthStatus::Critical
        )));

        // unchanged status is not reported again
        assert_eq!(manager.check_health(), HealthStatus::Critical);
        assert!(drain_events(&mut events).is_empty());

        manager.reset_metrics();
        assert_eq!(manager.check_health(), HealthStatus::Healthy);
        assert_eq!(manager.queue_depth(TrafficClass::Text), 10);
    }

    #[test]
    fn test_receive_routes_to_class_queue() {
        let (manager, _sent) = recording_manager(quiet_config());
        let received = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&received);
        manager.set_receive_handler(move |class, message| {
            sink.lock()
                .unwrap()
                .push((class, message.payload.as_text().unwrap_or_default().to_string()));
            Ok(None)
        });

        manager.receive(TrafficClass::Text, Payload::from("Hel"), MessageMetadata::chunk("r", 0, 2));
        manager.receive(TrafficClass::Text, Payload::from("lo"), MessageMetadata::chunk("r", 1, 2));
        manager.receive(TrafficClass::Audio, Payload::from("a1"), MessageMetadata::sequenced(1));
        assert_eq!(manager.inbound_depth(TrafficClass::Audio), 1);

        assert_eq!(
            received.lock().unwrap().as_slice(),
            &[(TrafficClass::Text, "Hello".to_string())]
        );
        assert_eq!(manager.transmission().received, 3);
    }

    #[test]
    fn test_receive_without_handler_fails_message() {
        let manager = MessageQueueManager::new(quiet_config());
        let receipt = manager.receive(TrafficClass::Control, Payload::from("x"), MessageMetadata::default());
        assert_eq!(receipt, Receipt::Failed);

        let status = manager.status();
        let control = status.inbound(TrafficClass::Control).unwrap();
        assert_eq!(control.metrics.dropped, 1);
    }

    #[test]
    fn test_replaced_handler_id_cannot_clear_new_handler() {
        let manager = MessageQueueManager::new(quiet_config());
        let first = manager.set_send_handler(|_, _| Ok(()));
        let second = manager.set_send_handler(|_, _| Ok(()));

        assert!(!manager.clear_send_handler(first));
        assert!(manager.clear_send_handler(second));
    }

    #[test]
    fn test_start_needs_runtime_and_enabled_manager() {
        let manager = Arc::new(MessageQueueManager::new(quiet_config()));
        assert!(matches!(manager.start(), Err(QueueError::NoRuntime)));

        let disabled = Arc::new(MessageQueueManager::new(ManagerConfig {
            enabled: false,
            ..quiet_config()
        }));
        assert!(matches!(disabled.start(), Err(QueueError::Disabled)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_processing_loop_drains_and_destroy_stops() {
        let (manager, sent) = recording_manager(quiet_config());
        let mut events = manager.subscribe("system", EventFilter::SystemOnly, "test:loops");
        manager.start().unwrap();
        assert!(manager.is_running());

        manager.send(TrafficClass::Text, Payload::from("queued"), SendOptions::default());
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(sent.lock().unwrap().len(), 1);

        manager.send(TrafficClass::Video, Payload::from("frame"), SendOptions::default());
        manager.destroy().await;
        assert!(!manager.is_running());
        assert_eq!(manager.queue_depth(TrafficClass::Video), 0);

        let kinds: Vec<SystemEventType> = drain_events(&mut events)
            .into_iter()
            .filter_map(|event| match event {
                Event::System(e) => Some(e.event_type),
                _ => None,
            })
            .collect();
        assert_eq!(kinds, vec![SystemEventType::Startup, SystemEventType::Shutdown]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_offline_replay_spaced_by_flush_delay() {
        let config = ManagerConfig {
            offline_flush_delay_ms: 10,
            ..ManagerConfig::default()
        };
        let (manager, _sent) = recording_manager(config);
        manager.set_connection_state(false, ConnectionQuality::Offline);
        for text in ["a", "b", "c"] {
            manager.send(TrafficClass::Text, Payload::from(text), SendOptions::default());
        }

        manager.set_connection_state(true, ConnectionQuality::Good);
        tokio::time::sleep(Duration::from_millis(5)).await;
        assert_eq!(manager.queue_depth(TrafficClass::Text), 1);

        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(manager.queue_depth(TrafficClass::Text), 3);
        assert_eq!(manager.offline_len(), 0);
    }
}
