//! Inbound processing queue behaviour

#[cfg(test)]
mod tests {
    use crate::queue::api::{
        ConsumerError, MessageMetadata, OrderingExpiry, Payload, ProcessingMessage,
        ProcessingMode, ProcessingQueue, ProcessingQueueConfig, QueueMetrics, QueueNotice,
        Receipt, TrafficClass,
    };
    use std::sync::{Arc, Mutex};
    use std::time::Duration;
    use tokio::time::Instant;

    type Seen = Arc<Mutex<Vec<ProcessingMessage>>>;

    fn recording_queue(class: TrafficClass, config: ProcessingQueueConfig) -> (ProcessingQueue, Seen) {
        let seen: Seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let queue = ProcessingQueue::new(class, config, move |message: &ProcessingMessage| {
            sink.lock().unwrap().push(message.clone());
            Ok(None)
        });
        (queue, seen)
    }

    fn texts(seen: &Seen) -> Vec<String> {
        seen.lock()
            .unwrap()
            .iter()
            .map(|m| m.payload.as_text().unwrap_or_default().to_string())
            .collect()
    }

    fn sequences(seen: &Seen) -> Vec<u64> {
        seen.lock()
            .unwrap()
            .iter()
            .filter_map(|m| m.metadata.sequence_number)
            .collect()
    }

    fn assert_accounting(metrics: &QueueMetrics) {
        assert_eq!(
            metrics.queued(),
            metrics.processed()
                + metrics.dropped()
                + metrics.timed_out()
                + metrics.current_depth() as u64
        );
    }

    fn chunked() -> ProcessingQueueConfig {
        ProcessingQueueConfig::for_class(TrafficClass::Text)
    }

    fn ordered(expiry: OrderingExpiry) -> ProcessingQueueConfig {
        ProcessingQueueConfig {
            ordering_expiry: expiry,
            ..ProcessingQueueConfig::for_class(TrafficClass::Audio)
        }
    }

    #[test]
    fn test_chunks_reassembled_in_index_order() {
        let (mut queue, seen) = recording_queue(TrafficClass::Text, chunked());

        let c = queue.enqueue(Payload::from("c"), MessageMetadata::chunk("reply-1", 2, 3));
        let a = queue.enqueue(Payload::from("a"), MessageMetadata::chunk("reply-1", 0, 3));
        assert_eq!(c, Receipt::Buffered);
        assert_eq!(a, Receipt::Buffered);
        assert!(seen.lock().unwrap().is_empty());

        let b = queue.enqueue(Payload::from("b"), MessageMetadata::chunk("reply-1", 1, 3));
        assert_eq!(b, Receipt::Processed(None));
        assert_eq!(texts(&seen), vec!["abc"]);

        let delivered = seen.lock().unwrap()[0].metadata.clone();
        assert!(!delivered.is_partial);
        assert!(!delivered.is_chunk);
        assert_eq!(delivered.chunk_id.as_deref(), Some("reply-1"));

        assert_eq!(queue.metrics().processed(), 3);
        assert_eq!(queue.depth(), 0);
        assert_accounting(queue.metrics());
    }

    #[test]
    fn test_whole_messages_pass_through_chunked_mode() {
        let (mut queue, seen) = recording_queue(TrafficClass::Text, chunked());
        let receipt = queue.enqueue(Payload::from("hello"), MessageMetadata::default());
        assert_eq!(receipt, Receipt::Processed(None));
        assert_eq!(texts(&seen), vec!["hello"]);
    }

    #[test]
    fn test_malformed_chunk_processed_as_whole_message() {
        let (mut queue, seen) = recording_queue(TrafficClass::Text, chunked());
        let metadata = MessageMetadata {
            total_chunks: None,
            ..MessageMetadata::chunk("broken", 0, 2)
        };
        assert_eq!(
            queue.enqueue(Payload::from("whole"), metadata),
            Receipt::Processed(None)
        );
        assert_eq!(texts(&seen), vec!["whole"]);
    }

    #[test]
    fn test_duplicate_chunk_counted_as_dropped() {
        let (mut queue, seen) = recording_queue(TrafficClass::Text, chunked());
        queue.enqueue(Payload::from("a"), MessageMetadata::chunk("x", 0, 2));
        queue.enqueue(Payload::from("A"), MessageMetadata::chunk("x", 0, 2));
        queue.enqueue(Payload::from("b"), MessageMetadata::chunk("x", 1, 2));

        assert_eq!(texts(&seen), vec!["ab"]);
        assert_eq!(queue.metrics().dropped(), 1);
        assert_accounting(queue.metrics());
    }

    #[tokio::test(start_paused = true)]
    async fn test_chunk_timeout_delivers_partial_message() {
        let notices = Arc::new(Mutex::new(Vec::new()));
        let sink_notices = Arc::clone(&notices);
        let (queue, seen) = recording_queue(TrafficClass::Text, chunked());
        let mut queue = queue.with_notice_sink(Arc::new(move |notice| {
            sink_notices.lock().unwrap().push(notice)
        }));

        queue.enqueue(Payload::from("a"), MessageMetadata::chunk("slow", 0, 3));
        queue.enqueue(Payload::from("b"), MessageMetadata::chunk("slow", 1, 3));

        tokio::time::advance(Duration::from_millis(4_999)).await;
        assert_eq!(queue.tick(Instant::now()), 0);

        tokio::time::advance(Duration::from_millis(1)).await;
        assert_eq!(queue.tick(Instant::now()), 1);
        assert_eq!(texts(&seen), vec!["ab"]);
        assert!(seen.lock().unwrap()[0].metadata.is_partial);
        assert_accounting(queue.metrics());

        assert!(notices.lock().unwrap().iter().any(|notice| matches!(
            notice,
            QueueNotice::PartialAssembly {
                received: 2,
                expected: 3,
                ..
            }
        )));
    }

    #[test]
    fn test_out_of_order_sequences_delivered_in_order() {
        let (mut queue, seen) = recording_queue(TrafficClass::Audio, ordered(OrderingExpiry::ForceThrough));

        assert_eq!(
            queue.enqueue(Payload::from("0"), MessageMetadata::sequenced(0)),
            Receipt::Processed(None)
        );
        assert_eq!(
            queue.enqueue(Payload::from("2"), MessageMetadata::sequenced(2)),
            Receipt::Buffered
        );
        assert_eq!(
            queue.enqueue(Payload::from("3"), MessageMetadata::sequenced(3)),
            Receipt::Buffered
        );
        queue.enqueue(Payload::from("1"), MessageMetadata::sequenced(1));
        queue.enqueue(Payload::from("4"), MessageMetadata::sequenced(4));

        assert_eq!(sequences(&seen), vec![0, 1, 2, 3, 4]);
        assert_eq!(queue.depth(), 0);
        assert_accounting(queue.metrics());
    }

    #[test]
    fn test_stale_sequence_processed_with_notice() {
        let notices = Arc::new(Mutex::new(Vec::new()));
        let sink_notices = Arc::clone(&notices);
        let (queue, seen) = recording_queue(TrafficClass::Audio, ordered(OrderingExpiry::ForceThrough));
        let mut queue = queue.with_notice_sink(Arc::new(move |notice| {
            sink_notices.lock().unwrap().push(notice)
        }));

        queue.enqueue(Payload::from("0"), MessageMetadata::sequenced(0));
        queue.enqueue(Payload::from("1"), MessageMetadata::sequenced(1));
        let late = queue.enqueue(Payload::from("0 again"), MessageMetadata::sequenced(0));

        assert_eq!(late, Receipt::Processed(None));
        assert_eq!(sequences(&seen), vec![0, 1, 0]);
        assert!(matches!(
            notices.lock().unwrap().as_slice(),
            [QueueNotice::StaleSequence {
                sequence: 0,
                expected: 2,
                ..
            }]
        ));
    }

    #[test]
    fn test_duplicate_held_sequence_discarded() {
        let (mut queue, _seen) = recording_queue(TrafficClass::Audio, ordered(OrderingExpiry::ForceThrough));
        queue.enqueue(Payload::from("2"), MessageMetadata::sequenced(2));
        let duplicate = queue.enqueue(Payload::from("2"), MessageMetadata::sequenced(2));

        assert_eq!(duplicate, Receipt::Failed);
        assert_eq!(queue.metrics().dropped(), 1);
        assert_accounting(queue.metrics());
    }

    #[tokio::test(start_paused = true)]
    async fn test_ordering_window_forces_gap_through() {
        let (mut queue, seen) = recording_queue(TrafficClass::Audio, ordered(OrderingExpiry::ForceThrough));
        queue.enqueue(Payload::from("0"), MessageMetadata::sequenced(0));
        queue.enqueue(Payload::from("2"), MessageMetadata::sequenced(2));

        tokio::time::advance(Duration::from_millis(100)).await;
        assert_eq!(queue.tick(Instant::now()), 1);
        assert_eq!(sequences(&seen), vec![0, 2]);
        assert_eq!(queue.snapshot().next_expected_sequence, Some(3));

        // the skipped sequence is now stale but still delivered
        queue.enqueue(Payload::from("1"), MessageMetadata::sequenced(1));
        assert_eq!(sequences(&seen), vec![0, 2, 1]);
        assert_accounting(queue.metrics());
    }

    #[tokio::test(start_paused = true)]
    async fn test_ordering_window_discard_drops_held_message() {
        let (mut queue, seen) = recording_queue(TrafficClass::Audio, ordered(OrderingExpiry::Discard));
        queue.enqueue(Payload::from("0"), MessageMetadata::sequenced(0));
        queue.enqueue(Payload::from("2"), MessageMetadata::sequenced(2));

        tokio::time::advance(Duration::from_millis(100)).await;
        assert_eq!(queue.tick(Instant::now()), 0);
        assert_eq!(sequences(&seen), vec![0]);
        assert_eq!(queue.metrics().dropped(), 1);
        assert_eq!(queue.depth(), 0);
        assert_accounting(queue.metrics());
    }

    #[tokio::test(start_paused = true)]
    async fn test_buffered_mode_flushes_after_window() {
        let config = ProcessingQueueConfig {
            mode: ProcessingMode::Buffered,
            buffer_size_ms: 50,
            max_buffer_size: 10,
            ..ProcessingQueueConfig::default()
        };
        let (mut queue, seen) = recording_queue(TrafficClass::Control, config);
        for text in ["a", "b", "c"] {
            assert_eq!(queue.enqueue(Payload::from(text), MessageMetadata::default()), Receipt::Buffered);
        }

        tokio::time::advance(Duration::from_millis(49)).await;
        assert_eq!(queue.tick(Instant::now()), 0);

        tokio::time::advance(Duration::from_millis(1)).await;
        assert_eq!(queue.tick(Instant::now()), 3);
        assert_eq!(texts(&seen), vec!["a", "b", "c"]);
        assert_accounting(queue.metrics());
    }

    #[test]
    fn test_full_buffer_flushes_early() {
        let config = ProcessingQueueConfig {
            mode: ProcessingMode::Buffered,
            max_buffer_size: 2,
            ..ProcessingQueueConfig::default()
        };
        let (mut queue, seen) = recording_queue(TrafficClass::Control, config);
        queue.enqueue(Payload::from("a"), MessageMetadata::default());
        assert!(seen.lock().unwrap().is_empty());

        queue.enqueue(Payload::from("b"), MessageMetadata::default());
        assert_eq!(texts(&seen), vec!["a", "b"]);
        assert!(queue.next_deadline().is_none());
    }

    #[test]
    fn test_consumer_failure_counts_as_dropped() {
        let mut queue = ProcessingQueue::new(
            TrafficClass::Control,
            ProcessingQueueConfig::default(),
            |_: &ProcessingMessage| Err(ConsumerError::new("decoder rejected message")),
        );

        assert_eq!(
            queue.enqueue(Payload::from("bad"), MessageMetadata::default()),
            Receipt::Failed
        );
        assert_eq!(queue.metrics().failed(), 1);
        assert_eq!(queue.metrics().dropped(), 1);
        assert_accounting(queue.metrics());
    }

    #[test]
    fn test_flush_releases_everything_held() {
        let (mut queue, seen) = recording_queue(TrafficClass::Audio, ordered(OrderingExpiry::ForceThrough));
        queue.enqueue(Payload::from("5"), MessageMetadata::sequenced(5));
        queue.enqueue(Payload::from("3"), MessageMetadata::sequenced(3));

        assert_eq!(queue.flush(), 2);
        assert_eq!(sequences(&seen), vec![3, 5]);
        assert_eq!(queue.depth(), 0);
        assert!(queue.next_deadline().is_none());
    }
}
