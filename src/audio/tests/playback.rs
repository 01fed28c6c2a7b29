//! Playback state machine and adaptive buffering

#[cfg(test)]
mod tests {
    use crate::audio::api::{encode_base64, AudioConfig, AudioError, PlaybackSession, PlaybackState};
    use crate::notifications::api::{shared, AudioEventType, Event, EventFilter, EventReceiver};
    use std::time::Duration;
    use tokio::time::Instant;

    // One sample per millisecond keeps the arithmetic readable
    fn test_config() -> AudioConfig {
        AudioConfig {
            playback_sample_rate: 1_000,
            ring_seconds: 1,
            chunk_ms: 10,
            initial_threshold_ms: 30.0,
            min_threshold_ms: 20.0,
            max_threshold_ms: 60.0,
            noise_floor_ms: 50.0,
            threshold_step_ms: 10.0,
            relax_after_frames: 3,
            relax_step_ms: 5.0,
            ..AudioConfig::default()
        }
    }

    fn observed_session() -> (PlaybackSession, EventReceiver) {
        let notifications = shared();
        let rx = notifications.lock().unwrap().subscribe(
            "test".to_string(),
            EventFilter::AudioOnly,
            "playback-test".to_string(),
        );
        (PlaybackSession::new(test_config()).with_notifications(notifications), rx)
    }

    fn audio_events(rx: &mut EventReceiver) -> Vec<AudioEventType> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            if let Event::Audio(audio) = event {
                events.push(audio.event_type);
            }
        }
        events
    }

    #[tokio::test(start_paused = true)]
    async fn test_buffers_until_threshold_then_plays() {
        let (mut session, mut rx) = observed_session();
        assert_eq!(session.state(), PlaybackState::Idle);

        session.push_frame(&[0.1; 20], Instant::now());
        assert_eq!(session.state(), PlaybackState::Buffering);
        assert!(session.pull(Instant::now()).is_none());

        session.push_frame(&[0.1; 20], Instant::now());
        assert_eq!(session.state(), PlaybackState::Playing);
        assert_eq!(session.buffered_ms(), 40.0);
        assert_eq!(audio_events(&mut rx), vec![AudioEventType::PlaybackStarted]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_chunks_scheduled_back_to_back() {
        let mut session = PlaybackSession::new(test_config());
        let now = Instant::now();
        session.push_frame(&[0.1; 40], now);

        let first = session.pull(now).unwrap();
        assert_eq!(first.play_at, now);
        assert_eq!(first.samples.len(), 10);
        assert_eq!(first.duration, Duration::from_millis(10));

        let second = session.pull(now).unwrap();
        assert_eq!(second.play_at, now + Duration::from_millis(10));

        assert!(session.pull_due(now, Duration::from_millis(15)).is_empty());
        let due = session.pull_due(now, Duration::from_millis(30));
        let starts: Vec<_> = due.iter().map(|chunk| chunk.play_at - now).collect();
        assert_eq!(starts, vec![Duration::from_millis(20), Duration::from_millis(30)]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_underrun_rebuffers_without_error() {
        let (mut session, mut rx) = observed_session();
        let now = Instant::now();
        session.push_frame(&[0.1; 35], now);
        audio_events(&mut rx);

        let chunks = session.pull_due(now, Duration::from_millis(100));
        assert_eq!(chunks.len(), 4);
        assert_eq!(chunks[3].samples.len(), 5);
        assert_eq!(session.state(), PlaybackState::Underrun);
        assert_eq!(session.gap_stats().underruns, 1);
        assert_eq!(audio_events(&mut rx), vec![AudioEventType::Underrun]);

        tokio::time::advance(Duration::from_millis(10)).await;
        session.push_frame(&[0.1; 10], Instant::now());
        assert_eq!(session.state(), PlaybackState::Buffering);
        assert!(session.pull(Instant::now()).is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_late_arrivals_raise_threshold_up_to_max() {
        let (mut session, mut rx) = observed_session();
        session.push_frame(&[0.1; 5], Instant::now());
        for _ in 0..4 {
            tokio::time::advance(Duration::from_millis(80)).await;
            session.push_frame(&[0.1; 5], Instant::now());
        }

        assert_eq!(session.threshold_ms(), 60.0);
        assert_eq!(session.state(), PlaybackState::Buffering);
        let stats = session.gap_stats();
        assert_eq!(stats.frames, 5);
        assert_eq!(stats.gap_count, 4);
        assert_eq!(stats.max_gap_ms, 80.0);
        assert_eq!(stats.average_gap_ms, 80.0);
        assert_eq!(
            audio_events(&mut rx),
            vec![AudioEventType::ThresholdRaised; 3]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_steady_arrivals_relax_threshold_to_min() {
        let mut session = PlaybackSession::new(test_config());
        session.push_frame(&[0.1; 5], Instant::now());
        for _ in 0..9 {
            tokio::time::advance(Duration::from_millis(10)).await;
            session.push_frame(&[0.1; 5], Instant::now());
        }

        assert_eq!(session.threshold_ms(), 20.0);
        assert_eq!(session.gap_stats().gap_count, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_volume_clamped_and_applied_on_pull() {
        let mut session = PlaybackSession::new(test_config());
        assert_eq!(session.set_volume(1.5), 1.0);
        assert_eq!(session.set_volume(-0.2), 0.0);
        assert_eq!(session.set_volume(f32::NAN), 0.0);
        assert_eq!(session.set_volume(0.5), 0.5);

        session.push_frame(&[0.8; 30], Instant::now());
        let chunk = session.pull(Instant::now()).unwrap();
        assert!(chunk.samples.iter().all(|&s| s == 0.4));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_drops_buffer_and_returns_idle() {
        let (mut session, mut rx) = observed_session();
        session.push_frame(&[0.1; 40], Instant::now());
        session.stop();

        assert_eq!(session.state(), PlaybackState::Idle);
        assert_eq!(session.buffered_ms(), 0.0);
        assert_eq!(
            audio_events(&mut rx),
            vec![AudioEventType::PlaybackStarted, AudioEventType::PlaybackStopped]
        );

        session.stop();
        assert!(audio_events(&mut rx).is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_base64_frames_decoded() {
        let mut session = PlaybackSession::new(test_config());
        session
            .push_base64(&encode_base64(&[0.5; 12]), Instant::now())
            .unwrap();
        assert_eq!(session.buffered_ms(), 12.0);

        assert!(matches!(
            session.push_base64("AAA", Instant::now()),
            Err(AudioError::InvalidFrame(_))
        ));
        assert_eq!(session.gap_stats().frames, 1);
    }
}
