//! Loopback backend used by the CLI
//!
//! [`LoopbackConnector`] stands in for the agent backend. It echoes what the
//! client sends the way a live backend replies:
//!
//! - text comes back as chunks in reverse order, followed by a
//!   `turn_complete` frame
//! - audio comes back with sequence numbers, adjacent frames swapped when
//!   `reorder_audio` is set
//! - video and control frames are consumed silently
//!
//! The first `refuse_connects` connection attempts fail so reconnection
//! backoff is exercised too.

use crate::queue::api::TrafficClass;
use crate::transport::api::{Connection, Connector, FrameCodec, TransportError, TransportFrame};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU32, Ordering};
use tokio::sync::mpsc;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SimulationConfig {
    /// Session length when `--duration` is not given
    pub duration_secs: u64,
    pub text_interval_ms: u64,
    pub video_interval_ms: u64,
    /// Number of chunks each echoed text reply is split into
    pub text_chunks: u32,
    pub reorder_audio: bool,
    pub refuse_connects: u32,
    pub channel_capacity: usize,
    /// Frequency of the synthetic capture tone
    pub tone_hz: f32,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            duration_secs: 3,
            text_interval_ms: 500,
            video_interval_ms: 200,
            text_chunks: 3,
            reorder_audio: true,
            refuse_connects: 1,
            channel_capacity: 256,
            tone_hz: 440.0,
        }
    }
}

pub struct LoopbackConnector {
    config: SimulationConfig,
    refusals_left: AtomicU32,
}

impl LoopbackConnector {
    pub fn new(config: SimulationConfig) -> Self {
        Self {
            refusals_left: AtomicU32::new(config.refuse_connects),
            config,
        }
    }
}

#[async_trait]
impl Connector for LoopbackConnector {
    fn endpoint(&self) -> &str {
        "loopback"
    }

    async fn connect(&self) -> Result<Connection, TransportError> {
        if self
            .refusals_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            return Err(TransportError::ConnectFailed {
                endpoint: self.endpoint().to_string(),
                reason: "connection refused".to_string(),
            });
        }

        let capacity = self.config.channel_capacity.max(1);
        let (client_tx, backend_rx) = mpsc::channel(capacity);
        let (backend_tx, client_rx) = mpsc::channel(capacity);
        spawn_echo(self.config.clone(), backend_rx, backend_tx);
        Ok(Connection {
            outbound: client_tx,
            inbound: client_rx,
        })
    }
}

/// Counts of frames the loopback backend handled
#[derive(Clone, Copy, Default)]
struct EchoSummary {
    text_replies: u64,
    audio_frames: u64,
    ignored: u64,
    malformed: u64,
}

struct Echo {
    config: SimulationConfig,
    replies: mpsc::Sender<String>,
    next_reply: u64,
    next_sequence: u64,
    held_audio: Option<TransportFrame>,
    summary: EchoSummary,
}

impl Echo {
    async fn handle(&mut self, line: &str) -> Result<(), TransportError> {
        let frame = TransportFrame::from_json(line)?;
        let class = frame.mime_type.as_deref().and_then(FrameCodec::class_for_mime);
        match class {
            Some(TrafficClass::Text) if !frame.is_turn_control() => {
                self.echo_text(frame.data.unwrap_or_default()).await
            }
            Some(TrafficClass::Audio) => self.echo_audio(frame).await,
            _ => {
                self.summary.ignored += 1;
                Ok(())
            }
        }
    }

    async fn echo_text(&mut self, text: String) -> Result<(), TransportError> {
        self.next_reply += 1;
        let reply_id = format!("echo-{}", self.next_reply);
        let parts = split_text(&text, self.config.text_chunks.max(1) as usize);
        let total = parts.len() as u32;

        for (index, part) in parts.into_iter().enumerate().rev() {
            let frame = TransportFrame {
                role: Some("agent".to_string()),
                chunk_id: Some(reply_id.clone()),
                chunk_index: Some(index as u32),
                total_chunks: Some(total),
                ..TransportFrame::media(FrameCodec::mime_for(TrafficClass::Text), part)
            };
            self.emit(frame).await?;
        }
        self.emit(TransportFrame::turn_control(true, false)).await?;
        self.summary.text_replies += 1;
        Ok(())
    }

    async fn echo_audio(&mut self, mut frame: TransportFrame) -> Result<(), TransportError> {
        frame.sequence_number = Some(self.next_sequence);
        self.next_sequence += 1;
        self.summary.audio_frames += 1;

        if !self.config.reorder_audio {
            return self.emit(frame).await;
        }
        match self.held_audio.take() {
            Some(held) => {
                self.emit(frame).await?;
                self.emit(held).await
            }
            None => {
                self.held_audio = Some(frame);
                Ok(())
            }
        }
    }

    async fn emit(&self, frame: TransportFrame) -> Result<(), TransportError> {
        self.replies
            .send(frame.to_json()?)
            .await
            .map_err(|_| TransportError::Closed)
    }
}

fn spawn_echo(
    config: SimulationConfig,
    mut requests: mpsc::Receiver<String>,
    replies: mpsc::Sender<String>,
) {
    tokio::spawn(async move {
        let mut echo = Echo {
            config,
            replies,
            next_reply: 0,
            next_sequence: 0,
            held_audio: None,
            summary: EchoSummary::default(),
        };

        while let Some(line) = requests.recv().await {
            match echo.handle(&line).await {
                Ok(()) => {}
                Err(TransportError::Closed) => break,
                Err(err) => {
                    echo.summary.malformed += 1;
                    log::debug!("Loopback ignored frame: {}", err);
                }
            }
        }
        if let Some(held) = echo.held_audio.take() {
            let _ = echo.emit(held).await;
        }
        let summary = echo.summary;
        log::debug!(
            "Loopback backend finished: {} text replies, {} audio frames, {} ignored, {} malformed",
            summary.text_replies,
            summary.audio_frames,
            summary.ignored,
            summary.malformed
        );
    });
}

/// Split `text` into at most `parts` non-empty pieces on char boundaries
fn split_text(text: &str, parts: usize) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    if chars.is_empty() {
        return vec![String::new()];
    }
    let size = chars.len().div_ceil(parts);
    chars.chunks(size).map(|chunk| chunk.iter().collect()).collect()
}

/// One capture block of a sine tone, starting at sample `offset`
pub fn tone_block(frequency: f32, sample_rate: u32, offset: u64, len: usize) -> Vec<f32> {
    let rate = sample_rate.max(1) as f64;
    (0..len)
        .map(|i| {
            let t = (offset + i as u64) as f64 / rate;
            (0.25 * (2.0 * std::f64::consts::PI * f64::from(frequency) * t).sin()) as f32
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::retry::RetryPolicy;
    use crate::transport::api::{connect_with_backoff, MIME_PCM};
    use std::time::Duration;

    fn quiet_config() -> SimulationConfig {
        SimulationConfig {
            refuse_connects: 0,
            text_chunks: 2,
            ..SimulationConfig::default()
        }
    }

    #[test]
    fn test_split_text() {
        assert_eq!(split_text("abcde", 2), vec!["abc", "de"]);
        assert_eq!(split_text("ab", 5), vec!["a", "b"]);
        assert_eq!(split_text("", 3), vec![""]);
    }

    #[test]
    fn test_tone_block_is_bounded() {
        let block = tone_block(440.0, 16_000, 0, 160);
        assert_eq!(block.len(), 160);
        assert_eq!(block[0], 0.0);
        assert!(block.iter().all(|s| s.abs() <= 0.25));
    }

    #[tokio::test]
    async fn test_text_echoed_as_reversed_chunks_then_turn_complete() {
        let connector = LoopbackConnector::new(quiet_config());
        let mut connection = connector.connect().await.unwrap();
        connection
            .outbound
            .send(r#"{"mime_type":"text/plain","data":"Hello!"}"#.to_string())
            .await
            .unwrap();

        let first = FrameCodec::decode(&connection.inbound.recv().await.unwrap()).unwrap();
        let second = FrameCodec::decode(&connection.inbound.recv().await.unwrap()).unwrap();
        let last = FrameCodec::decode(&connection.inbound.recv().await.unwrap()).unwrap();

        assert_eq!(first.metadata.chunk_descriptor(), Some(("echo-1", 1, 2)));
        assert_eq!(first.payload.as_text(), Some("lo!"));
        assert_eq!(second.metadata.chunk_descriptor(), Some(("echo-1", 0, 2)));
        assert_eq!(last.class, TrafficClass::Control);
    }

    #[tokio::test]
    async fn test_audio_pairs_swapped_with_sequence_numbers() {
        let connector = LoopbackConnector::new(quiet_config());
        let mut connection = connector.connect().await.unwrap();
        for data in ["AAA=", "AQA="] {
            let line = TransportFrame::media(MIME_PCM, data).to_json().unwrap();
            connection.outbound.send(line).await.unwrap();
        }

        let first = FrameCodec::decode(&connection.inbound.recv().await.unwrap()).unwrap();
        let second = FrameCodec::decode(&connection.inbound.recv().await.unwrap()).unwrap();
        assert_eq!(first.metadata.sequence_number, Some(1));
        assert_eq!(second.metadata.sequence_number, Some(0));
    }

    #[tokio::test]
    async fn test_video_ignored_and_held_audio_flushed_on_close() {
        let connector = LoopbackConnector::new(quiet_config());
        let mut connection = connector.connect().await.unwrap();
        connection
            .outbound
            .send(r#"{"mime_type":"image/jpeg","data":"/9g="}"#.to_string())
            .await
            .unwrap();
        connection
            .outbound
            .send(TransportFrame::media(MIME_PCM, "AAA=").to_json().unwrap())
            .await
            .unwrap();
        drop(connection.outbound);

        let only = FrameCodec::decode(&connection.inbound.recv().await.unwrap()).unwrap();
        assert_eq!(only.class, TrafficClass::Audio);
        assert_eq!(only.metadata.sequence_number, Some(0));
        assert!(connection.inbound.recv().await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_refused_connects_recovered_by_backoff() {
        let connector = LoopbackConnector::new(SimulationConfig {
            refuse_connects: 2,
            ..SimulationConfig::default()
        });
        let policy = RetryPolicy {
            max_attempts: 3,
            delay: Duration::from_millis(5),
            ..RetryPolicy::default()
        };
        assert!(connect_with_backoff(&connector, policy).await.is_ok());
        assert!(connector.connect().await.is_ok());
    }
}
