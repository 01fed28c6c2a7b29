//! Microphone capture worklet
//!
//! Capture runs on its own thread. Raw `f32` blocks are moved in over a
//! bounded channel, accumulated into fixed-size frames, and the frames are
//! moved back out over a second bounded channel. Nothing is shared between
//! the two sides.
//!
//! The worklet's process step always reports "keep alive": a bad block
//! becomes a [`WorkletOutput::Error`] message instead of stopping capture.
//! On the async side, [`spawn_capture_forwarder`] converts frames to PCM16
//! and sends them with `send_direct`, bypassing the outbound queues.

use crate::audio::contexts::AudioContext;
use crate::audio::error::{AudioError, AudioResult};
use crate::audio::pcm::f32_to_pcm16;
use crate::notifications::api::{AudioEvent, AudioEventType, Event};
use crate::queue::api::{MessageQueueManager, Payload, TrafficClass};
use std::sync::Arc;
use std::thread;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

#[derive(Debug)]
pub enum WorkletInput {
    Samples(Vec<f32>),
    Stop,
}

#[derive(Debug, PartialEq)]
pub enum WorkletOutput {
    Frame(CaptureFrame),
    Error(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct CaptureFrame {
    pub sequence: u64,
    pub samples: Vec<f32>,
}

/// Frame assembly state owned by the worklet thread
#[derive(Debug)]
pub struct FrameAccumulator {
    frame_samples: usize,
    pending: Vec<f32>,
    sequence: u64,
}

impl FrameAccumulator {
    pub fn new(frame_samples: usize) -> Self {
        let frame_samples = frame_samples.max(1);
        Self {
            frame_samples,
            pending: Vec::with_capacity(frame_samples),
            sequence: 0,
        }
    }

    /// Consume one block; always returns `true`
    pub fn process(&mut self, block: Vec<f32>, out: &mut Vec<WorkletOutput>) -> bool {
        if let Some(position) = block.iter().position(|s| !s.is_finite()) {
            out.push(WorkletOutput::Error(format!(
                "non-finite sample at offset {} in {}-sample block",
                position,
                block.len()
            )));
            return true;
        }

        self.pending.extend(block);
        while self.pending.len() >= self.frame_samples {
            let rest = self.pending.split_off(self.frame_samples);
            let samples = std::mem::replace(&mut self.pending, rest);
            out.push(WorkletOutput::Frame(CaptureFrame {
                sequence: self.sequence,
                samples,
            }));
            self.sequence += 1;
        }
        true
    }

    pub fn pending_samples(&self) -> usize {
        self.pending.len()
    }
}

/// Cloneable sender side for raw capture blocks
#[derive(Debug, Clone)]
pub struct CaptureFeed {
    tx: mpsc::Sender<WorkletInput>,
}

impl CaptureFeed {
    pub async fn push(&self, block: Vec<f32>) -> AudioResult<()> {
        self.tx
            .send(WorkletInput::Samples(block))
            .await
            .map_err(|_| AudioError::WorkletStopped)
    }

    /// Non-blocking push for real-time callbacks; a full channel drops the block
    pub fn try_push(&self, block: Vec<f32>) -> AudioResult<bool> {
        match self.tx.try_send(WorkletInput::Samples(block)) {
            Ok(()) => Ok(true),
            Err(mpsc::error::TrySendError::Full(_)) => {
                log::debug!("Capture input channel full, block dropped");
                Ok(false)
            }
            Err(mpsc::error::TrySendError::Closed(_)) => Err(AudioError::WorkletStopped),
        }
    }
}

/// Handle to a running capture thread
pub struct CaptureWorklet {
    id: String,
    control: Option<mpsc::Sender<WorkletInput>>,
    thread: Option<thread::JoinHandle<()>>,
}

impl CaptureWorklet {
    /// Start the worklet thread
    ///
    /// Returns the worklet handle, the feed for raw blocks and the receiver
    /// of assembled frames.
    pub fn spawn(
        id: impl Into<String>,
        frame_samples: usize,
        capacity: usize,
    ) -> AudioResult<(Self, CaptureFeed, mpsc::Receiver<WorkletOutput>)> {
        let id = id.into();
        let (input_tx, mut input_rx) = mpsc::channel::<WorkletInput>(capacity.max(1));
        let (output_tx, output_rx) = mpsc::channel::<WorkletOutput>(capacity.max(1));

        let handle = thread::Builder::new()
            .name(format!("capture-{}", id))
            .spawn(move || {
                let mut accumulator = FrameAccumulator::new(frame_samples);
                let mut outputs = Vec::new();
                while let Some(WorkletInput::Samples(block)) = input_rx.blocking_recv() {
                    let keep_alive = accumulator.process(block, &mut outputs);
                    for output in outputs.drain(..) {
                        if output_tx.blocking_send(output).is_err() {
                            return;
                        }
                    }
                    if !keep_alive {
                        break;
                    }
                }
            })
            .map_err(|err| {
                log::warn!("Could not start capture thread: {}", err);
                AudioError::WorkletStopped
            })?;

        let worklet = Self {
            id,
            control: Some(input_tx.clone()),
            thread: Some(handle),
        };
        Ok((worklet, CaptureFeed { tx: input_tx }, output_rx))
    }

    pub fn is_finished(&self) -> bool {
        self.thread.as_ref().map_or(true, |handle| handle.is_finished())
    }
}

impl AudioContext for CaptureWorklet {
    fn id(&self) -> &str {
        &self.id
    }

    fn close(&mut self) {
        if let Some(control) = self.control.take() {
            if control.try_send(WorkletInput::Stop).is_err() {
                log::debug!("Capture worklet '{}' already stopping", self.id);
            }
        }
        // The thread exits on its own once it sees Stop; joining here could
        // block the async side.
        self.thread.take();
    }
}

/// Counters returned by the capture forwarder when its channel closes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CaptureSummary {
    pub frames_sent: u64,
    pub frames_failed: u64,
    pub errors: u64,
}

/// Forward captured frames to the transport as PCM16 audio
pub fn spawn_capture_forwarder(
    manager: Arc<MessageQueueManager>,
    mut frames: mpsc::Receiver<WorkletOutput>,
) -> JoinHandle<CaptureSummary> {
    tokio::spawn(async move {
        let mut summary = CaptureSummary::default();
        while let Some(output) = frames.recv().await {
            match output {
                WorkletOutput::Frame(frame) => {
                    let payload = Payload::Binary(f32_to_pcm16(&frame.samples));
                    if manager.send_direct(TrafficClass::Audio, payload) {
                        summary.frames_sent += 1;
                    } else {
                        summary.frames_failed += 1;
                    }
                }
                WorkletOutput::Error(message) => {
                    summary.errors += 1;
                    log::warn!("Capture worklet error: {}", message);
                    manager.publish(Event::Audio(AudioEvent::with_message(
                        AudioEventType::CaptureError,
                        message,
                    )));
                }
            }
        }
        log::debug!(
            "Capture forwarder finished: {} sent, {} failed, {} errors",
            summary.frames_sent,
            summary.frames_failed,
            summary.errors
        );
        summary
    })
}
