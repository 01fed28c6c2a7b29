//! Inbound processing queue
//!
//! Routes each received message by [`ProcessingMode`]:
//!
//! - `Immediate`: hand to the consumer now
//! - `Buffered`: collect for `buffer_size_ms`, then flush in arrival order
//! - `Chunked`: reassemble chunk series, pass everything else through
//! - `Realtime`: deliver in sequence order when ordering is enabled
//!
//! Nothing here sleeps. Flush deadlines, chunk timeouts and ordering
//! windows are entries in a [`TimerSet`] serviced by [`ProcessingQueue::tick`].

use crate::core::scheduler::TimerSet;
use crate::queue::assembler::{AssembledMessage, ChunkAssembler, ChunkOutcome};
use crate::queue::config::ProcessingQueueConfig;
use crate::queue::error::{ConsumerError, QueueError};
use crate::queue::message::{MessageMetadata, Payload, ProcessingMessage};
use crate::queue::metrics::{HealthThresholds, MetricsSnapshot, QueueMetrics};
use crate::queue::notice::{emit, NoticeSink, QueueNotice};
use crate::queue::ordering::{OrderingBuffer, SequencePosition};
use crate::queue::types::{OrderingExpiry, ProcessingMode, TrafficClass};
use serde::Serialize;
use std::collections::VecDeque;
use tokio::time::Instant;

/// Consumer of inbound messages
pub trait MessageConsumer: Send {
    fn consume(&mut self, message: &ProcessingMessage) -> Result<Option<Payload>, ConsumerError>;
}

impl<F> MessageConsumer for F
where
    F: FnMut(&ProcessingMessage) -> Result<Option<Payload>, ConsumerError> + Send,
{
    fn consume(&mut self, message: &ProcessingMessage) -> Result<Option<Payload>, ConsumerError> {
        self(message)
    }
}

/// Outcome of handing a message to [`ProcessingQueue::enqueue`]
#[derive(Debug, Clone, PartialEq)]
pub enum Receipt {
    /// The consumer ran; carries its result
    Processed(Option<Payload>),
    /// Held for later delivery (buffer, assembly or ordering window)
    Buffered,
    /// The consumer failed, or the message was discarded
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum Deadline {
    Flush,
    Chunk(String),
    Ordering(u64),
}

/// Read-only view of an inbound queue
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InboundSnapshot {
    pub name: String,
    pub class: TrafficClass,
    pub mode: ProcessingMode,
    pub buffered: usize,
    pub pending_assemblies: usize,
    pub held_chunks: usize,
    pub held_out_of_order: usize,
    pub next_expected_sequence: Option<u64>,
    pub memory_bytes: usize,
    pub metrics: MetricsSnapshot,
}

pub struct ProcessingQueue {
    name: String,
    class: TrafficClass,
    config: ProcessingQueueConfig,
    consumer: Box<dyn MessageConsumer>,
    buffer: VecDeque<ProcessingMessage>,
    assembler: ChunkAssembler,
    ordering: OrderingBuffer,
    timers: TimerSet<Deadline>,
    flushing: bool,
    metrics: QueueMetrics,
    notices: Option<NoticeSink>,
}

impl ProcessingQueue {
    pub fn new<C>(class: TrafficClass, config: ProcessingQueueConfig, consumer: C) -> Self
    where
        C: MessageConsumer + 'static,
    {
        let name = class.to_string();
        Self {
            metrics: QueueMetrics::new(format!("inbound.{}", name)),
            ordering: OrderingBuffer::new(config.initial_sequence),
            name,
            class,
            config,
            consumer: Box::new(consumer),
            buffer: VecDeque::new(),
            assembler: ChunkAssembler::new(),
            timers: TimerSet::new(),
            flushing: false,
            notices: None,
        }
    }

    pub fn with_thresholds(mut self, thresholds: HealthThresholds) -> Self {
        self.metrics = QueueMetrics::with_thresholds(self.metrics.name().to_string(), thresholds);
        self
    }

    pub fn with_notice_sink(mut self, sink: NoticeSink) -> Self {
        self.notices = Some(sink);
        self
    }

    pub fn set_notice_sink(&mut self, sink: Option<NoticeSink>) {
        self.notices = sink;
    }

    pub fn enqueue(&mut self, payload: Payload, metadata: MessageMetadata) -> Receipt {
        let now = Instant::now();
        let message = ProcessingMessage::new(payload, metadata, now);
        let sequence_number = message.metadata.sequence_number;
        self.metrics.record_enqueued(self.depth() + 1);

        match self.config.mode {
            ProcessingMode::Immediate => self.deliver(message, 1, now),
            ProcessingMode::Buffered => self.buffer_message(message, now),
            ProcessingMode::Chunked => self.assemble(message, now),
            ProcessingMode::Realtime => match sequence_number {
                Some(sequence) if self.config.enable_ordering => {
                    self.order(sequence, message, now)
                }
                _ => self.deliver(message, 1, now),
            },
        }
    }

    fn buffer_message(&mut self, message: ProcessingMessage, now: Instant) -> Receipt {
        self.buffer.push_back(message);
        if self.buffer.len() >= self.config.max_buffer_size {
            self.metrics.record_overflow();
            self.notify(QueueNotice::BufferFull {
                queue: self.name.clone(),
                depth: self.buffer.len(),
            });
            log::debug!(
                "Inbound buffer '{}' reached {} messages, flushing early",
                self.name,
                self.buffer.len()
            );
            self.flush_buffer(now);
        } else {
            self.timers
                .schedule_if_absent(Deadline::Flush, now + self.config.buffer_window());
        }
        Receipt::Buffered
    }

    fn assemble(&mut self, message: ProcessingMessage, now: Instant) -> Receipt {
        if message.metadata.is_chunk && message.metadata.chunk_descriptor().is_none() {
            log::warn!(
                "Malformed chunk on '{}' (id={:?} index={:?} total={:?}), processing as a whole message",
                self.name,
                message.metadata.chunk_id,
                message.metadata.chunk_index,
                message.metadata.total_chunks
            );
        }

        match self.assembler.add(message) {
            ChunkOutcome::NotAChunk(message) => self.deliver(message, 1, now),
            ChunkOutcome::Started { chunk_id } => {
                self.timers.schedule(
                    Deadline::Chunk(chunk_id),
                    now + self.config.chunk_timeout(),
                );
                Receipt::Buffered
            }
            ChunkOutcome::Pending => Receipt::Buffered,
            ChunkOutcome::Duplicate => {
                self.metrics.record_dropped(1, self.depth());
                Receipt::Buffered
            }
            ChunkOutcome::Complete(assembled) => {
                if let Some(chunk_id) = assembled.message.metadata.chunk_id.clone() {
                    self.timers.cancel(&Deadline::Chunk(chunk_id));
                }
                self.deliver_assembled(assembled, now)
            }
        }
    }

    fn order(&mut self, sequence: u64, message: ProcessingMessage, now: Instant) -> Receipt {
        match self.ordering.classify(sequence) {
            SequencePosition::Next => {
                self.ordering.advance_past(sequence);
                let receipt = self.deliver(message, 1, now);
                let ready = self.ordering.take_ready();
                self.deliver_ordered(ready, now);
                receipt
            }
            SequencePosition::Future => {
                if self.ordering.is_held(sequence) {
                    log::warn!(
                        "Duplicate sequence {} on '{}' discarded",
                        sequence,
                        self.name
                    );
                    self.metrics.record_dropped(1, self.depth());
                    return Receipt::Failed;
                }
                if self.ordering.hold(sequence, message).is_ok() {
                    self.timers.schedule(
                        Deadline::Ordering(sequence),
                        now + self.config.ordering_window(),
                    );
                }
                Receipt::Buffered
            }
            SequencePosition::Stale => {
                let expected = self.ordering.next_expected();
                log::warn!(
                    "Late message on '{}': sequence {} arrived after {} was expected; processing anyway",
                    self.name,
                    sequence,
                    expected
                );
                self.notify(QueueNotice::StaleSequence {
                    queue: self.name.clone(),
                    sequence,
                    expected,
                });
                self.deliver(message, 1, now)
            }
        }
    }

    fn deliver_ordered(&mut self, ready: Vec<(u64, ProcessingMessage)>, now: Instant) -> usize {
        let count = ready.len();
        for (sequence, message) in ready {
            self.timers.cancel(&Deadline::Ordering(sequence));
            self.deliver(message, 1, now);
        }
        count
    }

    fn deliver_assembled(&mut self, assembled: AssembledMessage, now: Instant) -> Receipt {
        if assembled.is_partial() {
            let chunk_id = assembled
                .message
                .metadata
                .chunk_id
                .clone()
                .unwrap_or_default();
            let timeout = QueueError::AssemblyTimeout {
                chunk_id: chunk_id.clone(),
                received: assembled.parts,
                expected: assembled.expected,
            };
            log::warn!("{} on '{}', delivering partial message", timeout, self.name);
            self.notify(QueueNotice::PartialAssembly {
                queue: self.name.clone(),
                chunk_id,
                received: assembled.parts,
                expected: assembled.expected,
            });
        }
        self.deliver(assembled.message, assembled.parts, now)
    }

    /// Run the consumer; `parts` is how many enqueued messages this covers
    fn deliver(&mut self, message: ProcessingMessage, parts: usize, now: Instant) -> Receipt {
        match self.consumer.consume(&message) {
            Ok(result) => {
                let latency = now.saturating_duration_since(message.received_at);
                self.metrics.record_processed(parts, latency, self.depth());
                Receipt::Processed(result)
            }
            Err(err) => {
                self.metrics.record_failed(parts);
                self.metrics.record_dropped(parts, self.depth());
                log::warn!("Consumer on '{}' failed: {}", self.name, err);
                self.notify(QueueNotice::Error {
                    queue: self.name.clone(),
                    class: Some(self.class),
                    message: err.to_string(),
                });
                Receipt::Failed
            }
        }
    }

    fn flush_buffer(&mut self, now: Instant) -> usize {
        if self.flushing {
            return 0;
        }
        self.flushing = true;
        self.timers.cancel(&Deadline::Flush);

        let mut delivered = 0;
        while let Some(message) = self.buffer.pop_front() {
            self.deliver(message, 1, now);
            delivered += 1;
        }

        self.flushing = false;
        delivered
    }

    /// Service every deadline due at `now`; returns messages delivered
    pub fn tick(&mut self, now: Instant) -> usize {
        let mut delivered = 0;
        for deadline in self.timers.pop_due(now) {
            match deadline {
                Deadline::Flush => delivered += self.flush_buffer(now),
                Deadline::Chunk(chunk_id) => {
                    if let Some(assembled) = self.assembler.force_complete(&chunk_id) {
                        self.deliver_assembled(assembled, now);
                        delivered += 1;
                    }
                }
                Deadline::Ordering(sequence) => {
                    if !self.ordering.is_held(sequence) {
                        continue;
                    }
                    match self.config.ordering_expiry {
                        OrderingExpiry::ForceThrough => {
                            log::debug!(
                                "Ordering window expired on '{}', skipping to sequence {}",
                                self.name,
                                sequence
                            );
                            let released = self.ordering.release_through(sequence);
                            delivered += self.deliver_ordered(released, now);
                        }
                        OrderingExpiry::Discard => {
                            if self.ordering.discard(sequence).is_some() {
                                log::warn!(
                                    "Ordering window expired on '{}', discarded sequence {}",
                                    self.name,
                                    sequence
                                );
                                self.metrics.record_dropped(1, self.depth());
                            }
                        }
                    }
                }
            }
        }
        delivered
    }

    /// Deliver everything held right now
    ///
    /// Incomplete assemblies are delivered partial; held out-of-order
    /// messages are released in ascending sequence order.
    pub fn flush(&mut self) -> usize {
        let now = Instant::now();
        let mut delivered = self.flush_buffer(now);

        for assembled in self.assembler.force_all() {
            self.deliver_assembled(assembled, now);
            delivered += 1;
        }

        let held = self.ordering.drain_all();
        delivered += self.deliver_ordered(held, now);

        self.timers.clear();
        delivered
    }

    /// Forget ordering state, e.g. when the peer restarts its sequence
    pub fn reset_sequence(&mut self, next_expected: u64) {
        let dropped = self.ordering.reset(next_expected);
        if dropped > 0 {
            self.metrics.record_dropped(dropped, self.depth());
        }
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.timers.next_deadline()
    }

    /// Messages held inside the queue
    pub fn depth(&self) -> usize {
        self.buffer.len() + self.assembler.held_chunks() + self.ordering.held()
    }

    pub fn memory_bytes(&self) -> usize {
        self.buffer
            .iter()
            .map(|m| m.payload.size_bytes())
            .sum::<usize>()
            + self.assembler.held_bytes()
            + self.ordering.held_bytes()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn class(&self) -> TrafficClass {
        self.class
    }

    pub fn config(&self) -> &ProcessingQueueConfig {
        &self.config
    }

    pub fn metrics(&self) -> &QueueMetrics {
        &self.metrics
    }

    pub fn reset_metrics(&mut self) {
        self.metrics.reset();
    }

    fn notify(&self, notice: QueueNotice) {
        emit(&self.notices, notice);
    }

    pub fn snapshot(&self) -> InboundSnapshot {
        InboundSnapshot {
            name: self.name.clone(),
            class: self.class,
            mode: self.config.mode,
            buffered: self.buffer.len(),
            pending_assemblies: self.assembler.pending(),
            held_chunks: self.assembler.held_chunks(),
            held_out_of_order: self.ordering.held(),
            next_expected_sequence: (self.config.mode == ProcessingMode::Realtime
                && self.config.enable_ordering)
                .then(|| self.ordering.next_expected()),
            memory_bytes: self.memory_bytes(),
            metrics: self.metrics.snapshot(),
        }
    }
}

impl std::fmt::Debug for ProcessingQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProcessingQueue")
            .field("name", &self.name)
            .field("mode", &self.config.mode)
            .field("depth", &self.depth())
            .finish()
    }
}
