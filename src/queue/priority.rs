//! Outbound priority queue
//!
//! Four FIFO buckets (URGENT, HIGH, MEDIUM, LOW) bounded by a shared
//! `max_size`. Admission under pressure follows the configured
//! [`OverflowStrategy`]; draining is rate-limited and strictly
//! priority-ordered.
//!
//! Draining is two-phase so the transport is never called with the queue
//! borrowed or locked:
//!
//! ```text
//! begin_process(now) ──► DrainPoll::Ready(dispatch) ──► transport ──► complete(dispatch, result, now)
//!        │
//!        ├──► DrainPoll::RateLimited { retry_in }
//!        ├──► DrainPoll::Busy          (a dispatch is still outstanding)
//!        └──► DrainPoll::Empty
//! ```

use crate::queue::config::PriorityQueueConfig;
use crate::queue::error::{QueueError, QueueResult};
use crate::queue::message::{Payload, QueuedMessage};
use crate::queue::metrics::{HealthThresholds, MetricsSnapshot, QueueMetrics};
use crate::queue::notice::{emit, NoticeSink, QueueNotice};
use crate::queue::types::{MessageId, OverflowStrategy, Priority, SendOptions, TrafficClass};
use crate::transport::TransportError;
use serde::Serialize;
use std::collections::VecDeque;
use std::time::Duration;
use tokio::time::Instant;

/// Messages handed to the transport in one step
#[derive(Debug, Clone)]
pub enum Dispatch {
    Single(QueuedMessage),
    Batch(Vec<QueuedMessage>),
}

impl Dispatch {
    pub fn messages(&self) -> &[QueuedMessage] {
        match self {
            Dispatch::Single(message) => std::slice::from_ref(message),
            Dispatch::Batch(messages) => messages,
        }
    }

    pub fn into_messages(self) -> Vec<QueuedMessage> {
        match self {
            Dispatch::Single(message) => vec![message],
            Dispatch::Batch(messages) => messages,
        }
    }

    pub fn len(&self) -> usize {
        self.messages().len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages().is_empty()
    }

    pub fn is_batch(&self) -> bool {
        matches!(self, Dispatch::Batch(_))
    }
}

/// Result of the first drain phase
#[derive(Debug)]
pub enum DrainPoll {
    Ready(Dispatch),
    RateLimited { retry_in: Duration },
    Busy,
    Empty,
}

/// Result of a complete drain step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessOutcome {
    Sent { count: usize },
    SendFailed { count: usize, given_up: usize },
    RateLimited { retry_in: Duration },
    Busy,
    Empty,
}

/// Queue depth per priority bucket
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PriorityDepths {
    pub urgent: usize,
    pub high: usize,
    pub medium: usize,
    pub low: usize,
}

/// Read-only view of an outbound queue
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutboundSnapshot {
    pub name: String,
    pub class: TrafficClass,
    pub depth: usize,
    pub max_size: usize,
    pub rate_limit_ms: u64,
    pub batch_size: usize,
    pub overflow_strategy: OverflowStrategy,
    pub processing: bool,
    pub by_priority: PriorityDepths,
    pub memory_bytes: usize,
    pub metrics: MetricsSnapshot,
}

pub struct PriorityQueue {
    name: String,
    class: TrafficClass,
    config: PriorityQueueConfig,
    buckets: [VecDeque<QueuedMessage>; 4],
    len: usize,
    processing: bool,
    last_dispatch: Option<Instant>,
    metrics: QueueMetrics,
    notices: Option<NoticeSink>,
}

impl PriorityQueue {
    pub fn new(class: TrafficClass, config: PriorityQueueConfig) -> Self {
        Self::with_name(class.to_string(), class, config)
    }

    pub fn with_name(name: impl Into<String>, class: TrafficClass, config: PriorityQueueConfig) -> Self {
        let name = name.into();
        Self {
            metrics: QueueMetrics::new(format!("outbound.{}", name)),
            name,
            class,
            config,
            buckets: Default::default(),
            len: 0,
            processing: false,
            last_dispatch: None,
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

    /// Admit a message, applying the overflow strategy when full
    ///
    /// A rejected message is still counted as queued and dropped so the
    /// accounting identity covers every attempt.
    pub fn enqueue(
        &mut self,
        payload: Payload,
        priority: Option<Priority>,
        options: SendOptions,
    ) -> QueueResult<MessageId> {
        let priority = if options.urgent {
            Priority::Urgent
        } else {
            options.priority.or(priority).unwrap_or(self.config.priority)
        };

        if self.len >= self.config.max_size {
            self.metrics.record_overflow();
            let evicted = self.make_room(priority);
            if evicted == 0 {
                self.metrics.record_enqueued(self.len);
                self.metrics.record_dropped(1, self.len);
                self.notify(QueueNotice::Overflow {
                    queue: self.name.clone(),
                    strategy: self.config.overflow_strategy,
                    dropped: 1,
                    depth: self.len,
                });
                log::debug!(
                    "Queue '{}' full ({}), rejected {} message",
                    self.name,
                    self.config.max_size,
                    priority
                );
                return Err(QueueError::QueueFull {
                    queue: self.name.clone(),
                    max_size: self.config.max_size,
                });
            }
            self.notify(QueueNotice::Overflow {
                queue: self.name.clone(),
                strategy: self.config.overflow_strategy,
                dropped: evicted,
                depth: self.len,
            });
        }

        let message = QueuedMessage::new(
            self.class,
            payload,
            priority,
            options,
            self.config.timeout(),
            Instant::now(),
        );
        let id = message.id;
        self.buckets[priority.index()].push_back(message);
        self.len += 1;
        self.metrics.record_enqueued(self.len);
        Ok(id)
    }

    /// Free at least one slot; returns how many messages were evicted
    fn make_room(&mut self, incoming: Priority) -> usize {
        match self.config.overflow_strategy {
            OverflowStrategy::DropOldest => self.evict_oldest(),
            OverflowStrategy::DropNewest | OverflowStrategy::FailSend => 0,
            OverflowStrategy::ReplaceNewest => {
                let bucket = &mut self.buckets[incoming.index()];
                if self.config.replace_scope.covers(incoming) && bucket.pop_back().is_some() {
                    self.len -= 1;
                    self.metrics.record_dropped(1, self.len);
                    1
                } else {
                    self.evict_oldest()
                }
            }
            OverflowStrategy::Compress => {
                let mut evicted = self.compress();
                if self.len >= self.config.max_size {
                    evicted += self.evict_oldest();
                }
                evicted
            }
        }
    }

    /// Evict the head of the lowest-priority non-empty bucket
    fn evict_oldest(&mut self) -> usize {
        for priority in Priority::EVICTION_ORDER {
            if self.buckets[priority.index()].pop_front().is_some() {
                self.len -= 1;
                self.metrics.record_dropped(1, self.len);
                return 1;
            }
        }
        0
    }

    /// Thin out compressible messages, every other one, oldest first,
    /// until depth is at most `compression_threshold * max_size`
    fn compress(&mut self) -> usize {
        let target =
            (self.config.max_size as f64 * self.config.compression_threshold).floor() as usize;
        let mut excess = self.len.saturating_sub(target);
        let initial = excess;

        loop {
            let before = excess;
            for priority in Priority::EVICTION_ORDER {
                if excess == 0 {
                    break;
                }
                let mut keep_next = true;
                self.buckets[priority.index()].retain(|message| {
                    if excess == 0 || !message.options.compressible {
                        return true;
                    }
                    let keep = keep_next;
                    keep_next = !keep_next;
                    if !keep {
                        excess -= 1;
                    }
                    keep
                });
            }
            if excess == 0 || excess == before {
                break;
            }
        }

        let removed = initial - excess;
        if removed > 0 {
            self.len -= removed;
            self.metrics.record_dropped(removed, self.len);
            log::debug!("Compressed queue '{}' by {} messages", self.name, removed);
        }
        removed
    }

    /// First drain phase; honours the rate limit
    pub fn begin_process(&mut self, now: Instant) -> DrainPoll {
        self.begin(now, true)
    }

    fn begin(&mut self, now: Instant, respect_rate_limit: bool) -> DrainPoll {
        if self.processing {
            return DrainPoll::Busy;
        }
        if respect_rate_limit {
            if let Some(retry_in) = self.rate_limit_remaining(now) {
                return DrainPoll::RateLimited { retry_in };
            }
        }

        self.purge_expired(now);

        let Some(priority) = Priority::DRAIN_ORDER
            .into_iter()
            .find(|p| !self.buckets[p.index()].is_empty())
        else {
            return DrainPoll::Empty;
        };

        let dispatch = self.take_dispatch(priority);
        self.len -= dispatch.len();
        self.metrics.set_depth(self.len);
        self.processing = true;
        self.last_dispatch = Some(now);
        DrainPoll::Ready(dispatch)
    }

    fn take_dispatch(&mut self, priority: Priority) -> Dispatch {
        let batch_size = self.config.batch_size;
        let bucket = &mut self.buckets[priority.index()];
        let Some(first) = bucket.pop_front() else {
            return Dispatch::Batch(Vec::new());
        };

        if priority == Priority::Urgent || !first.options.batchable || batch_size <= 1 {
            return Dispatch::Single(first);
        }

        let mut batch = vec![first];
        while batch.len() < batch_size && bucket.front().is_some_and(|m| m.options.batchable) {
            if let Some(next) = bucket.pop_front() {
                batch.push(next);
            }
        }

        if batch.len() == 1 {
            Dispatch::Single(batch.remove(0))
        } else {
            Dispatch::Batch(batch)
        }
    }

    /// Second drain phase: record the transport result
    ///
    /// Failed messages go back to the front of their bucket until they
    /// exhaust `max_retries` or the queue has no room for them; then they
    /// are counted failed and dropped. Returns how many were given up on.
    ///
    /// A [`TransportError::Partial`] counts its delivered prefix as
    /// processed; only the rest of the batch is retried.
    pub fn complete(
        &mut self,
        dispatch: Dispatch,
        result: Result<(), TransportError>,
        now: Instant,
    ) -> usize {
        self.processing = false;

        match result {
            Ok(()) => {
                for message in dispatch.messages() {
                    let latency = now.saturating_duration_since(message.enqueued_at);
                    self.metrics.record_processed(1, latency, self.len);
                }
                0
            }
            Err(err) => {
                let mut failed = dispatch.into_messages();
                let prefix = err.delivered().min(failed.len());
                let delivered: Vec<_> = failed.drain(..prefix).collect();
                for message in &delivered {
                    let latency = now.saturating_duration_since(message.enqueued_at);
                    self.metrics.record_processed(1, latency, self.len);
                }

                let mut given_up = 0;
                for mut message in failed.into_iter().rev() {
                    if message.retries < self.config.max_retries && self.len < self.config.max_size
                    {
                        message.retries += 1;
                        self.buckets[message.priority.index()].push_front(message);
                        self.len += 1;
                    } else {
                        given_up += 1;
                    }
                }
                self.metrics.set_depth(self.len);

                if given_up > 0 {
                    self.metrics.record_failed(given_up);
                    self.metrics.record_dropped(given_up, self.len);
                    log::warn!(
                        "Queue '{}' gave up on {} message(s): {}",
                        self.name,
                        given_up,
                        err
                    );
                    self.notify(QueueNotice::Error {
                        queue: self.name.clone(),
                        class: Some(self.class),
                        message: err.to_string(),
                    });
                } else {
                    log::debug!("Queue '{}' requeued failed dispatch: {}", self.name, err);
                }
                given_up
            }
        }
    }

    /// One rate-limited drain step through `handler`
    pub fn process<F>(&mut self, mut handler: F) -> ProcessOutcome
    where
        F: FnMut(&Dispatch) -> Result<(), TransportError>,
    {
        match self.begin_process(Instant::now()) {
            DrainPoll::Ready(dispatch) => self.run_dispatch(dispatch, &mut handler),
            DrainPoll::RateLimited { retry_in } => ProcessOutcome::RateLimited { retry_in },
            DrainPoll::Busy => ProcessOutcome::Busy,
            DrainPoll::Empty => ProcessOutcome::Empty,
        }
    }

    /// Drain everything through `handler`, ignoring the rate limit
    ///
    /// Returns the number of messages sent successfully.
    pub fn flush<F>(&mut self, mut handler: F) -> usize
    where
        F: FnMut(&Dispatch) -> Result<(), TransportError>,
    {
        let mut sent = 0;
        while let DrainPoll::Ready(dispatch) = self.begin(Instant::now(), false) {
            if let ProcessOutcome::Sent { count } = self.run_dispatch(dispatch, &mut handler) {
                sent += count;
            }
        }
        sent
    }

    fn run_dispatch<F>(&mut self, dispatch: Dispatch, handler: &mut F) -> ProcessOutcome
    where
        F: FnMut(&Dispatch) -> Result<(), TransportError>,
    {
        let count = dispatch.len();
        let result = handler(&dispatch);
        let ok = result.is_ok();
        let given_up = self.complete(dispatch, result, Instant::now());
        if ok {
            ProcessOutcome::Sent { count }
        } else {
            ProcessOutcome::SendFailed { count, given_up }
        }
    }

    /// Drop messages whose timeout has passed; returns how many
    pub fn purge_expired(&mut self, now: Instant) -> usize {
        let mut expired = 0;
        for bucket in self.buckets.iter_mut() {
            bucket.retain(|message| {
                let keep = !message.is_expired(now);
                if !keep {
                    expired += 1;
                }
                keep
            });
        }
        if expired > 0 {
            self.len -= expired;
            self.metrics.record_timed_out(expired, self.len);
            log::debug!("Queue '{}' expired {} message(s)", self.name, expired);
            self.notify(QueueNotice::Expired {
                queue: self.name.clone(),
                count: expired,
            });
        }
        expired
    }

    /// Cancel a pending message
    pub fn remove(&mut self, id: MessageId) -> QueueResult<QueuedMessage> {
        for bucket in self.buckets.iter_mut() {
            if let Some(pos) = bucket.iter().position(|m| m.id == id) {
                if let Some(message) = bucket.remove(pos) {
                    self.len -= 1;
                    self.metrics.record_dropped(1, self.len);
                    return Ok(message);
                }
            }
        }
        Err(QueueError::NotFound {
            queue: self.name.clone(),
            id,
        })
    }

    /// Remove every pending message; they count as dropped
    pub fn clear(&mut self) -> usize {
        let cleared = self.len;
        for bucket in self.buckets.iter_mut() {
            bucket.clear();
        }
        self.len = 0;
        self.metrics.record_dropped(cleared, 0);
        cleared
    }

    /// Change rate limit and capacity; queued messages are never trimmed
    pub fn reconfigure(&mut self, rate_limit_ms: u64, max_size: usize) {
        self.config.rate_limit_ms = rate_limit_ms;
        self.config.max_size = max_size.max(1);
        log::debug!(
            "Queue '{}' reconfigured: rate_limit={}ms max_size={}",
            self.name,
            self.config.rate_limit_ms,
            self.config.max_size
        );
    }

    pub fn set_overflow_strategy(&mut self, strategy: OverflowStrategy) {
        self.config.overflow_strategy = strategy;
    }

    fn rate_limit_remaining(&self, now: Instant) -> Option<Duration> {
        let rate_limit = self.config.rate_limit();
        if rate_limit.is_zero() {
            return None;
        }
        let ready_at = self.last_dispatch? + rate_limit;
        (now < ready_at).then(|| ready_at - now)
    }

    /// Earliest instant the next drain step can dispatch
    pub fn next_ready_at(&self, now: Instant) -> Instant {
        now + self.rate_limit_remaining(now).unwrap_or_default()
    }

    fn notify(&self, notice: QueueNotice) {
        emit(&self.notices, notice);
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn class(&self) -> TrafficClass {
        self.class
    }

    pub fn config(&self) -> &PriorityQueueConfig {
        &self.config
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn is_processing(&self) -> bool {
        self.processing
    }

    pub fn depths(&self) -> PriorityDepths {
        PriorityDepths {
            urgent: self.buckets[Priority::Urgent.index()].len(),
            high: self.buckets[Priority::High.index()].len(),
            medium: self.buckets[Priority::Medium.index()].len(),
            low: self.buckets[Priority::Low.index()].len(),
        }
    }

    /// Pending payload bytes
    pub fn memory_bytes(&self) -> usize {
        self.buckets
            .iter()
            .flat_map(|bucket| bucket.iter())
            .map(|message| message.payload.size_bytes())
            .sum()
    }

    /// Messages in drain order without removing them
    pub fn peek_all(&self) -> impl Iterator<Item = &QueuedMessage> {
        self.buckets.iter().flat_map(|bucket| bucket.iter())
    }

    pub fn metrics(&self) -> &QueueMetrics {
        &self.metrics
    }

    pub fn reset_metrics(&mut self) {
        self.metrics.reset();
    }

    pub fn snapshot(&self) -> OutboundSnapshot {
        OutboundSnapshot {
            name: self.name.clone(),
            class: self.class,
            depth: self.len,
            max_size: self.config.max_size,
            rate_limit_ms: self.config.rate_limit_ms,
            batch_size: self.config.batch_size,
            overflow_strategy: self.config.overflow_strategy,
            processing: self.processing,
            by_priority: self.depths(),
            memory_bytes: self.memory_bytes(),
            metrics: self.metrics.snapshot(),
        }
    }
}

impl std::fmt::Debug for PriorityQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PriorityQueue")
            .field("name", &self.name)
            .field("len", &self.len)
            .field("config", &self.config)
            .field("processing", &self.processing)
            .finish()
    }
}
