//! MessageQueueManager - orchestration of the per-class queues
//!
//! The manager owns one outbound [`PriorityQueue`] and one inbound
//! [`ProcessingQueue`] per [`TrafficClass`], an offline buffer, and the two
//! background loops that drive them:
//!
//! - the processing loop calls [`MessageQueueManager::process_tick`] every
//!   `processing_interval_ms`; it is the only thing that drains outbound
//!   queues and services inbound deadlines
//! - the health loop calls [`MessageQueueManager::check_health`] every
//!   `health_check_interval_ms` and reports transitions
//!
//! # Thread Safety
//!
//! Every queue sits behind its own `std::sync::Mutex`. Send and receive
//! hooks are always called with no outbound lock held; the receive hook runs
//! while its inbound queue is locked, so it must not call back into
//! `receive` for the same class. A panicking receive hook loses the message
//! it was handed but leaves the queue usable.
//!
//! # Example
//!
//! ```rust,no_run
//! use livequeue::queue::api::{ManagerConfig, MessageQueueManager, Payload, SendOptions, TrafficClass};
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let manager = Arc::new(MessageQueueManager::new(ManagerConfig::default()));
//! manager.set_send_handler(|class, dispatch| {
//!     println!("{} -> {} message(s)", class, dispatch.len());
//!     Ok(())
//! });
//! manager.start()?;
//! manager.send(TrafficClass::Text, Payload::from("hello"), SendOptions::default());
//! manager.destroy().await;
//! # Ok(())
//! # }
//! ```

use crate::core::shutdown::ShutdownCoordinator;
use crate::notifications::api::{
    publish_quietly, shared, ConnectionEvent, ConnectionEventType, Event, EventFilter,
    EventReceiver, HealthEvent, QueueEvent, QueueEventType, SharedNotifications, SystemEvent,
    SystemEventType,
};
use crate::queue::config::{ManagerConfig, PerClass};
use crate::queue::error::{ConsumerError, QueueError, QueueResult};
use crate::queue::handlers::{HandlerId, HandlerSlot};
use crate::queue::message::{MessageMetadata, Payload, ProcessingMessage, QueuedMessage};
use crate::queue::metrics::MetricsExport;
use crate::queue::notice::NoticeSink;
use crate::queue::offline::{OfflineBuffer, OfflineEntry};
use crate::queue::priority::{Dispatch, DrainPoll, OutboundSnapshot, PriorityQueue};
use crate::queue::processing::{InboundSnapshot, ProcessingQueue, Receipt};
use crate::queue::types::{ConnectionQuality, HealthStatus, SendOptions, TrafficClass};
use crate::transport::TransportError;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};
use std::time::Duration;
use strum::IntoEnumIterator;
use tokio::time::Instant;

/// Transport-facing send hook
pub type SendHook = dyn Fn(TrafficClass, &Dispatch) -> Result<(), TransportError> + Send + Sync;

/// Consumer-facing receive hook
pub type ReceiveHook =
    dyn Fn(TrafficClass, &ProcessingMessage) -> Result<Option<Payload>, ConsumerError> + Send + Sync;

/// Memory use above this share of the budget degrades health
const MEMORY_DEGRADED_RATIO: f64 = 0.8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ConnectionState {
    pub connected: bool,
    pub quality: ConnectionQuality,
}

impl ConnectionState {
    pub fn is_online(&self) -> bool {
        self.connected && self.quality != ConnectionQuality::Offline
    }
}

impl Default for ConnectionState {
    fn default() -> Self {
        Self {
            connected: true,
            quality: ConnectionQuality::Good,
        }
    }
}

/// What one processing tick did
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickSummary {
    pub dispatched: usize,
    pub delivered: usize,
}

#[derive(Default)]
struct TransmissionCounters {
    sent_messages: AtomicU64,
    sent_batches: AtomicU64,
    direct_sends: AtomicU64,
    send_errors: AtomicU64,
    received: AtomicU64,
    rejected: AtomicU64,
    offline_buffered: AtomicU64,
    offline_replayed: AtomicU64,
}

/// Transmission counters since the manager was created
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransmissionStats {
    pub sent_messages: u64,
    pub sent_batches: u64,
    pub direct_sends: u64,
    pub send_errors: u64,
    pub received: u64,
    pub rejected: u64,
    pub offline_buffered: u64,
    pub offline_replayed: u64,
}

impl TransmissionCounters {
    fn snapshot(&self) -> TransmissionStats {
        TransmissionStats {
            sent_messages: self.sent_messages.load(Ordering::Relaxed),
            sent_batches: self.sent_batches.load(Ordering::Relaxed),
            direct_sends: self.direct_sends.load(Ordering::Relaxed),
            send_errors: self.send_errors.load(Ordering::Relaxed),
            received: self.received.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
            offline_buffered: self.offline_buffered.load(Ordering::Relaxed),
            offline_replayed: self.offline_replayed.load(Ordering::Relaxed),
        }
    }
}

/// Read-only view of the whole manager
#[derive(Debug, Clone, Serialize)]
pub struct ManagerStatus {
    pub enabled: bool,
    pub running: bool,
    pub connection: ConnectionState,
    pub tuned_for: ConnectionQuality,
    pub health: HealthStatus,
    pub outbound: Vec<OutboundSnapshot>,
    pub inbound: Vec<InboundSnapshot>,
    pub offline_buffered: usize,
    pub offline_evicted: u64,
    pub memory_bytes: usize,
    pub transmission: TransmissionStats,
    pub metrics: MetricsExport,
}

impl ManagerStatus {
    pub fn outbound(&self, class: TrafficClass) -> Option<&OutboundSnapshot> {
        self.outbound.iter().find(|q| q.class == class)
    }

    pub fn inbound(&self, class: TrafficClass) -> Option<&InboundSnapshot> {
        self.inbound.iter().find(|q| q.class == class)
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

struct Lane {
    outbound: Mutex<PriorityQueue>,
    inbound: Mutex<ProcessingQueue>,
}

impl Lane {
    // A consumer that panics poisons the inbound lock it ran under; the
    // queue state is still usable, so later calls carry on with it.
    fn outbound(&self) -> MutexGuard<'_, PriorityQueue> {
        self.outbound.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn inbound(&self) -> MutexGuard<'_, ProcessingQueue> {
        self.inbound.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

pub struct MessageQueueManager {
    config: ManagerConfig,
    enabled: AtomicBool,
    lanes: PerClass<Lane>,
    offline: Mutex<OfflineBuffer>,
    connection: RwLock<ConnectionState>,
    tuned_for: Mutex<ConnectionQuality>,
    health: Mutex<HealthStatus>,
    memory_pressure: AtomicBool,
    /// Quality the queues were tuned for before a send error forced Poor
    relaxed_quality: Mutex<Option<ConnectionQuality>>,
    send_hook: HandlerSlot<SendHook>,
    receive_hook: Arc<HandlerSlot<ReceiveHook>>,
    notifications: SharedNotifications,
    counters: TransmissionCounters,
    loops: Mutex<Option<ShutdownCoordinator>>,
}

impl MessageQueueManager {
    pub fn new(config: ManagerConfig) -> Self {
        let notifications = shared();
        let receive_hook: Arc<HandlerSlot<ReceiveHook>> = Arc::new(HandlerSlot::new("receive"));

        let lanes = PerClass::from_fn(|class| {
            let sink = notice_sink(&notifications);
            let outbound = PriorityQueue::new(class, config.outbound.get(class).clone())
                .with_thresholds(config.health)
                .with_notice_sink(sink.clone());

            let hook = Arc::clone(&receive_hook);
            let consumer = move |message: &ProcessingMessage| match hook.get() {
                Some(handler) => handler(class, message),
                None => Err(ConsumerError::new(format!(
                    "no receive handler for {} traffic",
                    class
                ))),
            };
            let inbound = ProcessingQueue::new(class, config.inbound.get(class).clone(), consumer)
                .with_thresholds(config.health)
                .with_notice_sink(sink);

            Lane {
                outbound: Mutex::new(outbound),
                inbound: Mutex::new(inbound),
            }
        });

        log::debug!(
            "Message queue manager created (enabled={}, auto_tuning={}, interval={}ms)",
            config.enabled,
            config.auto_tuning,
            config.processing_interval_ms
        );

        Self {
            enabled: AtomicBool::new(config.enabled),
            offline: Mutex::new(OfflineBuffer::new(config.offline_buffer_size)),
            config,
            lanes,
            connection: RwLock::new(ConnectionState::default()),
            tuned_for: Mutex::new(ConnectionQuality::Good),
            health: Mutex::new(HealthStatus::Healthy),
            memory_pressure: AtomicBool::new(false),
            relaxed_quality: Mutex::new(None),
            send_hook: HandlerSlot::new("send"),
            receive_hook,
            notifications,
            counters: TransmissionCounters::default(),
            loops: Mutex::new(None),
        }
    }

    fn lane(&self, class: TrafficClass) -> &Lane {
        self.lanes.get(class)
    }

    pub fn config(&self) -> &ManagerConfig {
        &self.config
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }

    /// Switch between queued operation and pure passthrough
    pub fn set_enabled(&self, enabled: bool) {
        let previous = self.enabled.swap(enabled, Ordering::AcqRel);
        if previous != enabled {
            log::info!(
                "Message queueing {}",
                if enabled { "enabled" } else { "disabled" }
            );
        }
    }

    // ---- hooks and observers ----

    pub fn set_send_handler<F>(&self, handler: F) -> HandlerId
    where
        F: Fn(TrafficClass, &Dispatch) -> Result<(), TransportError> + Send + Sync + 'static,
    {
        let handler: Arc<SendHook> = Arc::new(handler);
        self.send_hook.set(handler)
    }

    pub fn clear_send_handler(&self, id: HandlerId) -> bool {
        self.send_hook.clear(id)
    }

    pub fn set_receive_handler<F>(&self, handler: F) -> HandlerId
    where
        F: Fn(TrafficClass, &ProcessingMessage) -> Result<Option<Payload>, ConsumerError>
            + Send
            + Sync
            + 'static,
    {
        let handler: Arc<ReceiveHook> = Arc::new(handler);
        self.receive_hook.set(handler)
    }

    pub fn clear_receive_handler(&self, id: HandlerId) -> bool {
        self.receive_hook.clear(id)
    }

    pub fn subscribe(
        &self,
        subscriber_id: impl Into<String>,
        filter: EventFilter,
        source: impl Into<String>,
    ) -> EventReceiver {
        self.notifications
            .lock()
            .unwrap()
            .subscribe(subscriber_id.into(), filter, source.into())
    }

    pub fn unsubscribe(&self, subscriber_id: &str) -> bool {
        self.notifications.lock().unwrap().unsubscribe(subscriber_id)
    }

    /// Publish an event on the manager's channel
    pub fn publish(&self, event: Event) {
        publish_quietly(&self.notifications, event);
    }

    pub fn notifications(&self) -> SharedNotifications {
        Arc::clone(&self.notifications)
    }

    // ---- outbound ----

    /// Queue `payload` for sending; false when it was rejected
    ///
    /// Disabled managers hand the message straight to the send hook. While
    /// offline, everything except control traffic goes to the offline
    /// buffer.
    pub fn send(&self, class: TrafficClass, payload: Payload, options: SendOptions) -> bool {
        if !self.is_enabled() {
            return self.dispatch_now(class, payload, options);
        }

        if !self.connection().is_online() {
            if class == TrafficClass::Control {
                let err = QueueError::Offline { class };
                log::warn!("{}", err);
                self.counters.rejected.fetch_add(1, Ordering::Relaxed);
                return false;
            }
            self.offline.lock().unwrap().push(class, payload, options);
            self.counters.offline_buffered.fetch_add(1, Ordering::Relaxed);
            return true;
        }

        let result = self.lane(class).outbound().enqueue(payload, None, options);
        match result {
            Ok(_) => true,
            Err(err) => {
                log::debug!("Send rejected: {}", err);
                self.counters.rejected.fetch_add(1, Ordering::Relaxed);
                false
            }
        }
    }

    /// Bypass the queues entirely (audio capture path)
    pub fn send_direct(&self, class: TrafficClass, payload: Payload) -> bool {
        self.counters.direct_sends.fetch_add(1, Ordering::Relaxed);
        self.dispatch_now(class, payload, SendOptions::for_class(class))
    }

    fn dispatch_now(&self, class: TrafficClass, payload: Payload, options: SendOptions) -> bool {
        let Some(hook) = self.send_hook.get() else {
            log::warn!("{}", QueueError::NoHandler { hook: "send" });
            return false;
        };

        let out_config = self.config.outbound.get(class);
        let message = QueuedMessage::new(
            class,
            payload,
            out_config.priority,
            options,
            out_config.timeout(),
            Instant::now(),
        );
        match hook(class, &Dispatch::Single(message)) {
            Ok(()) => {
                self.counters.sent_messages.fetch_add(1, Ordering::Relaxed);
                true
            }
            Err(err) => {
                self.on_send_error(class, &err);
                false
            }
        }
    }

    /// Drain one class until it is rate-limited, empty or the send fails
    fn drain_outbound(&self, class: TrafficClass, hook: &SendHook, now: Instant) -> usize {
        let lane = self.lane(class);
        let mut sent = 0;

        loop {
            let poll = lane.outbound().begin_process(now);
            let DrainPoll::Ready(dispatch) = poll else {
                break;
            };

            let count = dispatch.len();
            let is_batch = dispatch.is_batch();
            let result = hook(class, &dispatch);
            let failure = result.as_ref().err().cloned();
            lane.outbound().complete(dispatch, result, Instant::now());

            match failure {
                None => {
                    sent += count;
                    self.counters
                        .sent_messages
                        .fetch_add(count as u64, Ordering::Relaxed);
                    if is_batch {
                        self.counters.sent_batches.fetch_add(1, Ordering::Relaxed);
                    }
                    self.relax_conservative_settings();
                }
                Some(err) => {
                    let delivered = err.delivered();
                    sent += delivered;
                    self.counters
                        .sent_messages
                        .fetch_add(delivered as u64, Ordering::Relaxed);
                    self.on_send_error(class, &err);
                    break;
                }
            }
        }
        sent
    }

    fn on_send_error(&self, class: TrafficClass, err: &TransportError) {
        self.counters.send_errors.fetch_add(1, Ordering::Relaxed);
        log::warn!("Send failed for {} traffic: {}", class, err);
        let state = self.connection();
        self.publish(Event::Connection(ConnectionEvent::with_message(
            ConnectionEventType::SendFailed,
            state.connected,
            state.quality,
            err.to_string(),
        )));
        self.apply_conservative_settings();
    }

    // ---- inbound ----

    /// Route an inbound message to its class's processing queue
    pub fn receive(&self, class: TrafficClass, payload: Payload, metadata: MessageMetadata) -> Receipt {
        self.counters.received.fetch_add(1, Ordering::Relaxed);

        if !self.is_enabled() {
            let message = ProcessingMessage::new(payload, metadata, Instant::now());
            let Some(hook) = self.receive_hook.get() else {
                log::warn!("{}", QueueError::NoHandler { hook: "receive" });
                return Receipt::Failed;
            };
            return match hook(class, &message) {
                Ok(result) => Receipt::Processed(result),
                Err(err) => {
                    log::warn!("Consumer failed for {} traffic: {}", class, err);
                    Receipt::Failed
                }
            };
        }

        self.lane(class).inbound().enqueue(payload, metadata)
    }

    /// Forget the inbound ordering state of `class`
    pub fn reset_sequence(&self, class: TrafficClass, next_expected: u64) {
        self.lane(class).inbound().reset_sequence(next_expected);
    }

    // ---- loops ----

    /// One pass of the processing loop
    ///
    /// Drains every outbound queue (unless offline or no send hook is
    /// installed) in class priority order, then services inbound deadlines.
    pub fn process_tick(&self) -> TickSummary {
        let mut summary = TickSummary::default();
        if !self.is_enabled() {
            return summary;
        }
        let now = Instant::now();

        if self.connection().is_online() {
            if let Some(hook) = self.send_hook.get() {
                for class in TrafficClass::iter() {
                    summary.dispatched += self.drain_outbound(class, hook.as_ref(), now);
                }
            }
        }

        for class in TrafficClass::iter() {
            summary.delivered += self.lane(class).inbound().tick(now);
        }

        if self.config.debug_mode && summary != TickSummary::default() {
            log::debug!(
                "Tick: dispatched {} message(s), delivered {}",
                summary.dispatched,
                summary.delivered
            );
        }
        summary
    }

    /// Recompute aggregate health and report a transition
    pub fn check_health(&self) -> HealthStatus {
        let mut current = self.metrics_export().health;

        let budget = self.config.max_memory_bytes();
        if budget > 0 {
            let used = self.memory_bytes();
            let ratio = used as f64 / budget as f64;
            if ratio >= 1.0 {
                current = HealthStatus::Critical;
            } else if ratio >= MEMORY_DEGRADED_RATIO {
                current = current.max(HealthStatus::Degraded);
            }
            let pressured = ratio >= MEMORY_DEGRADED_RATIO;
            if self.memory_pressure.swap(pressured, Ordering::AcqRel) != pressured {
                if pressured {
                    log::warn!("Memory pressure: {} of {} bytes queued", used, budget);
                    self.publish(Event::Health(HealthEvent::memory_pressure(
                        current,
                        format!("{} of {} bytes queued", used, budget),
                    )));
                } else {
                    log::info!("Memory pressure relieved ({} of {} bytes queued)", used, budget);
                }
            }
        }

        let previous = std::mem::replace(&mut *self.health.lock().unwrap(), current);
        if previous != current {
            if current == HealthStatus::Critical {
                log::warn!("Queue health {} -> {}", previous, current);
            } else {
                log::info!("Queue health {} -> {}", previous, current);
            }
            self.publish(Event::Health(HealthEvent::changed(previous, current)));
        } else if self.config.debug_mode {
            log::debug!("Queue health {}", current);
        }
        current
    }

    /// Spawn the processing and health loops; needs a tokio runtime
    pub fn start(self: &Arc<Self>) -> QueueResult<()> {
        if !self.is_enabled() {
            return Err(QueueError::Disabled);
        }
        if tokio::runtime::Handle::try_current().is_err() {
            return Err(QueueError::NoRuntime);
        }

        let mut loops = self.loops.lock().unwrap();
        if loops.is_some() {
            return Ok(());
        }

        let mut coordinator = ShutdownCoordinator::new();

        let weak = Arc::downgrade(self);
        coordinator.spawn_loop("processing", self.config.processing_interval(), move || {
            if let Some(manager) = weak.upgrade() {
                manager.process_tick();
            }
        });

        let weak = Arc::downgrade(self);
        coordinator.spawn_loop("health", self.config.health_check_interval(), move || {
            if let Some(manager) = weak.upgrade() {
                manager.check_health();
            }
        });

        *loops = Some(coordinator);
        drop(loops);

        log::info!("Message queue loops started");
        self.publish(Event::System(SystemEvent::new(SystemEventType::Startup)));
        Ok(())
    }

    pub fn is_running(&self) -> bool {
        self.loops.lock().unwrap().is_some()
    }

    /// Stop the background loops and wait for them to exit
    pub async fn stop(&self) {
        let loops = self.loops.lock().unwrap().take();
        if let Some(coordinator) = loops {
            let total = coordinator.loop_count();
            let clean = coordinator.shutdown().await;
            log::debug!("Message queue loops stopped ({} of {} cleanly)", clean, total);
        }
    }

    /// Stop, deliver what inbound queues hold, drop everything outbound
    pub async fn destroy(&self) {
        self.stop().await;

        let mut delivered = 0;
        let mut cleared = 0;
        for class in TrafficClass::iter() {
            let lane = self.lane(class);
            delivered += lane.inbound().flush();
            cleared += lane.outbound().clear();
        }
        let offline = self.offline.lock().unwrap().clear();

        self.send_hook.reset();
        self.receive_hook.reset();

        log::info!(
            "Message queue manager destroyed: delivered {} held inbound, dropped {} outbound and {} offline",
            delivered,
            cleared,
            offline
        );
        self.publish(Event::System(SystemEvent::with_message(
            SystemEventType::Shutdown,
            format!("dropped {} outbound message(s)", cleared + offline),
        )));
    }

    // ---- connection handling ----

    pub fn connection(&self) -> ConnectionState {
        *self.connection.read().unwrap()
    }

    /// Record a connection change
    ///
    /// Going back online replays the offline buffer in arrival order. With
    /// `auto_tuning`, the outbound queues are retuned for the new quality.
    pub fn set_connection_state(self: &Arc<Self>, connected: bool, quality: ConnectionQuality) {
        let next = ConnectionState {
            connected,
            quality: if connected {
                quality
            } else {
                ConnectionQuality::Offline
            },
        };
        let previous = std::mem::replace(&mut *self.connection.write().unwrap(), next);
        if previous == next {
            return;
        }

        let event_type = match (previous.is_online(), next.is_online()) {
            (false, true) => ConnectionEventType::Online,
            (true, false) => ConnectionEventType::Offline,
            _ => ConnectionEventType::QualityChanged,
        };
        log::info!("Connection quality {} -> {}", previous.quality, next.quality);
        self.publish(Event::Connection(ConnectionEvent::new(
            event_type,
            next.connected,
            next.quality,
        )));

        if self.config.auto_tuning && next.is_online() && previous.quality != next.quality {
            self.relaxed_quality.lock().unwrap().take();
            self.retune(next.quality);
        }

        if !previous.is_online() && next.is_online() {
            self.flush_offline();
        }
    }

    fn retune(&self, quality: ConnectionQuality) {
        for class in TrafficClass::iter() {
            let baseline = self.config.outbound.get(class);
            let (rate_limit_ms, max_size) = baseline.tuned_for(class, quality);
            self.lane(class).outbound().reconfigure(rate_limit_ms, max_size);
        }
        *self.tuned_for.lock().unwrap() = quality;

        log::info!("Outbound queues tuned for {} connection", quality);
        let state = self.connection();
        self.publish(Event::Connection(ConnectionEvent::with_message(
            ConnectionEventType::Retuned,
            state.connected,
            state.quality,
            format!("tuned for {}", quality),
        )));
    }

    /// Slow down and shrink the media queues as for a poor connection
    ///
    /// The previous tuning comes back after the next successful dispatch,
    /// unless a connection quality change retunes the queues first.
    pub fn apply_conservative_settings(&self) {
        let previous = *self.tuned_for.lock().unwrap();
        if previous == ConnectionQuality::Poor {
            return;
        }
        log::info!("Applying conservative queue settings");
        *self.relaxed_quality.lock().unwrap() = Some(previous);
        self.retune(ConnectionQuality::Poor);
    }

    fn relax_conservative_settings(&self) {
        let Some(quality) = self.relaxed_quality.lock().unwrap().take() else {
            return;
        };
        log::info!("Sends recovered; restoring queue settings for {} connection", quality);
        self.retune(quality);
    }

    fn flush_offline(self: &Arc<Self>) {
        let entries = self.offline.lock().unwrap().drain();
        if entries.is_empty() {
            return;
        }

        let delay = self.config.offline_flush_delay();
        match tokio::runtime::Handle::try_current() {
            Ok(handle) if !delay.is_zero() => {
                let manager = Arc::clone(self);
                handle.spawn(async move {
                    manager.replay_offline(entries, delay).await;
                });
            }
            _ => {
                for entry in entries {
                    self.replay_entry(entry);
                }
                self.report_offline_flushed();
            }
        }
    }

    async fn replay_offline(&self, entries: Vec<OfflineEntry>, delay: Duration) {
        for (index, entry) in entries.into_iter().enumerate() {
            if index > 0 {
                tokio::time::sleep(delay).await;
            }
            self.replay_entry(entry);
        }
        self.report_offline_flushed();
    }

    fn replay_entry(&self, entry: OfflineEntry) {
        self.counters.offline_replayed.fetch_add(1, Ordering::Relaxed);
        self.send(entry.class, entry.payload, entry.options);
    }

    fn report_offline_flushed(&self) {
        let state = self.connection();
        let replayed = self.counters.offline_replayed.load(Ordering::Relaxed);
        log::info!("Offline buffer replayed ({} total)", replayed);
        self.publish(Event::Connection(ConnectionEvent::new(
            ConnectionEventType::OfflineFlushed,
            state.connected,
            state.quality,
        )));
    }

    // ---- recovery and inspection ----

    /// Drop everything queued outbound for `class`
    pub fn clear_queue(&self, class: TrafficClass) -> usize {
        let cleared = self.lane(class).outbound().clear();
        if cleared > 0 {
            log::info!("Cleared {} queued {} message(s)", cleared, class);
        }
        self.publish(Event::Queue(QueueEvent::with_count(
            QueueEventType::Cleared,
            class.to_string(),
            cleared,
        )));
        cleared
    }

    pub fn reset_metrics(&self) {
        for class in TrafficClass::iter() {
            let lane = self.lane(class);
            lane.outbound().reset_metrics();
            lane.inbound().reset_metrics();
        }
    }

    pub fn queue_depth(&self, class: TrafficClass) -> usize {
        self.lane(class).outbound().len()
    }

    pub fn inbound_depth(&self, class: TrafficClass) -> usize {
        self.lane(class).inbound().depth()
    }

    pub fn offline_len(&self) -> usize {
        self.offline.lock().unwrap().len()
    }

    pub fn health(&self) -> HealthStatus {
        *self.health.lock().unwrap()
    }

    pub fn tuned_for(&self) -> ConnectionQuality {
        *self.tuned_for.lock().unwrap()
    }

    pub fn transmission(&self) -> TransmissionStats {
        self.counters.snapshot()
    }

    pub fn memory_bytes(&self) -> usize {
        let queued: usize = TrafficClass::iter()
            .map(|class| {
                let lane = self.lane(class);
                lane.outbound().memory_bytes()
                    + lane.inbound().memory_bytes()
            })
            .sum();
        queued + self.offline.lock().unwrap().memory_bytes()
    }

    pub fn metrics_export(&self) -> MetricsExport {
        let mut snapshots = Vec::new();
        for class in TrafficClass::iter() {
            let lane = self.lane(class);
            snapshots.push(lane.outbound().metrics().snapshot());
            snapshots.push(lane.inbound().metrics().snapshot());
        }
        MetricsExport::from_snapshots(snapshots)
    }

    pub fn status(&self) -> ManagerStatus {
        let outbound: Vec<OutboundSnapshot> = TrafficClass::iter()
            .map(|class| self.lane(class).outbound().snapshot())
            .collect();
        let inbound: Vec<InboundSnapshot> = TrafficClass::iter()
            .map(|class| self.lane(class).inbound().snapshot())
            .collect();
        let metrics = MetricsExport::from_snapshots(
            outbound
                .iter()
                .map(|q| q.metrics.clone())
                .chain(inbound.iter().map(|q| q.metrics.clone()))
                .collect(),
        );
        let (offline_buffered, offline_evicted) = {
            let offline = self.offline.lock().unwrap();
            (offline.len(), offline.evicted())
        };

        ManagerStatus {
            enabled: self.is_enabled(),
            running: self.is_running(),
            connection: self.connection(),
            tuned_for: self.tuned_for(),
            health: self.health(),
            outbound,
            inbound,
            offline_buffered,
            offline_evicted,
            memory_bytes: self.memory_bytes(),
            transmission: self.transmission(),
            metrics,
        }
    }
}

fn notice_sink(notifications: &SharedNotifications) -> NoticeSink {
    let notifications = Arc::clone(notifications);
    Arc::new(move |notice| publish_quietly(&notifications, Event::Queue(QueueEvent::from(notice))))
}
