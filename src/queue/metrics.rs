//! Queue metrics and health classification
//!
//! Every queue owns a [`QueueMetrics`] and updates it synchronously with
//! each state transition, so the counters always agree with the queue:
//! `queued == processed + dropped + timed_out + current_depth`.

use crate::queue::types::HealthStatus;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::time::Duration;
use tokio::time::Instant;

/// Number of latency samples kept for the rolling average
pub const LATENCY_WINDOW: usize = 100;

/// Thresholds deriving [`HealthStatus`] from metrics
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HealthThresholds {
    pub degraded_drop_rate: f64,
    pub critical_drop_rate: f64,
    pub degraded_depth: usize,
    pub critical_depth: usize,
    pub degraded_latency_ms: f64,
    pub critical_latency_ms: f64,
}

impl Default for HealthThresholds {
    fn default() -> Self {
        Self {
            degraded_drop_rate: 0.05,
            critical_drop_rate: 0.15,
            degraded_depth: 50,
            critical_depth: 100,
            degraded_latency_ms: 100.0,
            critical_latency_ms: 500.0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct QueueMetrics {
    name: String,
    thresholds: HealthThresholds,
    queued: u64,
    processed: u64,
    dropped: u64,
    timed_out: u64,
    failed: u64,
    overflows: u64,
    current_depth: usize,
    peak_depth: usize,
    latencies: VecDeque<Duration>,
    last_reset: Instant,
}

impl QueueMetrics {
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_thresholds(name, HealthThresholds::default())
    }

    pub fn with_thresholds(name: impl Into<String>, thresholds: HealthThresholds) -> Self {
        Self {
            name: name.into(),
            thresholds,
            queued: 0,
            processed: 0,
            dropped: 0,
            timed_out: 0,
            failed: 0,
            overflows: 0,
            current_depth: 0,
            peak_depth: 0,
            latencies: VecDeque::with_capacity(LATENCY_WINDOW),
            last_reset: Instant::now(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn record_enqueued(&mut self, depth: usize) {
        self.queued += 1;
        self.set_depth(depth);
    }

    pub fn record_processed(&mut self, count: usize, latency: Duration, depth: usize) {
        self.processed += count as u64;
        if self.latencies.len() == LATENCY_WINDOW {
            self.latencies.pop_front();
        }
        self.latencies.push_back(latency);
        self.set_depth(depth);
    }

    pub fn record_dropped(&mut self, count: usize, depth: usize) {
        self.dropped += count as u64;
        self.set_depth(depth);
    }

    pub fn record_timed_out(&mut self, count: usize, depth: usize) {
        self.timed_out += count as u64;
        self.set_depth(depth);
    }

    /// A delivery failure; the caller separately records the message as
    /// dropped once it is given up on
    pub fn record_failed(&mut self, count: usize) {
        self.failed += count as u64;
    }

    pub fn record_overflow(&mut self) {
        self.overflows += 1;
    }

    pub fn set_depth(&mut self, depth: usize) {
        self.current_depth = depth;
        self.peak_depth = self.peak_depth.max(depth);
    }

    pub fn queued(&self) -> u64 {
        self.queued
    }

    pub fn processed(&self) -> u64 {
        self.processed
    }

    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    pub fn timed_out(&self) -> u64 {
        self.timed_out
    }

    pub fn failed(&self) -> u64 {
        self.failed
    }

    pub fn overflows(&self) -> u64 {
        self.overflows
    }

    pub fn current_depth(&self) -> usize {
        self.current_depth
    }

    pub fn peak_depth(&self) -> usize {
        self.peak_depth
    }

    /// Rolling average over the last [`LATENCY_WINDOW`] samples
    pub fn average_latency(&self) -> Duration {
        if self.latencies.is_empty() {
            return Duration::ZERO;
        }
        let total: Duration = self.latencies.iter().sum();
        total / self.latencies.len() as u32
    }

    /// Fraction of queued messages that were dropped
    pub fn drop_rate(&self) -> f64 {
        if self.queued == 0 {
            0.0
        } else {
            self.dropped as f64 / self.queued as f64
        }
    }

    pub fn health(&self) -> HealthStatus {
        let t = &self.thresholds;
        let drop_rate = self.drop_rate();
        let latency_ms = self.average_latency().as_secs_f64() * 1000.0;

        if drop_rate > t.critical_drop_rate
            || self.current_depth > t.critical_depth
            || latency_ms > t.critical_latency_ms
        {
            HealthStatus::Critical
        } else if drop_rate > t.degraded_drop_rate
            || self.current_depth > t.degraded_depth
            || latency_ms > t.degraded_latency_ms
        {
            HealthStatus::Degraded
        } else {
            HealthStatus::Healthy
        }
    }

    /// Zero every counter and the latency window
    ///
    /// The current depth is kept since the messages are still queued; the
    /// accounting identity restarts from that depth.
    pub fn reset(&mut self) {
        let depth = self.current_depth;
        self.queued = depth as u64;
        self.processed = 0;
        self.dropped = 0;
        self.timed_out = 0;
        self.failed = 0;
        self.overflows = 0;
        self.peak_depth = depth;
        self.latencies.clear();
        self.last_reset = Instant::now();
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            name: self.name.clone(),
            queued: self.queued,
            processed: self.processed,
            dropped: self.dropped,
            timed_out: self.timed_out,
            failed: self.failed,
            overflows: self.overflows,
            current_depth: self.current_depth,
            peak_depth: self.peak_depth,
            average_latency_ms: self.average_latency().as_secs_f64() * 1000.0,
            drop_rate: self.drop_rate(),
            health: self.health(),
            seconds_since_reset: self.last_reset.elapsed().as_secs_f64(),
        }
    }
}

/// Point-in-time copy of one queue's metrics
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricsSnapshot {
    pub name: String,
    pub queued: u64,
    pub processed: u64,
    pub dropped: u64,
    pub timed_out: u64,
    pub failed: u64,
    pub overflows: u64,
    pub current_depth: usize,
    pub peak_depth: usize,
    pub average_latency_ms: f64,
    pub drop_rate: f64,
    pub health: HealthStatus,
    pub seconds_since_reset: f64,
}

/// Metrics for a set of queues plus the aggregate health
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricsExport {
    pub health: HealthStatus,
    pub total_queued: u64,
    pub total_processed: u64,
    pub total_dropped: u64,
    pub queues: Vec<MetricsSnapshot>,
}

impl MetricsExport {
    pub fn from_snapshots(queues: Vec<MetricsSnapshot>) -> Self {
        Self {
            health: aggregate_health(queues.iter().map(|q| q.health)),
            total_queued: queues.iter().map(|q| q.queued).sum(),
            total_processed: queues.iter().map(|q| q.processed).sum(),
            total_dropped: queues.iter().map(|q| q.dropped).sum(),
            queues,
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

/// Worst status wins; an empty set is healthy
pub fn aggregate_health<I>(statuses: I) -> HealthStatus
where
    I: IntoIterator<Item = HealthStatus>,
{
    statuses.into_iter().max().unwrap_or_default()
}
