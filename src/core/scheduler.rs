//! Deadline scheduling
//!
//! Queues never block and never sleep. Anything that has to happen "later"
//! (a buffered flush, a chunk-assembly timeout, an ordering window) is a
//! keyed deadline in a [`TimerSet`]; the owner polls it with the current
//! instant and services whatever is due. Deadlines can be cancelled or moved
//! at any time.
//!
//! [`spawn_repeating`] covers the other half: a fixed-period tokio task that
//! drives those polls and stops on a shutdown broadcast.

use std::collections::{BTreeSet, HashMap};
use std::hash::Hash;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

/// Keyed set of cancellable, reschedulable deadlines
#[derive(Debug)]
pub struct TimerSet<K> {
    by_key: HashMap<K, (Instant, u64)>,
    by_deadline: BTreeSet<(Instant, u64)>,
    keys_by_ticket: HashMap<u64, K>,
    next_ticket: u64,
}

impl<K> Default for TimerSet<K>
where
    K: Eq + Hash + Clone,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K> TimerSet<K>
where
    K: Eq + Hash + Clone,
{
    pub fn new() -> Self {
        Self {
            by_key: HashMap::new(),
            by_deadline: BTreeSet::new(),
            keys_by_ticket: HashMap::new(),
            next_ticket: 0,
        }
    }

    /// Schedule `key` at `deadline`, replacing any earlier schedule for it
    pub fn schedule(&mut self, key: K, deadline: Instant) {
        self.cancel(&key);
        let ticket = self.next_ticket;
        self.next_ticket += 1;
        self.by_deadline.insert((deadline, ticket));
        self.keys_by_ticket.insert(ticket, key.clone());
        self.by_key.insert(key, (deadline, ticket));
    }

    /// Schedule `key` only if it has no deadline yet
    pub fn schedule_if_absent(&mut self, key: K, deadline: Instant) {
        if !self.by_key.contains_key(&key) {
            self.schedule(key, deadline);
        }
    }

    /// Remove the deadline for `key`; returns true when one existed
    pub fn cancel(&mut self, key: &K) -> bool {
        match self.by_key.remove(key) {
            Some((deadline, ticket)) => {
                self.by_deadline.remove(&(deadline, ticket));
                self.keys_by_ticket.remove(&ticket);
                true
            }
            None => false,
        }
    }

    pub fn deadline(&self, key: &K) -> Option<Instant> {
        self.by_key.get(key).map(|(deadline, _)| *deadline)
    }

    /// Earliest pending deadline
    pub fn next_deadline(&self) -> Option<Instant> {
        self.by_deadline.iter().next().map(|(deadline, _)| *deadline)
    }

    /// Remove and return every key due at or before `now`, earliest first
    pub fn pop_due(&mut self, now: Instant) -> Vec<K> {
        let mut due = Vec::new();
        while let Some(&(deadline, ticket)) = self.by_deadline.iter().next() {
            if deadline > now {
                break;
            }
            self.by_deadline.remove(&(deadline, ticket));
            if let Some(key) = self.keys_by_ticket.remove(&ticket) {
                self.by_key.remove(&key);
                due.push(key);
            }
        }
        due
    }

    pub fn len(&self) -> usize {
        self.by_key.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_key.is_empty()
    }

    pub fn clear(&mut self) {
        self.by_key.clear();
        self.by_deadline.clear();
        self.keys_by_ticket.clear();
    }
}

/// Spawn a task that calls `tick` every `period` until shutdown is broadcast
///
/// Missed ticks are delayed rather than bursted so a stalled runtime does not
/// produce a flood of back-to-back drains.
pub fn spawn_repeating<F>(
    name: &'static str,
    period: Duration,
    mut shutdown_rx: broadcast::Receiver<()>,
    mut tick: F,
) -> JoinHandle<()>
where
    F: FnMut() + Send + 'static,
{
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        log::debug!("Loop '{}' started with period {:?}", name, period);
        loop {
            tokio::select! {
                _ = interval.tick() => tick(),
                _ = shutdown_rx.recv() => break,
            }
        }
        log::debug!("Loop '{}' stopped", name);
    })
}
