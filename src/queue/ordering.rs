//! Sequence ordering for realtime inbound traffic
//!
//! Tracks the next expected sequence number and holds messages that arrive
//! ahead of it. Deadlines for held messages live with the owning queue.

use crate::queue::message::ProcessingMessage;
use std::collections::BTreeMap;

/// Where an arriving sequence number falls relative to the expected one
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SequencePosition {
    Next,
    Future,
    Stale,
}

#[derive(Debug)]
pub struct OrderingBuffer {
    next_expected: u64,
    held: BTreeMap<u64, ProcessingMessage>,
}

impl OrderingBuffer {
    pub fn new(initial_sequence: u64) -> Self {
        Self {
            next_expected: initial_sequence,
            held: BTreeMap::new(),
        }
    }

    pub fn next_expected(&self) -> u64 {
        self.next_expected
    }

    pub fn classify(&self, sequence: u64) -> SequencePosition {
        use std::cmp::Ordering;
        match sequence.cmp(&self.next_expected) {
            Ordering::Equal => SequencePosition::Next,
            Ordering::Greater => SequencePosition::Future,
            Ordering::Less => SequencePosition::Stale,
        }
    }

    /// Mark `sequence` as delivered
    pub fn advance_past(&mut self, sequence: u64) {
        if sequence >= self.next_expected {
            self.next_expected = sequence + 1;
        }
    }

    /// Hold a future message; returns it back if the slot is taken
    pub fn hold(&mut self, sequence: u64, message: ProcessingMessage) -> Result<(), ProcessingMessage> {
        if self.held.contains_key(&sequence) {
            return Err(message);
        }
        self.held.insert(sequence, message);
        Ok(())
    }

    pub fn is_held(&self, sequence: u64) -> bool {
        self.held.contains_key(&sequence)
    }

    /// Pop the contiguous run starting at the expected sequence
    pub fn take_ready(&mut self) -> Vec<(u64, ProcessingMessage)> {
        let mut ready = Vec::new();
        while let Some(message) = self.held.remove(&self.next_expected) {
            ready.push((self.next_expected, message));
            self.next_expected += 1;
        }
        ready
    }

    /// Give up on the gap below `sequence`: release every held message up to
    /// and including it, then whatever run follows
    pub fn release_through(&mut self, sequence: u64) -> Vec<(u64, ProcessingMessage)> {
        let mut released = Vec::new();
        let keys: Vec<u64> = self.held.range(..=sequence).map(|(k, _)| *k).collect();
        for key in keys {
            if let Some(message) = self.held.remove(&key) {
                released.push((key, message));
            }
        }
        self.advance_past(sequence);
        released.extend(self.take_ready());
        released
    }

    /// Remove a held message without delivering it
    pub fn discard(&mut self, sequence: u64) -> Option<ProcessingMessage> {
        self.held.remove(&sequence)
    }

    /// Release everything in ascending order
    pub fn drain_all(&mut self) -> Vec<(u64, ProcessingMessage)> {
        let held = std::mem::take(&mut self.held);
        if let Some((last, _)) = held.iter().next_back() {
            self.advance_past(*last);
        }
        held.into_iter().collect()
    }

    pub fn held(&self) -> usize {
        self.held.len()
    }

    pub fn held_bytes(&self) -> usize {
        self.held.values().map(|m| m.payload.size_bytes()).sum()
    }

    pub fn reset(&mut self, next_expected: u64) -> usize {
        let dropped = self.held.len();
        self.held.clear();
        self.next_expected = next_expected;
        dropped
    }
}
