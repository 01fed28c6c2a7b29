//! Bounded FIFO buffer for messages sent while offline

use crate::queue::message::Payload;
use crate::queue::types::{SendOptions, TrafficClass};
use std::collections::VecDeque;
use tokio::time::Instant;

#[derive(Debug, Clone)]
pub struct OfflineEntry {
    pub class: TrafficClass,
    pub payload: Payload,
    pub options: SendOptions,
    pub buffered_at: Instant,
}

#[derive(Debug)]
pub struct OfflineBuffer {
    capacity: usize,
    entries: VecDeque<OfflineEntry>,
    evicted: u64,
}

impl OfflineBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            entries: VecDeque::new(),
            evicted: 0,
        }
    }

    /// Append, evicting the oldest entry when full
    pub fn push(&mut self, class: TrafficClass, payload: Payload, options: SendOptions) {
        if self.entries.len() >= self.capacity {
            if let Some(oldest) = self.entries.pop_front() {
                self.evicted += 1;
                log::debug!(
                    "Offline buffer full, evicted {} message buffered {:?} ago",
                    oldest.class,
                    oldest.buffered_at.elapsed()
                );
            }
        }
        self.entries.push_back(OfflineEntry {
            class,
            payload,
            options,
            buffered_at: Instant::now(),
        });
    }

    /// Take everything in arrival order
    pub fn drain(&mut self) -> Vec<OfflineEntry> {
        self.entries.drain(..).collect()
    }

    pub fn clear(&mut self) -> usize {
        let cleared = self.entries.len();
        self.entries.clear();
        cleared
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn evicted(&self) -> u64 {
        self.evicted
    }

    pub fn memory_bytes(&self) -> usize {
        self.entries.iter().map(|e| e.payload.size_bytes()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_oldest_evicted_when_full() {
        let mut buffer = OfflineBuffer::new(2);
        for text in ["a", "b", "c"] {
            buffer.push(TrafficClass::Text, Payload::from(text), SendOptions::default());
        }
        assert_eq!(buffer.evicted(), 1);
        let drained: Vec<Payload> = buffer.drain().into_iter().map(|e| e.payload).collect();
        assert_eq!(drained, vec![Payload::from("b"), Payload::from("c")]);
        assert!(buffer.is_empty());
    }
}
