//! Bounded cache of open audio contexts
//!
//! Capture worklets and playback sessions register here so that teardown
//! can close everything in one place. When the cache is full, adding a
//! context evicts and closes the oldest one.

use std::collections::VecDeque;

/// Something holding audio resources that must be released explicitly
pub trait AudioContext: Send {
    fn id(&self) -> &str;

    fn close(&mut self);
}

pub struct AudioContextCache {
    capacity: usize,
    entries: VecDeque<Box<dyn AudioContext>>,
}

impl AudioContextCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            entries: VecDeque::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.entries.iter().any(|context| context.id() == id)
    }

    pub fn ids(&self) -> Vec<String> {
        self.entries.iter().map(|context| context.id().to_string()).collect()
    }

    /// Track a context; returns the id of a context closed to make room
    ///
    /// A context with the same id as a tracked one replaces (and closes) it.
    pub fn add(&mut self, context: Box<dyn AudioContext>) -> Option<String> {
        self.remove(context.id());

        let evicted = if self.entries.len() >= self.capacity {
            self.entries.pop_front().map(|mut oldest| {
                log::debug!("Audio context cache full, closing '{}'", oldest.id());
                oldest.close();
                oldest.id().to_string()
            })
        } else {
            None
        };

        self.entries.push_back(context);
        evicted
    }

    /// Close and forget a context
    pub fn remove(&mut self, id: &str) -> bool {
        match self.entries.iter().position(|context| context.id() == id) {
            Some(index) => {
                if let Some(mut context) = self.entries.remove(index) {
                    context.close();
                }
                true
            }
            None => false,
        }
    }

    /// Close every tracked context; returns how many were closed
    pub fn cleanup(&mut self) -> usize {
        let count = self.entries.len();
        for mut context in self.entries.drain(..) {
            context.close();
        }
        count
    }
}

impl Drop for AudioContextCache {
    fn drop(&mut self) {
        self.cleanup();
    }
}
