//! Handler registration slots
//!
//! A slot holds at most one handler. Registration hands back a
//! [`HandlerId`]; clearing requires the same id, so a component that
//! registered earlier cannot remove a handler someone else installed since.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

static NEXT_HANDLER_ID: AtomicU64 = AtomicU64::new(1);

/// Token identifying one registration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HandlerId(u64);

impl HandlerId {
    fn next() -> Self {
        HandlerId(NEXT_HANDLER_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// Single-occupancy handler registration
pub struct HandlerSlot<H: ?Sized> {
    name: &'static str,
    current: Mutex<Option<(HandlerId, Arc<H>)>>,
}

impl<H: ?Sized> HandlerSlot<H> {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            current: Mutex::new(None),
        }
    }

    /// Install `handler`, replacing any existing one
    pub fn set(&self, handler: Arc<H>) -> HandlerId {
        let id = HandlerId::next();
        let mut current = self.current.lock().unwrap();
        if current.is_some() {
            log::warn!("Replacing existing {} handler", self.name);
        }
        *current = Some((id, handler));
        id
    }

    /// Clear the slot if `id` is the current registration
    pub fn clear(&self, id: HandlerId) -> bool {
        let mut current = self.current.lock().unwrap();
        match current.as_ref() {
            Some((current_id, _)) if *current_id == id => {
                *current = None;
                true
            }
            _ => {
                log::debug!("Ignoring stale clear of {} handler", self.name);
                false
            }
        }
    }

    /// Remove whatever handler is installed
    pub fn reset(&self) {
        *self.current.lock().unwrap() = None;
    }

    /// Current handler, cloned out so it can be called without the lock
    pub fn get(&self) -> Option<Arc<H>> {
        self.current
            .lock()
            .unwrap()
            .as_ref()
            .map(|(_, handler)| handler.clone())
    }

    pub fn is_set(&self) -> bool {
        self.current.lock().unwrap().is_some()
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}
