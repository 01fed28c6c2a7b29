//! Queue-level notices
//!
//! Queues report overflow, delivery failure and degraded-delivery conditions
//! through an optional sink. The manager forwards them into the notification
//! system; standalone queues can install any closure.

use crate::queue::types::{OverflowStrategy, TrafficClass};
use serde::Serialize;
use std::sync::Arc;

/// Something a queue wants its owner to know about
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "notice", rename_all = "snake_case")]
pub enum QueueNotice {
    /// Admission policy fired; `dropped` messages were lost to make room
    Overflow {
        queue: String,
        strategy: OverflowStrategy,
        dropped: usize,
        depth: usize,
    },
    /// An inbound buffer hit its size limit and was flushed early
    BufferFull { queue: String, depth: usize },
    /// A message was given up on after failing
    Error {
        queue: String,
        class: Option<TrafficClass>,
        message: String,
    },
    /// Messages expired while waiting
    Expired { queue: String, count: usize },
    /// A chunk assembly was force-completed with missing parts
    PartialAssembly {
        queue: String,
        chunk_id: String,
        received: usize,
        expected: u32,
    },
    /// A sequenced message arrived after its slot was already passed
    StaleSequence {
        queue: String,
        sequence: u64,
        expected: u64,
    },
}

impl QueueNotice {
    pub fn queue(&self) -> &str {
        match self {
            QueueNotice::Overflow { queue, .. }
            | QueueNotice::BufferFull { queue, .. }
            | QueueNotice::Error { queue, .. }
            | QueueNotice::Expired { queue, .. }
            | QueueNotice::PartialAssembly { queue, .. }
            | QueueNotice::StaleSequence { queue, .. } => queue,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, QueueNotice::Error { .. })
    }
}

/// Receiver for queue notices
pub type NoticeSink = Arc<dyn Fn(QueueNotice) + Send + Sync>;

pub(crate) fn emit(sink: &Option<NoticeSink>, notice: QueueNotice) {
    if let Some(sink) = sink {
        sink(notice);
    }
}
