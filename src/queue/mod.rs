//! Real-time message queueing
//!
//! Outbound traffic is split by [`TrafficClass`](types::TrafficClass) into
//! bounded priority queues that rate-limit, batch and drop according to an
//! overflow strategy. Inbound traffic goes through per-class processing
//! queues that can buffer, reassemble chunked messages or restore sequence
//! order before handing messages to a consumer.
//!
//! # Architecture
//!
//! ```text
//!   send(class, payload)                         receive(class, payload, metadata)
//!          │                                                   │
//!          ▼                                                   ▼
//! ┌─────────────────────┐                        ┌──────────────────────────┐
//! │ PriorityQueue/class │  urgent→high→med→low   │ ProcessingQueue/class    │
//! │  overflow strategy  │                        │  immediate | buffered    │
//! │  rate limit, batch  │                        │  chunked   | realtime    │
//! └─────────┬───────────┘                        └────────────┬─────────────┘
//!           │ process_tick                                    │ consumer
//!           ▼                                                 ▼
//!      send hook (transport)                           receive hook
//! ```
//!
//! [`MessageQueueManager`](manager::MessageQueueManager) owns all of the
//! above, drives them from two background loops and reports health and
//! connection changes through the notification system.
//!
//! External code should import from [`api`].

pub(crate) mod assembler;
pub(crate) mod config;
pub(crate) mod error;
pub(crate) mod handlers;
pub(crate) mod manager;
pub(crate) mod message;
pub(crate) mod metrics;
pub(crate) mod notice;
pub(crate) mod offline;
pub(crate) mod ordering;
pub(crate) mod priority;
pub(crate) mod processing;
pub(crate) mod types;

pub mod api;

#[cfg(test)]
mod tests;
