//! Public API for the queue system
//!
//! External modules should import from here rather than directly from
//! internal modules. See the module documentation for the architecture.

// Orchestration
pub use crate::queue::manager::{
    ConnectionState, ManagerStatus, MessageQueueManager, ReceiveHook, SendHook, TickSummary,
    TransmissionStats,
};

// Queues
pub use crate::queue::priority::{
    Dispatch, DrainPoll, OutboundSnapshot, PriorityDepths, PriorityQueue, ProcessOutcome,
};
pub use crate::queue::processing::{InboundSnapshot, MessageConsumer, ProcessingQueue, Receipt};

// Inbound building blocks
pub use crate::queue::assembler::{AssembledMessage, ChunkAssembler, ChunkOutcome};
pub use crate::queue::ordering::{OrderingBuffer, SequencePosition};
pub use crate::queue::offline::{OfflineBuffer, OfflineEntry};

// Messages and configuration
pub use crate::queue::config::{ManagerConfig, PerClass, PriorityQueueConfig, ProcessingQueueConfig};
pub use crate::queue::message::{
    next_message_id, MessageMetadata, Payload, ProcessingMessage, QueuedMessage,
};
pub use crate::queue::types::{
    ConnectionQuality, HealthStatus, MessageId, OrderingExpiry, OverflowStrategy, Priority,
    ProcessingMode, ReplaceScope, SendOptions, TrafficClass,
};

// Health
pub use crate::queue::metrics::{
    aggregate_health, HealthThresholds, MetricsExport, MetricsSnapshot, QueueMetrics,
    LATENCY_WINDOW,
};
pub use crate::queue::notice::{NoticeSink, QueueNotice};

// Hooks and errors
pub use crate::queue::error::{ConsumerError, QueueError, QueueResult};
pub use crate::queue::handlers::{HandlerId, HandlerSlot};
