//! Queue Error Types

use crate::core::error_handling::ContextualError;
use crate::queue::types::{MessageId, TrafficClass};
use crate::transport::TransportError;

#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    #[error("Queue '{queue}' is full (max size: {max_size})")]
    QueueFull { queue: String, max_size: usize },

    #[error("Message {id} expired before it could be sent")]
    Timeout { id: MessageId },

    #[error("Chunk assembly '{chunk_id}' timed out with {received}/{expected} chunks")]
    AssemblyTimeout {
        chunk_id: String,
        received: usize,
        expected: u32,
    },

    #[error("Message {id} not found in queue '{queue}'")]
    NotFound { queue: String, id: MessageId },

    #[error("Queue manager is disabled")]
    Disabled,

    #[error("{class} traffic is not buffered while offline")]
    Offline { class: TrafficClass },

    #[error("No {hook} handler registered")]
    NoHandler { hook: &'static str },

    #[error("Background loops need a tokio runtime")]
    NoRuntime,

    #[error("Consumer failed: {0}")]
    Consumer(#[from] ConsumerError),

    #[error("Transport failed: {0}")]
    Transport(#[from] TransportError),
}

impl ContextualError for QueueError {
    fn is_user_actionable(&self) -> bool {
        matches!(self, QueueError::QueueFull { .. } | QueueError::Offline { .. })
    }

    fn user_message(&self) -> Option<&str> {
        match self {
            QueueError::QueueFull { .. } => Some("Outbound queue is full; message rejected"),
            QueueError::Offline { .. } => Some("Connection is offline; message rejected"),
            _ => None,
        }
    }
}

/// Failure reported by an inbound message consumer
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct ConsumerError {
    message: String,
}

impl ConsumerError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Result type for queue operations
pub type QueueResult<T> = Result<T, QueueError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_queue_full_is_user_actionable() {
        let err = QueueError::QueueFull {
            queue: "text".to_string(),
            max_size: 2,
        };
        assert!(err.is_user_actionable());
        assert!(err.user_message().is_some());
        assert_eq!(err.to_string(), "Queue 'text' is full (max size: 2)");
    }

    #[test]
    fn test_consumer_error_converts() {
        let err: QueueError = ConsumerError::new("bad frame").into();
        assert!(!err.is_user_actionable());
        assert_eq!(err.to_string(), "Consumer failed: bad frame");
    }
}
