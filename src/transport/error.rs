//! Transport Error Types

use crate::core::error_handling::ContextualError;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    #[error("Send failed: {0}")]
    Send(String),

    #[error("Transport channel closed")]
    Closed,

    /// The first `sent` frames of a batch went out before the failure
    #[error("Sent {sent} of {total} frames: {reason}")]
    Partial {
        sent: usize,
        total: usize,
        reason: String,
    },

    #[error("Failed to encode frame: {0}")]
    Encode(String),

    #[error("Failed to decode frame: {0}")]
    Decode(String),

    #[error("Could not connect to {endpoint}: {reason}")]
    ConnectFailed { endpoint: String, reason: String },
}

impl TransportError {
    /// Leading messages of the dispatch that reached the transport
    pub fn delivered(&self) -> usize {
        match self {
            TransportError::Partial { sent, .. } => *sent,
            _ => 0,
        }
    }
}

impl ContextualError for TransportError {
    fn is_user_actionable(&self) -> bool {
        matches!(self, TransportError::ConnectFailed { .. })
    }

    fn user_message(&self) -> Option<&str> {
        match self {
            TransportError::ConnectFailed { .. } => {
                Some("Could not reach the agent backend; check the endpoint and try again")
            }
            _ => None,
        }
    }
}

impl From<serde_json::Error> for TransportError {
    fn from(err: serde_json::Error) -> Self {
        TransportError::Decode(err.to_string())
    }
}

impl From<base64::DecodeError> for TransportError {
    fn from(err: base64::DecodeError) -> Self {
        TransportError::Decode(err.to_string())
    }
}
