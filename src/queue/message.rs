//! Message Types
//!
//! Outbound [`QueuedMessage`]s wait in a priority queue for the transport;
//! inbound [`ProcessingMessage`]s carry delivery metadata (sequence numbers,
//! chunk descriptors) into a processing queue.

use crate::queue::types::{MessageId, Priority, SendOptions, TrafficClass};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::time::Instant;

static NEXT_MESSAGE_ID: AtomicU64 = AtomicU64::new(1);

/// Allocate a process-unique message id
pub fn next_message_id() -> MessageId {
    NEXT_MESSAGE_ID.fetch_add(1, Ordering::Relaxed)
}

/// Opaque message payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "lowercase")]
pub enum Payload {
    Text(String),
    Binary(Vec<u8>),
    Json(serde_json::Value),
}

impl Payload {
    /// Approximate in-memory size in bytes
    pub fn size_bytes(&self) -> usize {
        match self {
            Payload::Text(text) => text.len(),
            Payload::Binary(bytes) => bytes.len(),
            Payload::Json(value) => value.to_string().len(),
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Payload::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Payload::Binary(bytes) => Some(bytes),
            _ => None,
        }
    }

    /// Concatenate chunk payloads in order
    ///
    /// Any binary part makes the result binary; otherwise the parts are
    /// joined as text (JSON parts contribute their serialized form).
    pub fn concat<I>(parts: I) -> Payload
    where
        I: IntoIterator<Item = Payload>,
    {
        let parts: Vec<Payload> = parts.into_iter().collect();
        if parts.iter().any(|p| matches!(p, Payload::Binary(_))) {
            let mut bytes = Vec::new();
            for part in parts {
                match part {
                    Payload::Binary(b) => bytes.extend_from_slice(&b),
                    Payload::Text(t) => bytes.extend_from_slice(t.as_bytes()),
                    Payload::Json(v) => bytes.extend_from_slice(v.to_string().as_bytes()),
                }
            }
            Payload::Binary(bytes)
        } else {
            let mut text = String::new();
            for part in parts {
                match part {
                    Payload::Text(t) => text.push_str(&t),
                    Payload::Json(v) => text.push_str(&v.to_string()),
                    Payload::Binary(_) => {}
                }
            }
            Payload::Text(text)
        }
    }
}

impl From<&str> for Payload {
    fn from(text: &str) -> Self {
        Payload::Text(text.to_string())
    }
}

impl From<String> for Payload {
    fn from(text: String) -> Self {
        Payload::Text(text)
    }
}

impl From<Vec<u8>> for Payload {
    fn from(bytes: Vec<u8>) -> Self {
        Payload::Binary(bytes)
    }
}

impl From<serde_json::Value> for Payload {
    fn from(value: serde_json::Value) -> Self {
        Payload::Json(value)
    }
}

/// A message waiting in an outbound priority queue
#[derive(Debug, Clone)]
pub struct QueuedMessage {
    pub id: MessageId,
    pub class: TrafficClass,
    pub payload: Payload,
    pub priority: Priority,
    pub enqueued_at: Instant,
    pub expires_at: Instant,
    pub retries: u32,
    pub options: SendOptions,
}

impl QueuedMessage {
    pub fn new(
        class: TrafficClass,
        payload: Payload,
        priority: Priority,
        options: SendOptions,
        timeout: Duration,
        now: Instant,
    ) -> Self {
        Self {
            id: next_message_id(),
            class,
            payload,
            priority,
            enqueued_at: now,
            expires_at: now + options.timeout.unwrap_or(timeout),
            retries: 0,
            options,
        }
    }

    pub fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }
}

/// Delivery metadata carried by inbound messages
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sequence_number: Option<u64>,
    #[serde(default)]
    pub is_chunk: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chunk_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chunk_index: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_chunks: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    /// Set on assemblies that were force-completed with missing chunks
    #[serde(default)]
    pub is_partial: bool,
}

impl MessageMetadata {
    pub fn sequenced(sequence_number: u64) -> Self {
        Self {
            sequence_number: Some(sequence_number),
            ..Self::default()
        }
    }

    pub fn chunk(chunk_id: impl Into<String>, chunk_index: u32, total_chunks: u32) -> Self {
        Self {
            is_chunk: true,
            chunk_id: Some(chunk_id.into()),
            chunk_index: Some(chunk_index),
            total_chunks: Some(total_chunks),
            ..Self::default()
        }
    }

    /// Chunk descriptor, when the metadata is a complete and usable one
    pub fn chunk_descriptor(&self) -> Option<(&str, u32, u32)> {
        if !self.is_chunk {
            return None;
        }
        match (&self.chunk_id, self.chunk_index, self.total_chunks) {
            (Some(id), Some(index), Some(total)) if total > 0 && index < total => {
                Some((id.as_str(), index, total))
            }
            _ => None,
        }
    }
}

/// A message flowing through an inbound processing queue
#[derive(Debug, Clone)]
pub struct ProcessingMessage {
    pub id: MessageId,
    pub payload: Payload,
    pub received_at: Instant,
    pub metadata: MessageMetadata,
}

impl ProcessingMessage {
    pub fn new(payload: Payload, metadata: MessageMetadata, received_at: Instant) -> Self {
        Self {
            id: next_message_id(),
            payload,
            received_at,
            metadata,
        }
    }
}
