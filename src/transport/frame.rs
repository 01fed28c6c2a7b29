//! Wire frames exchanged with the agent backend
//!
//! Every frame is one JSON object. Media frames carry a `mime_type` and a
//! `data` string (base64 for binary payloads); turn-control frames carry
//! `turn_complete` / `interrupted` instead:
//!
//! ```text
//! {"mime_type":"audio/pcm","data":"AAD//w=="}
//! {"mime_type":"text/plain","data":"Hello"}
//! {"turn_complete":true,"interrupted":false}
//! ```

use crate::queue::api::{Dispatch, MessageMetadata, Payload, QueuedMessage, TrafficClass};
use crate::transport::error::TransportError;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};

pub const MIME_PCM: &str = "audio/pcm";
pub const MIME_JPEG: &str = "image/jpeg";
pub const MIME_TEXT: &str = "text/plain";
pub const MIME_JSON: &str = "application/json";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TransportFrame {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub turn_complete: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interrupted: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sequence_number: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chunk_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chunk_index: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_chunks: Option<u32>,
}

impl TransportFrame {
    pub fn media(mime_type: &str, data: impl Into<String>) -> Self {
        Self {
            mime_type: Some(mime_type.to_string()),
            data: Some(data.into()),
            ..Self::default()
        }
    }

    pub fn turn_control(turn_complete: bool, interrupted: bool) -> Self {
        Self {
            turn_complete: Some(turn_complete),
            interrupted: Some(interrupted),
            ..Self::default()
        }
    }

    pub fn is_turn_control(&self) -> bool {
        self.turn_complete.is_some() || self.interrupted.is_some()
    }

    pub fn to_json(&self) -> Result<String, TransportError> {
        serde_json::to_string(self).map_err(|e| TransportError::Encode(e.to_string()))
    }

    pub fn from_json(text: &str) -> Result<Self, TransportError> {
        Ok(serde_json::from_str(text)?)
    }
}

/// A decoded inbound frame, ready for `MessageQueueManager::receive`
#[derive(Debug, Clone, PartialEq)]
pub struct InboundFrame {
    pub class: TrafficClass,
    pub payload: Payload,
    pub metadata: MessageMetadata,
}

/// Maps between queue messages and wire frames
#[derive(Debug, Clone, Copy, Default)]
pub struct FrameCodec;

impl FrameCodec {
    pub fn mime_for(class: TrafficClass) -> &'static str {
        match class {
            TrafficClass::Audio => MIME_PCM,
            TrafficClass::Video => MIME_JPEG,
            TrafficClass::Text => MIME_TEXT,
            TrafficClass::Control => MIME_JSON,
        }
    }

    pub fn class_for_mime(mime_type: &str) -> Option<TrafficClass> {
        match mime_type {
            MIME_PCM => Some(TrafficClass::Audio),
            MIME_JPEG => Some(TrafficClass::Video),
            MIME_TEXT => Some(TrafficClass::Text),
            MIME_JSON => Some(TrafficClass::Control),
            _ => None,
        }
    }

    pub fn encode_payload(class: TrafficClass, payload: &Payload) -> Result<TransportFrame, TransportError> {
        let data = match payload {
            Payload::Binary(bytes) => STANDARD.encode(bytes),
            Payload::Text(_) if class == TrafficClass::Audio || class == TrafficClass::Video => {
                return Err(TransportError::Encode(format!(
                    "{} frames need a binary payload",
                    class
                )))
            }
            Payload::Text(text) => text.clone(),
            Payload::Json(value) => {
                if let Some(frame) = turn_control_from_json(value) {
                    return Ok(frame);
                }
                value.to_string()
            }
        };
        Ok(TransportFrame::media(Self::mime_for(class), data))
    }

    pub fn encode_message(message: &QueuedMessage) -> Result<TransportFrame, TransportError> {
        Self::encode_payload(message.class, &message.payload)
    }

    /// One JSON line per message in the dispatch
    pub fn encode_dispatch(dispatch: &Dispatch) -> Result<Vec<String>, TransportError> {
        dispatch
            .messages()
            .iter()
            .map(|message| Self::encode_message(message)?.to_json())
            .collect()
    }

    pub fn decode(text: &str) -> Result<InboundFrame, TransportError> {
        Self::decode_frame(TransportFrame::from_json(text)?)
    }

    pub fn decode_frame(frame: TransportFrame) -> Result<InboundFrame, TransportError> {
        let mut metadata = MessageMetadata {
            sequence_number: frame.sequence_number,
            is_chunk: frame.chunk_id.is_some(),
            chunk_id: frame.chunk_id.clone(),
            chunk_index: frame.chunk_index,
            total_chunks: frame.total_chunks,
            role: frame.role.clone(),
            content_type: frame.mime_type.clone(),
            is_partial: false,
        };

        if frame.is_turn_control() {
            metadata.content_type = Some(MIME_JSON.to_string());
            let payload = serde_json::json!({
                "turn_complete": frame.turn_complete.unwrap_or(false),
                "interrupted": frame.interrupted.unwrap_or(false),
            });
            return Ok(InboundFrame {
                class: TrafficClass::Control,
                payload: Payload::Json(payload),
                metadata,
            });
        }

        let mime_type = frame
            .mime_type
            .as_deref()
            .ok_or_else(|| TransportError::Decode("frame has no mime_type".to_string()))?;
        let class = Self::class_for_mime(mime_type)
            .ok_or_else(|| TransportError::Decode(format!("mime type not supported: {}", mime_type)))?;
        let data = frame.data.unwrap_or_default();

        let payload = match class {
            TrafficClass::Audio | TrafficClass::Video => Payload::Binary(STANDARD.decode(data)?),
            TrafficClass::Text => Payload::Text(data),
            TrafficClass::Control => Payload::Json(serde_json::from_str(&data)?),
        };

        Ok(InboundFrame {
            class,
            payload,
            metadata,
        })
    }
}

fn turn_control_from_json(value: &serde_json::Value) -> Option<TransportFrame> {
    let object = value.as_object()?;
    let turn_complete = object.get("turn_complete").and_then(|v| v.as_bool());
    let interrupted = object.get("interrupted").and_then(|v| v.as_bool());
    if turn_complete.is_none() && interrupted.is_none() {
        return None;
    }
    Some(TransportFrame {
        turn_complete,
        interrupted,
        ..TransportFrame::default()
    })
}
