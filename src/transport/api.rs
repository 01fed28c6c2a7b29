//! Public API for the transport layer

pub use crate::transport::channel::{
    bind_outbound, connect_with_backoff, spawn_inbound_pump, Connection, Connector,
};
pub use crate::transport::error::TransportError;
pub use crate::transport::frame::{
    FrameCodec, InboundFrame, TransportFrame, MIME_JPEG, MIME_JSON, MIME_PCM, MIME_TEXT,
};
