//! Wire transport between the queue manager and the agent backend
//!
//! `frame` maps queue payloads to the backend's JSON frames; `channel`
//! binds a connection's two directions to the manager's send and receive
//! paths and reconnects with exponential backoff.

pub(crate) mod channel;
pub(crate) mod error;
pub(crate) mod frame;

pub mod api;

pub use error::TransportError;
