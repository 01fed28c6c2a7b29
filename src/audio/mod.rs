//! Audio Pipeline
//!
//! Jitter-tolerant playback of backend audio and low-latency microphone
//! capture.
//!
//! ```text
//!  backend ──audio/pcm──► receive hook ──► PlaybackSession ──► SampleRing ──► pull_due()
//!                                              (adaptive threshold)
//!
//!  mic blocks ──► CaptureFeed ══bounded══► worklet thread ══bounded══► forwarder ──► send_direct
//! ```
//!
//! Capture bypasses the outbound queues; everything else about transport
//! is owned by the queue manager.
//!
//! External modules should import from [`api`].

pub(crate) mod capture;
pub(crate) mod config;
pub(crate) mod contexts;
pub(crate) mod error;
pub(crate) mod pcm;
pub(crate) mod pipeline;
pub(crate) mod playback;
pub(crate) mod ring;

pub mod api;

#[cfg(test)]
mod tests;
