//! Diagnostics console
//!
//! Renders manager and audio state as tables; see [`api::DiagnosticsConsole`].

pub(crate) mod console;
pub(crate) mod tables;

pub mod api;
