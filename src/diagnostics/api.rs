//! Public API for diagnostics

pub use crate::diagnostics::console::DiagnosticsConsole;
pub use crate::diagnostics::tables::{audio_gap_table, queue_health_table, transmission_table};
