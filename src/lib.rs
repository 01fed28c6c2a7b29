pub mod app;
pub mod audio;
pub mod core;
pub mod diagnostics;
pub mod notifications;
pub mod queue;
pub mod transport;
