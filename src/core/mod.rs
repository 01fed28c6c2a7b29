//! Core services and infrastructure

pub mod error_handling;
pub mod logging;
pub mod registry;
pub mod retry;
pub mod scheduler;
pub mod shutdown;
pub mod styles;
pub mod version;
