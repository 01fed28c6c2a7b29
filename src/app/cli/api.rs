//! Public API exports for the CLI module

pub use crate::app::cli::args::{parse_quality, Args};
pub use crate::app::cli::config::{
    default_config_path, ConfigError, ConfigFile, EffectiveConfig, InboundOverrides,
    LoggingSection, OutboundOverrides,
};
