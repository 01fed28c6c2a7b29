//! Command line arguments
//!
//! Every flag is optional; unset flags fall back to the configuration file
//! and then to built-in defaults.

use crate::core::styles::palette_to_clap;
use crate::core::version;
use crate::queue::api::ConnectionQuality;
use clap::{ArgAction, CommandFactory, FromArgMatches, Parser};
use std::io::IsTerminal;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser, Debug, Clone, Default)]
#[command(name = "livequeue")]
#[command(version)]
pub struct Args {
    /// Configuration file path
    #[arg(short = 'c', long = "config-file", value_name = "FILE")]
    pub config_file: Option<PathBuf>,

    /// Log level
    #[arg(short = 'l', long = "log-level", value_name = "LEVEL", value_parser = ["trace", "debug", "info", "warn", "error", "off"])]
    pub log_level: Option<String>,

    /// Log output format
    #[arg(short = 'o', long = "log-format", value_name = "FORMAT", value_parser = ["text", "ext", "json"])]
    pub log_format: Option<String>,

    /// Log file path (use 'none' to log to stderr)
    #[arg(short = 'f', long = "log-file", value_name = "FILE")]
    pub log_file: Option<PathBuf>,

    /// More output (repeatable)
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count)]
    pub verbose: u8,

    /// Less output (repeatable)
    #[arg(short = 'q', long = "quiet", action = ArgAction::Count)]
    pub quiet: u8,

    /// Force colored output
    #[arg(long = "color", conflicts_with = "no_color")]
    pub color: bool,

    /// Disable colored output
    #[arg(long = "no-color")]
    pub no_color: bool,

    /// How long to run the loopback session, in seconds
    #[arg(short = 'd', long = "duration", value_name = "SECONDS")]
    pub duration: Option<u64>,

    /// Connection quality to simulate
    #[arg(long = "quality", value_name = "QUALITY", value_parser = ["good", "fair", "poor", "offline"])]
    pub quality: Option<String>,

    /// Bypass the queues (pure passthrough)
    #[arg(long = "disable-queue")]
    pub disable_queue: bool,

    /// Playback volume between 0.0 and 1.0
    #[arg(long = "volume", value_name = "LEVEL")]
    pub volume: Option<f32>,

    /// Print the effective configuration and exit
    #[arg(long = "print-config")]
    pub print_config: bool,
}

impl Args {
    /// Parse the process arguments with help coloured like the rest of the output
    pub fn parse_from_env() -> Self {
        let color = std::env::var_os("NO_COLOR").is_none() && std::io::stdout().is_terminal();
        let matches = Self::command()
            .styles(palette_to_clap(color))
            .about(version::description())
            .long_version(version::banner())
            .get_matches();
        Self::from_arg_matches(&matches).unwrap_or_else(|err| err.exit())
    }

    /// Net verbosity: each -v adds one, each -q removes one
    pub fn verbosity(&self) -> i8 {
        (self.verbose.min(i8::MAX as u8) as i8).saturating_sub(self.quiet.min(i8::MAX as u8) as i8)
    }

    /// Resolve colour: flags win, then the config file, then TTY detection
    pub fn use_color(&self, configured: Option<bool>) -> bool {
        if self.no_color {
            return false;
        }
        if self.color {
            return true;
        }
        configured.unwrap_or_else(|| {
            std::env::var_os("NO_COLOR").is_none() && std::io::stdout().is_terminal()
        })
    }

    pub fn duration(&self) -> Option<Duration> {
        self.duration.map(Duration::from_secs)
    }

    pub fn quality(&self) -> Option<ConnectionQuality> {
        self.quality.as_deref().and_then(parse_quality)
    }

    /// `--log-file none` means "no file"
    pub fn log_file(&self) -> Option<Option<PathBuf>> {
        self.log_file.as_ref().map(|path| {
            if path.as_os_str() == "none" {
                None
            } else {
                Some(path.clone())
            }
        })
    }
}

pub fn parse_quality(value: &str) -> Option<ConnectionQuality> {
    match value.to_ascii_lowercase().as_str() {
        "good" => Some(ConnectionQuality::Good),
        "fair" => Some(ConnectionQuality::Fair),
        "poor" => Some(ConnectionQuality::Poor),
        "offline" => Some(ConnectionQuality::Offline),
        _ => None,
    }
}
