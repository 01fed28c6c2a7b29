//! Application startup
//!
//! Resolves configuration (built-in defaults, then the TOML file, then
//! command line flags), initialises logging and runs one loopback session:
//! connect with backoff, start the manager loops, capture a synthetic tone,
//! send text and video on timers and schedule playback until the duration
//! ends or a signal arrives. The diagnostics report is printed on exit.

use crate::app::cli::args::Args;
use crate::app::cli::config::{ConfigError, ConfigFile, EffectiveConfig, LoggingSection};
use crate::app::simulation::{tone_block, LoopbackConnector, SimulationConfig};
use crate::audio::api::{AudioError, CaptureSummary};
use crate::core::error_handling::{log_error_with_context, ContextualError};
use crate::core::logging::{init_logging, level_for_verbosity};
use crate::core::registry::{Registry, RegistryError};
use crate::core::retry::RetryPolicy;
use crate::core::shutdown::ShutdownCoordinator;
use crate::diagnostics::api::DiagnosticsConsole;
use crate::notifications::api::EventFilter;
use crate::queue::api::{ConnectionQuality, Payload, QueueError, SendOptions, TrafficClass};
use crate::transport::api::{bind_outbound, connect_with_backoff, spawn_inbound_pump, TransportError};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time::{interval, sleep, Instant, MissedTickBehavior};

/// Minimal JPEG start/end markers standing in for a camera frame
const FAKE_JPEG: [u8; 4] = [0xFF, 0xD8, 0xFF, 0xD9];

#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Queue(#[from] QueueError),

    #[error(transparent)]
    Audio(#[from] AudioError),

    #[error("Logging setup failed: {0}")]
    Logging(String),
}

impl ContextualError for StartupError {
    fn is_user_actionable(&self) -> bool {
        match self {
            StartupError::Config(err) => err.is_user_actionable(),
            StartupError::Registry(err) => err.is_user_actionable(),
            StartupError::Transport(err) => err.is_user_actionable(),
            StartupError::Queue(err) => err.is_user_actionable(),
            StartupError::Audio(err) => err.is_user_actionable(),
            StartupError::Logging(_) => true,
        }
    }

    fn user_message(&self) -> Option<&str> {
        match self {
            StartupError::Config(err) => err.user_message(),
            StartupError::Registry(err) => err.user_message(),
            StartupError::Transport(err) => err.user_message(),
            StartupError::Queue(err) => err.user_message(),
            StartupError::Audio(err) => err.user_message(),
            StartupError::Logging(message) => Some(message),
        }
    }
}

/// What one loopback session did
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionSummary {
    pub texts_sent: u64,
    pub video_frames_sent: u64,
    pub capture_blocks: u64,
    pub playback_chunks: u64,
    pub inbound_frames: usize,
    pub events_seen: u64,
    pub capture: Option<CaptureSummary>,
    pub interrupted: bool,
}

/// Binary entry point
pub fn startup() {
    let args = Args::parse_from_env();

    let runtime = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(err) => {
            eprintln!("livequeue: cannot start async runtime: {}", err);
            std::process::exit(1);
        }
    };

    let result = runtime.block_on(ShutdownCoordinator::guard(|shutdown_rx| run(args, shutdown_rx)));
    if let Err(err) = result {
        log_error_with_context(&err, "Running loopback session");
        std::process::exit(1);
    }
}

async fn run(args: Args, shutdown_rx: broadcast::Receiver<()>) -> Result<(), StartupError> {
    let loaded = ConfigFile::load(args.config_file.as_deref()).await;
    let logging = match &loaded {
        Ok(Some((_, file))) => file.logging.clone(),
        _ => LoggingSection::default(),
    };
    let color = args.use_color(logging.color);
    setup_logging(&args, &logging, color)?;

    let mut effective = EffectiveConfig::default();
    if let Some((path, file)) = loaded? {
        file.apply(&mut effective)?;
        log::info!("Using configuration {}", path.display());
    }
    apply_args(&args, &mut effective);
    effective.validate()?;

    if args.print_config {
        print!("{}", effective.to_toml()?);
        return Ok(());
    }

    let registry = Arc::new(Registry::new());
    registry.init(effective.queue.clone(), effective.audio.clone())?;
    let console = DiagnosticsConsole::new(Arc::clone(&registry), color);
    registry.set_consumer(|class, message| {
        if class == TrafficClass::Text {
            if let Some(text) = message.payload.as_text() {
                log::info!("Agent: {}", text);
            }
        }
        Ok(None)
    });

    let quality = args.quality().unwrap_or(ConnectionQuality::Good);
    let duration = Duration::from_secs(effective.simulation.duration_secs);
    let outcome = run_session(&registry, &effective.simulation, quality, duration, shutdown_rx).await;

    let report = match &outcome {
        Ok(summary) => {
            log::info!(
                "Session finished: {} text, {} video, {} capture blocks, {} playback chunks, {} inbound frames{}",
                summary.texts_sent,
                summary.video_frames_sent,
                summary.capture_blocks,
                summary.playback_chunks,
                summary.inbound_frames,
                if summary.interrupted { " (interrupted)" } else { "" }
            );
            Some(console.report())
        }
        Err(err) => {
            log::debug!("Session failed: {}", err);
            None
        }
    };

    registry.destroy().await;
    if let Some(report) = report {
        println!("{}", report?);
    }
    outcome.map(|_| ())
}

fn setup_logging(args: &Args, logging: &LoggingSection, color: bool) -> Result<(), StartupError> {
    let level = args
        .log_level
        .clone()
        .or_else(|| (args.verbosity() != 0).then(|| level_for_verbosity(args.verbosity()).to_string()))
        .or_else(|| logging.level.clone());
    let format = args.log_format.clone().or_else(|| logging.format.clone());
    let file = match args.log_file() {
        Some(explicit) => explicit,
        None => logging.file.clone(),
    };
    let file = file.map(|path| path.to_string_lossy().into_owned());

    init_logging(level.as_deref(), format.as_deref(), file.as_deref(), color)
        .map_err(|e| StartupError::Logging(e.to_string()))
}

/// Command line flags win over the configuration file
pub fn apply_args(args: &Args, effective: &mut EffectiveConfig) {
    if args.disable_queue {
        effective.queue.enabled = false;
    }
    if let Some(volume) = args.volume {
        effective.audio.volume = volume.clamp(0.0, 1.0);
    }
    if let Some(seconds) = args.duration {
        effective.simulation.duration_secs = seconds;
    }
}

/// Run one session against the loopback backend until `duration` elapses
/// or shutdown is broadcast
///
/// The registry must be initialised and should already carry the
/// application consumer. It is left initialised so the caller can read
/// diagnostics before destroying it.
pub async fn run_session(
    registry: &Registry,
    simulation: &SimulationConfig,
    quality: ConnectionQuality,
    duration: Duration,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> Result<SessionSummary, StartupError> {
    let manager = registry.manager()?;
    let audio = registry.audio()?;
    let mut events = manager.subscribe("startup", EventFilter::All, "cli");

    let connector = LoopbackConnector::new(simulation.clone());
    let connection = connect_with_backoff(&connector, RetryPolicy::default()).await?;
    bind_outbound(&manager, connection.outbound);
    let (pump_stop, pump_rx) = broadcast::channel(1);
    let pump = spawn_inbound_pump(Arc::clone(&manager), connection.inbound, pump_rx);

    if manager.is_enabled() {
        manager.start()?;
    } else {
        log::info!("Queueing disabled; messages pass straight to the transport");
    }
    manager.set_connection_state(quality != ConnectionQuality::Offline, quality);

    let capture = audio.start_capture(&manager)?;
    let config = audio.config().clone();
    let block_samples = (config.capture_sample_rate as u64 * config.chunk_ms / 1000).max(1) as usize;
    let chunk = config.chunk_duration();

    let mut summary = SessionSummary::default();
    let mut audio_tick = interval(chunk);
    let mut text_tick = interval(Duration::from_millis(simulation.text_interval_ms.max(1)));
    let mut video_tick = interval(Duration::from_millis(simulation.video_interval_ms.max(1)));
    for tick in [&mut audio_tick, &mut text_tick, &mut video_tick] {
        tick.set_missed_tick_behavior(MissedTickBehavior::Skip);
    }
    let deadline = sleep(duration);
    tokio::pin!(deadline);
    let mut tone_offset = 0u64;

    loop {
        tokio::select! {
            _ = audio_tick.tick() => {
                let block = tone_block(simulation.tone_hz, config.capture_sample_rate, tone_offset, block_samples);
                tone_offset += block_samples as u64;
                if capture.feed.try_push(block)? {
                    summary.capture_blocks += 1;
                }
                summary.playback_chunks += audio.pull_due(Instant::now(), chunk).len() as u64;
                while let Ok(event) = events.try_recv() {
                    summary.events_seen += 1;
                    log::trace!("Event: {}", event.kind());
                }
            }
            _ = text_tick.tick() => {
                let text = format!("ping {}", summary.texts_sent + 1);
                if manager.send(TrafficClass::Text, Payload::from(text), SendOptions::batchable()) {
                    summary.texts_sent += 1;
                }
            }
            _ = video_tick.tick() => {
                if manager.send(TrafficClass::Video, Payload::from(FAKE_JPEG.to_vec()), SendOptions::default()) {
                    summary.video_frames_sent += 1;
                }
            }
            _ = &mut deadline => break,
            _ = shutdown_rx.recv() => {
                log::info!("Shutdown requested; finishing session");
                summary.interrupted = true;
                break;
            }
        }
    }

    audio.stop_capture();
    drop(capture.feed);
    summary.capture = capture.forwarder.await.ok();
    if manager.is_running() {
        manager.stop().await;
    }
    manager.process_tick();
    let _ = pump_stop.send(());
    summary.inbound_frames = pump.await.unwrap_or_default();
    manager.unsubscribe("startup");
    Ok(summary)
}
