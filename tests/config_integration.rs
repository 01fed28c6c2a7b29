//! Configuration layering tests
//!
//! Built-in defaults, then the TOML file, then command line flags.

use clap::Parser;
use livequeue::app::cli::api::{Args, ConfigError, ConfigFile, EffectiveConfig};
use livequeue::app::startup::apply_args;
use livequeue::core::registry::Registry;
use livequeue::queue::api::{OverflowStrategy, TrafficClass};
use std::fs;

fn effective_from(contents: &str, flags: &[&str]) -> Result<EffectiveConfig, ConfigError> {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("livequeue.toml");
    fs::write(&path, contents).unwrap();

    let mut argv = vec!["livequeue", "--config-file", path.to_str().unwrap()];
    argv.extend_from_slice(flags);
    let args = Args::try_parse_from(argv).unwrap();

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap();
    let (_, file) = runtime
        .block_on(ConfigFile::load(args.config_file.as_deref()))?
        .expect("explicit file should load");

    let mut effective = EffectiveConfig::default();
    file.apply(&mut effective)?;
    apply_args(&args, &mut effective);
    effective.validate()?;
    Ok(effective)
}

#[test]
fn test_flags_override_file_values() {
    let effective = effective_from(
        r#"
        enabled = true

        [audio]
        volume = 0.8

        [simulation]
        duration_secs = 10
        "#,
        &["--disable-queue", "--duration", "2", "--volume", "3.0"],
    )
    .unwrap();

    assert!(!effective.queue.enabled);
    assert_eq!(effective.simulation.duration_secs, 2);
    assert_eq!(effective.audio.volume, 1.0);
}

#[test]
fn test_file_values_reach_the_manager() {
    let effective = effective_from(
        r#"
        [outbound.video]
        max_size = 2
        overflow_strategy = "replace_newest"
        "#,
        &[],
    )
    .unwrap();

    let registry = Registry::new();
    registry
        .init(effective.queue.clone(), effective.audio.clone())
        .unwrap();
    let manager = registry.manager().unwrap();
    let video = manager.config().outbound.get(TrafficClass::Video);
    assert_eq!(video.max_size, 2);
    assert_eq!(video.overflow_strategy, OverflowStrategy::ReplaceNewest);
}

#[test]
fn test_invalid_values_rejected_before_startup() {
    let err = effective_from("[audio]\nmin_threshold_ms = 900.0\n", &[]).unwrap_err();
    assert!(matches!(err, ConfigError::Invalid(_)));

    let err = effective_from("enabled = \"yes\"\n", &[]).unwrap_err();
    assert!(matches!(err, ConfigError::Parse { .. }));
}

#[test]
fn test_printed_config_includes_file_values() {
    let original = effective_from("offline_buffer_size = 7\n", &[]).unwrap();
    let rendered = original.to_toml().unwrap();
    assert!(rendered.contains("offline_buffer_size = 7"));
    assert!(rendered.contains("[inbound.audio]"));
}
