//! Integration tests for settings loading and headless runs

use std::fs;

use tempfile::TempDir;

use surge::headless::runner::build_buffer;
use surge::{run_headless, InputSource, RunOptions};
use surge_app::config::{config_path, init_config_dir, load_settings, save_settings};
use surge_app::{OrderingPolicy, PerformanceMode, Settings};

#[test]
fn init_then_load_yields_defaults() {
    let temp = TempDir::new().unwrap();
    init_config_dir(temp.path()).unwrap();

    assert!(config_path(temp.path()).exists());
    assert_eq!(load_settings(temp.path()), Settings::default());
}

#[test]
fn saved_settings_drive_the_buffer() {
    let temp = TempDir::new().unwrap();
    let mut settings = Settings::default();
    settings.buffer.max_messages = 40;
    settings.buffer.prune_threshold = 60;
    settings.buffer.ordering = OrderingPolicy::BatchRecency;
    save_settings(temp.path(), &settings).unwrap();

    let loaded = load_settings(temp.path());
    let buffer = build_buffer(&loaded, None).unwrap();
    assert_eq!(buffer.config().max_messages, 40);
    assert_eq!(buffer.config().ordering, OrderingPolicy::BatchRecency);

    let buffer = build_buffer(&loaded, Some(PerformanceMode::HighFrequency)).unwrap();
    assert_eq!(buffer.config().max_messages, 500);
    assert_eq!(buffer.config().ordering, OrderingPolicy::BatchRecency);
}

#[test]
fn invalid_settings_file_falls_back_to_defaults() {
    let temp = TempDir::new().unwrap();
    init_config_dir(temp.path()).unwrap();
    fs::write(config_path(temp.path()), "[buffer\nmax_messages = ").unwrap();

    assert_eq!(load_settings(temp.path()), Settings::default());
}

#[tokio::test]
async fn headless_run_over_file_input() {
    let temp = TempDir::new().unwrap();
    let input = temp.path().join("messages.ndjson");
    let lines: Vec<String> = (0..60)
        .map(|n| format!(r#"{{"id":"m{}","timestamp":{},"priority":"low"}}"#, n, n))
        .chain(std::iter::once("not json".to_string()))
        .collect();
    fs::write(&input, lines.join("\n")).unwrap();

    let options = RunOptions {
        chunk_size: 8,
        ..RunOptions::new(temp.path().to_path_buf(), InputSource::File(input))
    };
    run_headless(options).await.unwrap();
}

#[tokio::test]
async fn headless_run_with_missing_input_fails() {
    let temp = TempDir::new().unwrap();
    let options = RunOptions::new(
        temp.path().to_path_buf(),
        InputSource::File(temp.path().join("absent.ndjson")),
    );
    assert!(run_headless(options).await.is_err());
}

#[tokio::test]
async fn headless_run_with_generated_burst() {
    let temp = TempDir::new().unwrap();
    let options = RunOptions {
        mode: Some(PerformanceMode::UltraPerformance),
        viewport_height_px: 200.0,
        emit_buffer_events: true,
        ..RunOptions::new(temp.path().to_path_buf(), InputSource::Generate(300))
    };
    run_headless(options).await.unwrap();
}
