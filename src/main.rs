//! surge - bounded, batching, self-tuning message buffer
//!
//! This is the binary entry point. All logic lives in the library.

use std::path::PathBuf;

use clap::Parser;
use surge::headless::runner::DEFAULT_CHUNK_SIZE;
use surge::{InputSource, RunOptions};
use surge_app::config::init_config_dir;
use surge_app::PerformanceMode;

/// surge - drive a message stream through a bounded, self-tuning buffer
#[derive(Parser, Debug)]
#[command(name = "surge")]
#[command(about = "Drive a message stream through a bounded, self-tuning buffer", long_about = None)]
struct Args {
    /// NDJSON file of messages (reads stdin when omitted)
    #[arg(long, value_name = "FILE", conflicts_with = "generate")]
    input: Option<PathBuf>,

    /// Project directory holding .surge/config.toml
    #[arg(long, value_name = "DIR")]
    project: Option<PathBuf>,

    /// Messages per ingest call
    #[arg(long, value_name = "N", default_value_t = DEFAULT_CHUNK_SIZE)]
    chunk: usize,

    /// Generate a synthetic burst of N messages instead of reading input
    #[arg(long, value_name = "N")]
    generate: Option<usize>,

    /// Starting performance mode (normal, high_frequency, ultra_performance)
    #[arg(long, value_name = "MODE")]
    mode: Option<PerformanceMode>,

    /// Scroll offset for the reported view window, in pixels
    #[arg(long, value_name = "PX", default_value_t = 0.0)]
    scroll: f64,

    /// Viewport height for the reported view window, in pixels
    #[arg(long, value_name = "PX", default_value_t = 400.0)]
    viewport: f64,

    /// Emit every buffer mutation as an event
    #[arg(long)]
    events: bool,

    /// Write a default .surge/config.toml if none exists
    #[arg(long)]
    init: bool,
}

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;
    let args = Args::parse();

    surge_core::logging::init()?;

    // Get project path from args or use current directory
    let project_path = args
        .project
        .unwrap_or_else(|| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")));

    if args.init {
        init_config_dir(&project_path)?;
    }

    let source = match (args.generate, args.input) {
        (Some(count), _) => InputSource::Generate(count),
        (None, Some(path)) => InputSource::File(path),
        (None, None) => InputSource::Stdin,
    };

    let options = RunOptions {
        chunk_size: args.chunk,
        mode: args.mode,
        scroll_offset_px: args.scroll,
        viewport_height_px: args.viewport,
        emit_buffer_events: args.events,
        ..RunOptions::new(project_path, source)
    };

    surge::run_headless(options).await?;
    Ok(())
}
