//! Headless runner - feeds a source through the async buffer driver
//!
//! Input is ingested in fixed-size chunks. A chunk the buffer rejects is
//! reported and skipped; the rest of the input still flows. Once the input
//! is exhausted the pending batch is flushed and the final metrics and
//! view window are emitted.

use std::path::PathBuf;

use tokio::fs::File;
use tokio::io::{AsyncBufRead, BufReader};

use surge_app::config::{load_settings, Settings};
use surge_app::runtime::{self, BufferHandle};
use surge_app::{ConfigUpdate, MessageBuffer, PerformanceMode};
use surge_core::prelude::*;
use surge_core::{MessageItem, ViewportGeometry};

use super::source::{generate_burst, LineSource, SourceLine};
use super::HeadlessEvent;

/// Default number of messages per `ingest()` call
pub const DEFAULT_CHUNK_SIZE: usize = 25;

/// Where headless input comes from
#[derive(Debug, Clone, PartialEq)]
pub enum InputSource {
    Stdin,
    File(PathBuf),
    /// A synthetic burst of this many messages
    Generate(usize),
}

/// Everything a headless run needs, resolved from the command line
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub project_path: PathBuf,
    pub source: InputSource,
    pub chunk_size: usize,
    /// Overrides the configured starting mode
    pub mode: Option<PerformanceMode>,
    pub scroll_offset_px: f64,
    pub viewport_height_px: f64,
    /// Also emit every buffer mutation as it happens
    pub emit_buffer_events: bool,
}

impl RunOptions {
    pub fn new(project_path: PathBuf, source: InputSource) -> Self {
        Self {
            project_path,
            source,
            chunk_size: DEFAULT_CHUNK_SIZE,
            mode: None,
            scroll_offset_px: 0.0,
            viewport_height_px: 0.0,
            emit_buffer_events: false,
        }
    }
}

/// Run in headless mode - output JSON events to stdout
pub async fn run_headless(options: RunOptions) -> Result<()> {
    info!("═══════════════════════════════════════════════════════");
    info!("surge starting in HEADLESS mode");
    info!("Project: {}", options.project_path.display());
    info!("Source: {:?}", options.source);
    info!("═══════════════════════════════════════════════════════");

    let settings = load_settings(&options.project_path);
    let buffer = build_buffer(&settings, options.mode)?;
    let task = runtime::spawn(buffer, &settings.monitor);
    let handle = task.handle();

    if options.emit_buffer_events {
        handle
            .subscribe(|change| HeadlessEvent::buffer(change).emit())
            .await?;
    }

    let mut feeder = ChunkFeeder::new(handle.clone(), options.chunk_size);
    let result = match &options.source {
        InputSource::Generate(count) => {
            let burst = generate_burst(*count, &mut rand::thread_rng());
            feeder.feed_all(burst).await
        }
        InputSource::File(path) => match File::open(path).await {
            Ok(file) => feeder.feed_lines(BufReader::new(file)).await,
            Err(e) => Err(Error::from(e)),
        },
        InputSource::Stdin => {
            feeder
                .feed_lines(BufReader::new(tokio::io::stdin()))
                .await
        }
    };

    if let Err(e) = &result {
        warn!("Input stopped early: {}", e);
    }

    let report = report(&handle, &settings, &options).await;
    task.shutdown().await?;

    info!(
        "surge headless run finished: {} ingested, {} rejected",
        feeder.accepted, feeder.rejected
    );
    result.and(report)
}

/// Build the buffer from loaded settings, applying a mode override first.
pub fn build_buffer(settings: &Settings, mode: Option<PerformanceMode>) -> Result<MessageBuffer> {
    let config = match mode {
        Some(mode) => ConfigUpdate::mode(mode).apply_to(&settings.buffer)?,
        None => settings.buffer.clone(),
    };
    MessageBuffer::with_monitor(config, &settings.monitor)
}

async fn report(handle: &BufferHandle, settings: &Settings, options: &RunOptions) -> Result<()> {
    handle.flush().await?;

    let config = handle.config().await?;
    let size = handle.get_all().await?.len();
    let metrics = handle.metrics().await?;
    HeadlessEvent::metrics(config.performance_mode, size, metrics).emit();

    let geometry = ViewportGeometry::new(
        options.scroll_offset_px,
        options.viewport_height_px,
        settings.view.item_height_px,
    )
    .with_overscan(settings.view.overscan);
    let window = handle.view_window(geometry).await?;
    HeadlessEvent::window(&window).emit();

    Ok(())
}

/// Groups incoming messages into `ingest()` calls of a fixed size.
struct ChunkFeeder {
    handle: BufferHandle,
    chunk_size: usize,
    pending: Vec<MessageItem>,
    accepted: usize,
    rejected: usize,
}

impl ChunkFeeder {
    fn new(handle: BufferHandle, chunk_size: usize) -> Self {
        let chunk_size = chunk_size.max(1);
        Self {
            handle,
            chunk_size,
            pending: Vec::with_capacity(chunk_size),
            accepted: 0,
            rejected: 0,
        }
    }

    async fn feed_all(&mut self, items: Vec<MessageItem>) -> Result<()> {
        for item in items {
            self.push(item).await?;
        }
        self.send().await
    }

    async fn feed_lines<R: AsyncBufRead + Unpin>(&mut self, reader: R) -> Result<()> {
        let mut source = LineSource::new(reader);
        while let Some(line) = source.next_line().await? {
            match line {
                SourceLine::Item(item) => self.push(item).await?,
                SourceLine::Malformed { line, error } => {
                    warn!("Skipping input line {}: {}", line, error);
                    self.rejected += 1;
                    HeadlessEvent::ingest_rejected(Some(line), 1, &error).emit();
                }
            }
        }
        self.send().await
    }

    async fn push(&mut self, item: MessageItem) -> Result<()> {
        self.pending.push(item);
        if self.pending.len() >= self.chunk_size {
            self.send().await?;
        }
        Ok(())
    }

    async fn send(&mut self) -> Result<()> {
        if self.pending.is_empty() {
            return Ok(());
        }
        let chunk = std::mem::replace(&mut self.pending, Vec::with_capacity(self.chunk_size));
        let count = chunk.len();

        match self.handle.ingest(chunk).await {
            Ok(()) => {
                self.accepted += count;
                Ok(())
            }
            Err(e) if e.is_recoverable() => {
                self.rejected += count;
                HeadlessEvent::ingest_rejected(None, count, &e).emit();
                Ok(())
            }
            Err(e) => Err(e),
        }
    }
}
