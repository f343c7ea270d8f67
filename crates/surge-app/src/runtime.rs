//! Async driver for a [`MessageBuffer`].
//!
//! [`spawn`] moves the buffer into a tokio task that owns it exclusively.
//! The task multiplexes four sources with `tokio::select!`:
//! - commands from [`BufferHandle`] (mpsc, each answered over a oneshot)
//! - the monitor sampling interval
//! - the batcher's flush deadline
//! - a `watch` shutdown signal
//!
//! Because only the task touches the buffer, ingest, flush, prune, and mode
//! switches never interleave.

use std::time::Duration;

use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};

use surge_core::prelude::*;
use surge_core::{MessageItem, Metrics, OwnedViewWindow, ViewportGeometry};

use crate::buffer::{BufferEvent, MessageBuffer, SubscriptionId};
use crate::config::{BufferConfig, ConfigUpdate, MonitorSettings};

/// Capacity of the command channel between handles and the driver task.
const COMMAND_CHANNEL_CAPACITY: usize = 256;

type Reply<T> = oneshot::Sender<T>;
type Predicate = Box<dyn Fn(&MessageItem) -> bool + Send>;
type Callback = Box<dyn Fn(&BufferEvent) + Send>;

enum Command {
    Ingest {
        items: Vec<MessageItem>,
        reply: Reply<Result<()>>,
    },
    Flush {
        reply: Reply<Result<usize>>,
    },
    GetAll {
        predicate: Option<Predicate>,
        reply: Reply<Vec<MessageItem>>,
    },
    GetChunk {
        start: usize,
        count: usize,
        reply: Reply<Vec<MessageItem>>,
    },
    ViewWindow {
        geometry: ViewportGeometry,
        reply: Reply<OwnedViewWindow<MessageItem>>,
    },
    Metrics {
        reply: Reply<Metrics>,
    },
    ResetMetrics {
        reply: Reply<()>,
    },
    Config {
        reply: Reply<BufferConfig>,
    },
    UpdateConfig {
        update: ConfigUpdate,
        reply: Reply<Result<()>>,
    },
    Subscribe {
        callback: Callback,
        reply: Reply<SubscriptionId>,
    },
    Unsubscribe {
        id: SubscriptionId,
        reply: Reply<bool>,
    },
    Clear {
        reply: Reply<()>,
    },
}

/// Cloneable front end to a buffer running in its own task.
///
/// Every method fails with [`Error::ChannelClosed`] once the task is gone.
#[derive(Debug, Clone)]
pub struct BufferHandle {
    cmd_tx: mpsc::Sender<Command>,
    shutdown_tx: std::sync::Arc<watch::Sender<bool>>,
}

/// Owns the driver task. Dropping it does not stop the task; call
/// [`BufferTask::shutdown`].
#[derive(Debug)]
pub struct BufferTask {
    handle: BufferHandle,
    join: JoinHandle<()>,
}

/// Start the driver task for `buffer`.
///
/// Must be called from within a tokio runtime.
pub fn spawn(buffer: MessageBuffer, settings: &MonitorSettings) -> BufferTask {
    let (cmd_tx, cmd_rx) = mpsc::channel(COMMAND_CHANNEL_CAPACITY);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let sample_interval = settings.sample_interval();

    let join = tokio::spawn(run(buffer, cmd_rx, shutdown_rx, sample_interval));
    info!("Buffer driver started, sampling every {:?}", sample_interval);

    BufferTask {
        handle: BufferHandle {
            cmd_tx,
            shutdown_tx: std::sync::Arc::new(shutdown_tx),
        },
        join,
    }
}

impl BufferTask {
    pub fn handle(&self) -> BufferHandle {
        self.handle.clone()
    }

    /// Signal the task to stop and wait for it. Pending items are discarded
    /// and subscribers released.
    pub async fn shutdown(self) -> Result<()> {
        let _ = self.handle.shutdown_tx.send(true);
        self.join.await.map_err(|e| {
            error!("Buffer driver task failed: {}", e);
            Error::ChannelClosed
        })
    }
}

impl BufferHandle {
    async fn request<T>(&self, build: impl FnOnce(Reply<T>) -> Command) -> Result<T> {
        let (reply, rx) = oneshot::channel();
        self.cmd_tx
            .send(build(reply))
            .await
            .map_err(|_| Error::ChannelClosed)?;
        rx.await.map_err(|_| Error::ChannelClosed)
    }

    pub async fn ingest(&self, items: Vec<MessageItem>) -> Result<()> {
        self.request(|reply| Command::Ingest { items, reply }).await?
    }

    /// Force the pending batch into the store now.
    pub async fn flush(&self) -> Result<usize> {
        self.request(|reply| Command::Flush { reply }).await?
    }

    pub async fn get_all(&self) -> Result<Vec<MessageItem>> {
        self.request(|reply| Command::GetAll {
            predicate: None,
            reply,
        })
        .await
    }

    pub async fn get_filtered<F>(&self, predicate: F) -> Result<Vec<MessageItem>>
    where
        F: Fn(&MessageItem) -> bool + Send + 'static,
    {
        self.request(|reply| Command::GetAll {
            predicate: Some(Box::new(predicate)),
            reply,
        })
        .await
    }

    pub async fn get_chunk(&self, start: usize, count: usize) -> Result<Vec<MessageItem>> {
        self.request(|reply| Command::GetChunk {
            start,
            count,
            reply,
        })
        .await
    }

    pub async fn view_window(
        &self,
        geometry: ViewportGeometry,
    ) -> Result<OwnedViewWindow<MessageItem>> {
        self.request(|reply| Command::ViewWindow { geometry, reply })
            .await
    }

    pub async fn metrics(&self) -> Result<Metrics> {
        self.request(|reply| Command::Metrics { reply }).await
    }

    pub async fn reset_metrics(&self) -> Result<()> {
        self.request(|reply| Command::ResetMetrics { reply }).await
    }

    pub async fn config(&self) -> Result<BufferConfig> {
        self.request(|reply| Command::Config { reply }).await
    }

    pub async fn update_config(&self, update: ConfigUpdate) -> Result<()> {
        self.request(|reply| Command::UpdateConfig { update, reply })
            .await?
    }

    /// Register a callback. It runs on the driver task, so it must not block.
    pub async fn subscribe<F>(&self, callback: F) -> Result<SubscriptionId>
    where
        F: Fn(&BufferEvent) + Send + 'static,
    {
        self.request(|reply| Command::Subscribe {
            callback: Box::new(callback),
            reply,
        })
        .await
    }

    pub async fn unsubscribe(&self, id: SubscriptionId) -> Result<bool> {
        self.request(|reply| Command::Unsubscribe { id, reply })
            .await
    }

    pub async fn clear(&self) -> Result<()> {
        self.request(|reply| Command::Clear { reply }).await
    }

    pub fn is_closed(&self) -> bool {
        self.cmd_tx.is_closed()
    }
}

async fn run(
    mut buffer: MessageBuffer,
    mut cmd_rx: mpsc::Receiver<Command>,
    mut shutdown_rx: watch::Receiver<bool>,
    sample_interval: Duration,
) {
    let mut sample_tick = time::interval(sample_interval);
    sample_tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        let flush_deadline = buffer.flush_deadline().map(Instant::from_std);

        tokio::select! {
            changed = shutdown_rx.changed() => {
                if changed.is_err() || *shutdown_rx.borrow() {
                    debug!("Buffer driver received shutdown");
                    break;
                }
            }
            cmd = cmd_rx.recv() => {
                let Some(cmd) = cmd else {
                    debug!("All buffer handles dropped");
                    break;
                };
                handle_command(&mut buffer, cmd);
            }
            _ = sample_tick.tick() => {
                if let Err(e) = buffer.sample(now()) {
                    warn!("Performance sample failed: {}", e);
                }
            }
            _ = sleep_until(flush_deadline) => {
                if let Err(e) = buffer.poll(now()) {
                    warn!("Deferred flush failed: {}", e);
                }
            }
        }
    }

    buffer.destroy();
    info!("Buffer driver stopped");
}

fn handle_command(buffer: &mut MessageBuffer, cmd: Command) {
    // A dropped receiver only means the caller stopped waiting.
    match cmd {
        Command::Ingest { items, reply } => {
            let _ = reply.send(buffer.ingest_at(items, now()));
        }
        Command::Flush { reply } => {
            let _ = reply.send(buffer.flush_at(now()));
        }
        Command::GetAll { predicate, reply } => {
            let items = match &predicate {
                Some(p) => buffer.get_all(Some(&|item: &MessageItem| p(item))),
                None => buffer.get_all(None),
            };
            let _ = reply.send(items);
        }
        Command::GetChunk {
            start,
            count,
            reply,
        } => {
            let _ = reply.send(buffer.get_chunk(start, count));
        }
        Command::ViewWindow { geometry, reply } => {
            let _ = reply.send(buffer.view_window(geometry).into_owned());
        }
        Command::Metrics { reply } => {
            let _ = reply.send(buffer.get_metrics());
        }
        Command::ResetMetrics { reply } => {
            buffer.reset_metrics();
            let _ = reply.send(());
        }
        Command::Config { reply } => {
            let _ = reply.send(buffer.config().clone());
        }
        Command::UpdateConfig { update, reply } => {
            let _ = reply.send(buffer.update_config_at(update, now()));
        }
        Command::Subscribe { callback, reply } => {
            let _ = reply.send(buffer.subscribe(callback));
        }
        Command::Unsubscribe { id, reply } => {
            let _ = reply.send(buffer.unsubscribe(id));
        }
        Command::Clear { reply } => {
            buffer.clear();
            let _ = reply.send(());
        }
    }
}

/// Sleep until `deadline`, or forever if there is none.
async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

/// Current time from tokio's clock, so paused-time tests drive the buffer.
fn now() -> std::time::Instant {
    Instant::now().into_std()
}
