//! Long-polling update delivery.
//!
//! # Design
//! `UpdatePoller` runs `getUpdates` in a spawned task and pushes updates into
//! a bounded channel. The task owns the cursor and advances it past every
//! update it emits, so a replayed batch never yields duplicates. A failed
//! fetch is logged and retried after a fixed delay, forever.
//!
//! Shutdown is a `CancellationToken` checked once per iteration. A fetch
//! already in flight is allowed to finish; only the retry sleep and a send
//! blocked on a full channel are interrupted. Dropping the receiving side
//! also ends the task after its current fetch.

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use async_trait::async_trait;
use futures::Stream;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TryRecvError;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::configs::UpdateConfig;
use crate::error::Result;
use crate::types::Update;

/// Wait between a failed fetch and the next attempt.
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(3);

/// Capacity of the update channel.
pub const DEFAULT_BUFFER: usize = 100;

/// Anything that can answer a `getUpdates` call.
#[async_trait]
pub trait UpdateSource: Send + Sync + 'static {
    async fn fetch_updates(&self, config: &UpdateConfig) -> Result<Vec<Update>>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollerState {
    Running,
    /// Shutdown requested; the current fetch is still finishing.
    Stopping,
    Stopped,
}

/// Next update id the poller will accept.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Cursor {
    offset: i64,
}

impl Cursor {
    pub fn new(offset: i64) -> Self {
        Self { offset }
    }

    pub fn offset(&self) -> i64 {
        self.offset
    }

    /// Accept `update_id` if it is not behind the cursor, advancing past it.
    pub fn admit(&mut self, update_id: i64) -> bool {
        if update_id < self.offset {
            return false;
        }
        self.offset = update_id.saturating_add(1);
        true
    }

    /// Keep the updates of `batch` the cursor admits, in order.
    pub fn filter(&mut self, batch: Vec<Update>) -> Vec<Update> {
        batch
            .into_iter()
            .filter(|update| self.admit(update.update_id))
            .collect()
    }
}

pub struct UpdatePoller<S> {
    source: Arc<S>,
    config: UpdateConfig,
    buffer: usize,
    retry_delay: Duration,
}

impl<S: UpdateSource> UpdatePoller<S> {
    pub fn new(source: S, config: UpdateConfig) -> Self {
        Self {
            source: Arc::new(source),
            config,
            buffer: DEFAULT_BUFFER,
            retry_delay: DEFAULT_RETRY_DELAY,
        }
    }

    pub fn buffer(mut self, buffer: usize) -> Self {
        self.buffer = buffer.max(1);
        self
    }

    pub fn retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    /// Start polling on the current tokio runtime.
    pub fn spawn(self) -> UpdatesChannel {
        let (tx, receiver) = mpsc::channel(self.buffer);
        let shutdown = CancellationToken::new();
        let task = tokio::spawn(run(
            self.source,
            self.config,
            tx,
            shutdown.clone(),
            self.retry_delay,
        ));
        UpdatesChannel {
            receiver,
            shutdown,
            task,
        }
    }
}

async fn run<S: UpdateSource>(
    source: Arc<S>,
    mut config: UpdateConfig,
    tx: mpsc::Sender<Update>,
    shutdown: CancellationToken,
    retry_delay: Duration,
) {
    let mut cursor = Cursor::new(config.offset);
    info!(offset = cursor.offset(), "update poller started");

    'poll: loop {
        if shutdown.is_cancelled() || tx.is_closed() {
            break;
        }

        config.offset = cursor.offset();
        let batch = match source.fetch_updates(&config).await {
            Ok(batch) => batch,
            Err(err) => {
                warn!(error = %err, retry_in = ?retry_delay, "failed to get updates, retrying");
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = tokio::time::sleep(retry_delay) => continue,
                }
            }
        };

        let fetched = batch.len();
        let admitted = cursor.filter(batch);
        if admitted.len() < fetched {
            debug!(
                dropped = fetched - admitted.len(),
                offset = cursor.offset(),
                "dropped updates behind the cursor"
            );
        }

        for update in admitted {
            tokio::select! {
                biased;
                sent = tx.send(update) => {
                    if sent.is_err() {
                        break 'poll;
                    }
                }
                _ = shutdown.cancelled() => break 'poll,
            }
        }
    }

    info!(offset = cursor.offset(), "update poller stopped");
}

/// Receiving end of a running poller.
///
/// Also a `futures::Stream` of updates. The stream ends once the poller has
/// stopped and every buffered update has been read.
pub struct UpdatesChannel {
    receiver: mpsc::Receiver<Update>,
    shutdown: CancellationToken,
    task: JoinHandle<()>,
}

impl UpdatesChannel {
    /// Next update, or `None` once the poller has stopped.
    pub async fn recv(&mut self) -> Option<Update> {
        self.receiver.recv().await
    }

    pub fn try_recv(&mut self) -> std::result::Result<Update, TryRecvError> {
        self.receiver.try_recv()
    }

    /// Ask the poller to stop after its current fetch.
    pub fn stop(&self) {
        if self.shutdown.is_cancelled() || self.task.is_finished() {
            warn!("update poller already stopped");
            return;
        }
        info!("stopping update poller");
        self.shutdown.cancel();
    }

    pub fn state(&self) -> PollerState {
        if self.task.is_finished() {
            PollerState::Stopped
        } else if self.shutdown.is_cancelled() {
            PollerState::Stopping
        } else {
            PollerState::Running
        }
    }

    /// Stop the poller, discard buffered updates and wait for the task.
    pub async fn close(self) {
        let Self {
            receiver,
            shutdown,
            task,
        } = self;
        shutdown.cancel();
        drop(receiver);
        if let Err(err) = task.await {
            warn!(error = %err, "update poller task failed");
        }
    }
}

impl Stream for UpdatesChannel {
    type Item = Update;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Update>> {
        self.receiver.poll_recv(cx)
    }
}
