//! Progress reporting service
//!
//! A best-effort liveness signal that runs beside the request. It knows
//! nothing about how far the external call has actually got: it only tells
//! the requester, at a fixed cadence, which stage the workflow is in and how
//! long it has been waiting.

use crate::error::Result;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn, Instrument};

/// Stages of a single background removal request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProcessingStage {
    /// Fetching the uploaded image from the chat platform
    #[default]
    Downloading,
    /// Waiting on the external processing API
    RemovingBackground,
}

impl ProcessingStage {
    /// Get a human-readable description of the processing stage
    #[must_use]
    pub fn description(&self) -> &'static str {
        match self {
            ProcessingStage::Downloading => "Downloading your photo",
            ProcessingStage::RemovingBackground => "Removing background",
        }
    }

    /// Emoji shown in front of the description
    #[must_use]
    pub fn emoji(&self) -> &'static str {
        match self {
            ProcessingStage::Downloading => "📥",
            ProcessingStage::RemovingBackground => "🪄",
        }
    }
}

/// One "still working" signal
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressUpdate {
    /// 1-based count of signals emitted by this reporter
    pub tick: u64,
    /// Stage the workflow reported most recently
    pub stage: ProcessingStage,
    /// Time since the reporter started
    pub elapsed: Duration,
}

impl ProgressUpdate {
    /// Text shown to the requester, e.g. "🪄 Removing background... 6s"
    #[must_use]
    pub fn label(&self) -> String {
        format!(
            "{} {}... {}s",
            self.stage.emoji(),
            self.stage.description(),
            self.elapsed.as_secs()
        )
    }
}

/// Destination of progress signals
#[async_trait]
pub trait ProgressSink: Send + Sync + 'static {
    /// Deliver one signal. Errors are logged by the reporter and never stop it.
    async fn emit(&self, update: &ProgressUpdate) -> Result<()>;
}

/// Spawns cancellable progress tasks
pub struct ProgressReporter;

impl ProgressReporter {
    /// Start emitting to `sink` every `interval` until the handle is cancelled
    ///
    /// The first signal goes out one interval after start. The task inherits
    /// the caller's tracing span.
    pub fn start(sink: Arc<dyn ProgressSink>, interval: Duration) -> ProgressHandle {
        let token = CancellationToken::new();
        let (stage_tx, stage_rx) = watch::channel(ProcessingStage::default());

        let task = tokio::spawn(
            run(sink, interval, token.clone(), stage_rx).instrument(tracing::Span::current()),
        );

        ProgressHandle {
            token,
            stage: Arc::new(stage_tx),
            task: Some(task),
        }
    }
}

async fn run(
    sink: Arc<dyn ProgressSink>,
    interval: Duration,
    token: CancellationToken,
    stage: watch::Receiver<ProcessingStage>,
) -> u64 {
    let started = Instant::now();
    let mut ticker = tokio::time::interval_at(started + interval, interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut ticks = 0u64;

    loop {
        tokio::select! {
            biased;
            () = token.cancelled() => break,
            _ = ticker.tick() => {},
        }

        ticks += 1;
        let update = ProgressUpdate {
            tick: ticks,
            stage: *stage.borrow(),
            elapsed: started.elapsed(),
        };

        // An emission that started before cancellation is allowed to finish;
        // the owner awaits this task, so it lands before the final message.
        if let Err(e) = sink.emit(&update).await {
            warn!(tick = ticks, error = %e, "Progress signal failed, continuing");
        }
    }

    debug!(ticks, "Progress reporter stopped");
    ticks
}

/// Updates the stage shown by a running reporter
#[derive(Debug, Clone)]
pub struct StageUpdater {
    stage: Arc<watch::Sender<ProcessingStage>>,
}

impl StageUpdater {
    /// Report the stage the workflow has entered
    pub fn set(&self, stage: ProcessingStage) {
        self.stage.send_replace(stage);
    }
}

/// Owner of a running progress task
///
/// Dropping the handle requests cancellation; [`ProgressHandle::cancel`]
/// additionally waits until the task has exited.
#[derive(Debug)]
pub struct ProgressHandle {
    token: CancellationToken,
    stage: Arc<watch::Sender<ProcessingStage>>,
    task: Option<JoinHandle<u64>>,
}

impl ProgressHandle {
    /// Handle for reporting stage changes from other tasks
    #[must_use]
    pub fn stage_updater(&self) -> StageUpdater {
        StageUpdater {
            stage: Arc::clone(&self.stage),
        }
    }

    /// Whether cancellation has been requested
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Cancel the task and wait for it to exit
    ///
    /// Returns the number of signals the task emitted. No signal is emitted
    /// after this returns.
    pub async fn cancel(mut self) -> u64 {
        self.token.cancel();
        match self.task.take() {
            Some(task) => match task.await {
                Ok(ticks) => ticks,
                Err(e) => {
                    warn!(error = %e, "Progress task ended abnormally");
                    0
                },
            },
            None => 0,
        }
    }
}

impl Drop for ProgressHandle {
    fn drop(&mut self) {
        self.token.cancel();
    }
}
