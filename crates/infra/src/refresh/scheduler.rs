use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::info;

use super::orchestrator::SuggestionRefresher;
use super::summary::{RefreshSummary, SummaryBoard};

/// Periodic driver for [`SuggestionRefresher`].
#[derive(Debug, Clone)]
pub struct RefreshScheduler {
    pub interval: Duration,
}

impl Default for RefreshScheduler {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(86_400),
        }
    }
}

/// Handle for the running scheduler (shutdown + trigger hook).
#[derive(Debug)]
pub struct RefreshSchedulerHandle {
    shutdown: watch::Sender<bool>,
    trigger: mpsc::Sender<()>,
    board: SummaryBoard,
    join: JoinHandle<()>,
}

impl RefreshSchedulerHandle {
    /// Request an extra run.
    ///
    /// Triggers are coalesced (capacity 1): if a run is already queued this is a no-op.
    pub fn trigger(&self) {
        let _ = self.trigger.try_send(());
    }

    pub fn board(&self) -> SummaryBoard {
        self.board.clone()
    }

    pub fn last_summary(&self) -> Option<RefreshSummary> {
        self.board.latest()
    }

    /// Stop after the current run (if any) and wait for the task to exit.
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        let _ = self.join.await;
    }
}

impl RefreshScheduler {
    pub fn new(interval: Duration) -> Self {
        Self { interval }
    }

    /// Spawn the scheduler on the current tokio runtime.
    ///
    /// - Schedule: runs once immediately, then every `interval`
    /// - Trigger: `handle.trigger()` queues one extra run
    /// - Each finished run is published to `board`
    pub fn spawn(&self, refresher: Arc<SuggestionRefresher>, board: SummaryBoard) -> RefreshSchedulerHandle {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let (trigger_tx, trigger_rx) = mpsc::channel::<()>(1);

        let join = tokio::spawn(scheduler_loop(
            self.interval,
            refresher,
            board.clone(),
            shutdown_rx,
            trigger_rx,
        ));

        RefreshSchedulerHandle {
            shutdown: shutdown_tx,
            trigger: trigger_tx,
            board,
            join,
        }
    }
}

async fn scheduler_loop(
    interval: Duration,
    refresher: Arc<SuggestionRefresher>,
    board: SummaryBoard,
    mut shutdown_rx: watch::Receiver<bool>,
    mut trigger_rx: mpsc::Receiver<()>,
) {
    info!(interval_secs = interval.as_secs(), "suggestion refresh scheduler started");

    // First tick completes immediately: run once on startup.
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            // Shutdown has priority.
            biased;
            changed = shutdown_rx.changed() => {
                if changed.is_err() || *shutdown_rx.borrow() {
                    break;
                }
            }
            _ = ticker.tick() => {
                board.publish(refresher.run(Utc::now()).await);
            }
            Some(()) = trigger_rx.recv() => {
                board.publish(refresher.run(Utc::now()).await);
            }
        }
    }

    info!("suggestion refresh scheduler stopped");
}
