//! Background feed collector.
//!
//! Runs one ingestion cycle per tick until told to stop.

use std::future::Future;

use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::{interval, Duration, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::db::Database;
use crate::rss::fetcher::FeedFetcher;
use crate::rss::ingest::{scrape_next_feed, IngestOptions, IngestReport};
use crate::{GatorError, Result};

/// Periodic feed collector.
///
/// The first cycle runs immediately; later cycles follow at a fixed
/// period. A cycle that overruns the period causes missed ticks to be
/// skipped rather than replayed.
pub struct RssUpdater {
    db: Database,
    fetcher: FeedFetcher,
    interval: Duration,
    options: IngestOptions,
}

impl RssUpdater {
    /// Create an updater collecting every `interval`.
    pub fn new(db: Database, fetcher: FeedFetcher, interval: Duration) -> Self {
        Self {
            db,
            fetcher,
            interval,
            options: IngestOptions::default(),
        }
    }

    /// Set the ingestion options used by each cycle.
    pub fn with_options(mut self, options: IngestOptions) -> Self {
        self.options = options;
        self
    }

    /// Time between cycles.
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Run a single ingestion cycle.
    pub async fn run_cycle(&self) -> Result<Option<IngestReport>> {
        scrape_next_feed(&self.db, &self.fetcher, &self.options).await
    }

    /// Run cycles until `shutdown` completes.
    ///
    /// A cycle in progress when `shutdown` fires is abandoned. Failed cycles
    /// are logged and do not stop the loop. Returns the number of cycles
    /// that ran to completion.
    pub async fn run_until<F>(&self, shutdown: F) -> u64
    where
        F: Future<Output = ()>,
    {
        info!("Feed collector started (interval: {:?})", self.interval);

        tokio::pin!(shutdown);
        let mut ticker = interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut completed = 0u64;

        loop {
            tokio::select! {
                biased;
                _ = &mut shutdown => break,
                _ = ticker.tick() => {}
            }

            tokio::select! {
                biased;
                _ = &mut shutdown => break,
                result = self.run_cycle() => {
                    match result {
                        Ok(Some(report)) => debug!(
                            feed = %report.feed.url,
                            inserted = report.inserted,
                            "Cycle finished"
                        ),
                        Ok(None) => debug!("Cycle finished: nothing to fetch"),
                        Err(e) => warn!("Cycle failed: {}", e),
                    }
                    completed += 1;
                }
            }
        }

        info!("Feed collector stopped after {} cycle(s)", completed);
        completed
    }

    /// Run the updater on a background task.
    pub fn spawn(self) -> UpdaterHandle {
        let (cancel_tx, cancel_rx) = oneshot::channel::<()>();
        let join = tokio::spawn(async move {
            self.run_until(async {
                // A dropped sender also stops the loop
                let _ = cancel_rx.await;
            })
            .await
        });

        UpdaterHandle { cancel_tx, join }
    }
}

/// Handle to a spawned [`RssUpdater`].
pub struct UpdaterHandle {
    cancel_tx: oneshot::Sender<()>,
    join: JoinHandle<u64>,
}

impl UpdaterHandle {
    /// Stop the updater and wait for it to finish.
    ///
    /// Returns the number of completed cycles.
    pub async fn stop(self) -> Result<u64> {
        let _ = self.cancel_tx.send(());
        self.join
            .await
            .map_err(|e| GatorError::Task(format!("feed collector task failed: {}", e)))
    }
}
