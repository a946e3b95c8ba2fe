//! Sync loop - runs sync cycles back to back with a fixed pause
//!
//! The [`SyncLoop`] owns the only state that survives between cycles: the
//! [`Watermark`] and the [`ChecksumCache`]. Cycles never overlap, so neither
//! needs locking.
//!
//! ## Cadence
//!
//! ```text
//! cycle ──→ sleep(interval) ──→ cycle ──→ sleep(interval) ──→ ...
//! ```
//!
//! The interval runs from the end of one cycle to the start of the next.
//! Cancellation is observed before a cycle starts and during the pause, never
//! inside a cycle.

use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use drivemirror_core::domain::{ChecksumCache, Watermark};

use crate::engine::{CycleReport, SyncEngine};
use crate::SyncError;

/// Counters returned when the loop stops
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoopStats {
    pub cycles_ok: u64,
    pub cycles_failed: u64,
}

/// Drives a [`SyncEngine`] until cancelled
pub struct SyncLoop {
    engine: SyncEngine,
    folder_name: String,
    interval: Duration,
    watermark: Watermark,
    cache: ChecksumCache,
}

impl SyncLoop {
    /// Creates a new `SyncLoop`
    ///
    /// # Arguments
    /// * `engine` - Engine that performs each cycle
    /// * `folder_name` - Remote folder to mirror
    /// * `interval` - Pause between the end of one cycle and the next
    /// * `initial` - Watermark for the first cycle
    pub fn new(
        engine: SyncEngine,
        folder_name: impl Into<String>,
        interval: Duration,
        initial: Watermark,
    ) -> Self {
        let folder_name = folder_name.into();
        info!(
            folder = %folder_name,
            interval_secs = interval.as_secs(),
            watermark = %initial,
            "Creating sync loop"
        );
        Self {
            engine,
            folder_name,
            interval,
            watermark: initial,
            cache: ChecksumCache::new(),
        }
    }

    pub fn watermark(&self) -> Watermark {
        self.watermark
    }

    pub fn cache(&self) -> &ChecksumCache {
        &self.cache
    }

    /// Runs a single cycle and advances the watermark if it succeeded.
    ///
    /// A failed cycle leaves the watermark unchanged so the next attempt
    /// covers the same window.
    pub async fn run_once(&mut self) -> Result<CycleReport, SyncError> {
        let result = self
            .engine
            .perform_cycle(&self.folder_name, self.watermark, &mut self.cache)
            .await;

        match &result {
            Ok(report) => {
                self.watermark = self.watermark.advance(report.started_at);
                if !report.is_clean() {
                    warn!(
                        errors = report.errors.len(),
                        "Sync cycle finished with item failures; they will be retried next cycle"
                    );
                }
            }
            Err(err) => {
                error!(error = %err, watermark = %self.watermark, "Sync cycle failed");
            }
        }

        result
    }

    /// Runs cycles until `shutdown` is cancelled
    ///
    /// An in-flight cycle always runs to completion; cancellation takes
    /// effect before the next one starts.
    pub async fn run(mut self, shutdown: CancellationToken) -> LoopStats {
        let mut stats = LoopStats::default();
        info!(folder = %self.folder_name, "Starting sync loop");

        loop {
            if shutdown.is_cancelled() {
                break;
            }

            match self.run_once().await {
                Ok(_) => stats.cycles_ok += 1,
                Err(_) => stats.cycles_failed += 1,
            }

            tokio::select! {
                _ = tokio::time::sleep(self.interval) => {}
                _ = shutdown.cancelled() => break,
            }
        }

        info!(
            cycles_ok = stats.cycles_ok,
            cycles_failed = stats.cycles_failed,
            "Sync loop stopped"
        );
        stats
    }
}
