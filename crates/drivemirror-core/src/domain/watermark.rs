//! Watermark threaded from one sync cycle to the next
//!
//! The watermark bounds change detection to items modified after the start
//! of the last successful cycle. It is owned by the sync loop and never
//! changed while a cycle runs.

use chrono::{DateTime, Duration, Utc};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Watermark {
    /// No time filter; every file goes through the checksum decision.
    #[default]
    Unbounded,
    /// Only files modified after this instant are considered changed.
    Since(DateTime<Utc>),
}

impl Watermark {
    /// Watermark for the very first cycle.
    ///
    /// A zero window means no filter. Otherwise only items modified within
    /// the last `window_secs` seconds before `now` are considered.
    pub fn initial(window_secs: u64, now: DateTime<Utc>) -> Self {
        if window_secs == 0 {
            return Watermark::Unbounded;
        }
        let window = i64::try_from(window_secs)
            .ok()
            .and_then(Duration::try_seconds)
            .unwrap_or(Duration::MAX);
        match now.checked_sub_signed(window) {
            Some(since) => Watermark::Since(since),
            None => Watermark::Unbounded,
        }
    }

    /// Watermark for the cycle after one that started at `cycle_start`
    /// and completed.
    ///
    /// An unbounded watermark stays unbounded.
    #[must_use]
    pub fn advance(self, cycle_start: DateTime<Utc>) -> Self {
        match self {
            Watermark::Unbounded => Watermark::Unbounded,
            Watermark::Since(_) => Watermark::Since(cycle_start),
        }
    }

    /// True if an item modified at `modified` passes the filter.
    ///
    /// Items with no known modification time always pass.
    pub fn admits(&self, modified: Option<DateTime<Utc>>) -> bool {
        match (self, modified) {
            (Watermark::Unbounded, _) | (_, None) => true,
            (Watermark::Since(since), Some(modified)) => modified > *since,
        }
    }
}

impl std::fmt::Display for Watermark {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Watermark::Unbounded => write!(f, "unbounded"),
            Watermark::Since(since) => write!(f, "{}", since.to_rfc3339()),
        }
    }
}
