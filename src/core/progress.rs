//! Batch progress and remaining-time estimate.
//!
//! The estimate is a straight linear extrapolation
//! (`average time per file * files remaining`) with no smoothing. It is for the
//! operator's benefit only.

use std::fmt;
use std::time::{Duration, Instant};

/// Tracks per-file timing across a batch
#[derive(Debug, Clone)]
pub struct ProgressTracker {
    /// Files already in the ledger before this run
    pub already_processed: usize,

    /// Files this run intends to handle
    pub planned: usize,

    /// Files handled so far in this run
    pub handled: usize,

    /// Time spent on handled files
    pub busy: Duration,

    /// When the batch started
    pub started_at: Instant,
}

/// Snapshot reported after each file
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Progress {
    /// Overall files done (previous runs included)
    pub done: usize,

    /// Overall files known
    pub total: usize,

    /// Estimated time left for this run
    pub remaining: Duration,
}

impl ProgressTracker {
    pub fn new(already_processed: usize, planned: usize) -> Self {
        Self {
            already_processed,
            planned,
            handled: 0,
            busy: Duration::ZERO,
            started_at: Instant::now(),
        }
    }

    /// Record one handled file and its elapsed time
    pub fn record(&mut self, elapsed: Duration) -> Progress {
        self.handled += 1;
        self.busy += elapsed;
        self.snapshot()
    }

    pub fn snapshot(&self) -> Progress {
        Progress {
            done: self.already_processed + self.handled,
            total: self.already_processed + self.planned,
            remaining: self.estimate_remaining(),
        }
    }

    /// `average time per handled file * files left`
    pub fn estimate_remaining(&self) -> Duration {
        if self.handled == 0 {
            return Duration::ZERO;
        }
        let left = self.planned.saturating_sub(self.handled);
        let average = self.busy.as_secs_f64() / self.handled as f64;
        Duration::from_secs_f64(average * left as f64)
    }
}

impl fmt::Display for Progress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let secs = self.remaining.as_secs();
        write!(
            f,
            "Est. time remaining: {}m{}s. ({}/{})",
            secs / 60,
            secs % 60,
            self.done,
            self.total
        )
    }
}
