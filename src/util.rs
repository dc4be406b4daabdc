use std::time::{Duration, Instant};

use crate::config::DetectionOptions;

/// Wall-clock budget and pass accounting for one engine invocation.
#[derive(Debug)]
pub(crate) struct Budget {
    started: Instant, // When the invocation started.
    limit: Option<Duration>, // Allowed wall-clock time, unlimited when absent.
    passes: usize, // Local-move passes run so far, all levels together.
    cut_short: bool, // Set once any cap stopped a phase early.
}

impl Budget {
    pub(crate) fn new(options: &DetectionOptions) -> Self {
        Self {
            started: Instant::now(),
            limit: options.time_budget(),
            passes: 0,
            cut_short: false,
        }
    }

    pub(crate) fn record_pass(&mut self) {
        self.passes += 1;
    }

    pub(crate) fn passes(&self) -> usize {
        self.passes
    }

    /// Check the clock; once over the limit the run is marked as cut short.
    pub(crate) fn time_exhausted(&mut self) -> bool {
        let over = self.limit.map_or(false, |limit| self.started.elapsed() >= limit);
        if over {
            self.cut_short = true;
        }
        over
    }

    pub(crate) fn mark_cut_short(&mut self) {
        self.cut_short = true;
    }

    pub(crate) fn converged(&self) -> bool {
        !self.cut_short
    }

    pub(crate) fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }
}
