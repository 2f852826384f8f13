//! Scan outcome reporting.

use std::time::{Duration, Instant};

/// What one scan did.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScanSummary {
    /// Number of items persisted.
    pub items: u64,
    /// Sum of the measured sizes in bytes.
    pub total_size: u64,
    /// Items that could not be reached or measured.
    pub errors: u64,
    /// Time spent in the scan.
    pub elapsed: Duration,
    /// The scan stopped early because of a stop request.
    pub cancelled: bool,
    /// The scan had nothing to work with (no root mount, no scanner mounts).
    pub skipped: bool,
}

impl ScanSummary {
    /// A scan that did not run.
    pub fn skipped() -> Self {
        Self {
            skipped: true,
            ..Self::default()
        }
    }

    /// Calculate scan rate in bytes per second.
    pub fn bytes_per_second(&self) -> f64 {
        if self.elapsed.as_secs_f64() > 0.0 {
            self.total_size as f64 / self.elapsed.as_secs_f64()
        } else {
            0.0
        }
    }
}

/// Internal summary tracker with timing.
#[derive(Debug)]
pub(crate) struct SummaryTracker {
    start_time: Instant,
    items: u64,
    total_size: u64,
    errors: u64,
}

impl SummaryTracker {
    pub fn start() -> Self {
        Self {
            start_time: Instant::now(),
            items: 0,
            total_size: 0,
            errors: 0,
        }
    }

    pub fn record(&mut self, size: u64) {
        self.items += 1;
        self.total_size += size;
    }

    /// An item persisted without a size.
    pub fn record_item(&mut self) {
        self.items += 1;
    }

    pub fn record_items(&mut self, count: usize) {
        self.items += count as u64;
    }

    pub fn record_error(&mut self) {
        self.errors += 1;
    }

    pub fn finish(self, cancelled: bool) -> ScanSummary {
        ScanSummary {
            items: self.items,
            total_size: self.total_size,
            errors: self.errors,
            elapsed: self.start_time.elapsed(),
            cancelled,
            skipped: false,
        }
    }
}
