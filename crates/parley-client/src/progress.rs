//! Progress and throughput computation.
//!
//! Samples are recomputed from the running byte count and the elapsed time
//! after every chunk; nothing is accumulated between samples.

use std::time::Duration;

const KIB: f64 = 1024.0;
const MIB: f64 = 1024.0 * 1024.0;

/// Snapshot of a transfer's progress.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProgressSample {
    /// Bytes moved so far
    pub bytes_moved: u64,
    /// Declared transfer size
    pub total: u64,
    /// Time since the transfer started
    pub elapsed: Duration,
}

impl ProgressSample {
    /// Completion percentage, clamped to 0..=100. An empty total counts as
    /// complete.
    pub fn percentage(&self) -> u8 {
        if self.total == 0 {
            return 100;
        }
        let pct = u128::from(self.bytes_moved) * 100 / u128::from(self.total);
        pct.min(100) as u8
    }

    /// Average rate since the start. Zero before any time has passed.
    pub fn bytes_per_second(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 { self.bytes_moved as f64 / secs } else { 0.0 }
    }

    /// Formatted average rate.
    pub fn throughput(&self) -> String {
        format_throughput(self.bytes_per_second())
    }
}

/// Format a rate with units picked by magnitude and two decimals.
pub fn format_throughput(bytes_per_second: f64) -> String {
    if bytes_per_second < KIB {
        format!("{bytes_per_second:.2} B/s")
    } else if bytes_per_second < MIB {
        format!("{:.2} KB/s", bytes_per_second / KIB)
    } else {
        format!("{:.2} MB/s", bytes_per_second / MIB)
    }
}
