//! Progress, resume position, and summary types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use paystream_stealth::ScanStats;

/// Progress callback type.
pub type ProgressCallback = Box<dyn Fn(ScanProgress) + Send + Sync>;

/// Scan progress, measured in blocks.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ScanProgress {
    /// Blocks in the requested range
    pub total_blocks: u64,
    /// Blocks whose logs have been fetched (or given up on)
    pub scanned_blocks: u64,
    /// Payments discovered so far
    pub discoveries: u64,
    /// Current scan rate (blocks per second)
    pub rate: f64,
    /// Estimated time remaining in seconds
    pub eta_seconds: Option<f64>,
    /// Percentage complete (0-100)
    pub percent: f64,
}

impl ScanProgress {
    /// Creates a new progress tracker.
    pub fn new(total_blocks: u64) -> Self {
        Self {
            total_blocks,
            scanned_blocks: 0,
            discoveries: 0,
            rate: 0.0,
            eta_seconds: None,
            percent: 0.0,
        }
    }

    /// Updates progress with new values.
    pub fn update(&mut self, scanned_blocks: u64, discoveries: u64, elapsed_ms: u64) {
        self.scanned_blocks = scanned_blocks;
        self.discoveries = discoveries;

        if elapsed_ms > 0 {
            self.rate = (scanned_blocks as f64 / elapsed_ms as f64) * 1000.0;
        }

        if self.total_blocks > 0 {
            self.percent = (scanned_blocks as f64 / self.total_blocks as f64) * 100.0;

            if self.rate > 0.0 {
                let remaining = self.total_blocks.saturating_sub(scanned_blocks);
                self.eta_seconds = Some(remaining as f64 / self.rate);
            }
        }
    }
}

/// Watermark for resumable scanning.
///
/// `next_block` is the first block not yet covered by a successful scan.
/// Pass it back as `from_block` to continue without rescanning.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ScanPosition {
    /// First block that still needs scanning
    pub next_block: u64,
    /// Announcements examined across all scans
    pub total_scanned: u64,
    /// Payments discovered across all scans
    pub total_discoveries: u64,
    /// When the watermark last moved
    pub updated_at: Option<DateTime<Utc>>,
}

impl ScanPosition {
    /// Creates a position starting at `start_block`.
    pub fn new(start_block: u64) -> Self {
        Self {
            next_block: start_block,
            total_scanned: 0,
            total_discoveries: 0,
            updated_at: None,
        }
    }

    /// Moves the watermark past `last_block` and adds the batch counts.
    ///
    /// The watermark never moves backwards.
    pub fn advance(&mut self, last_block: u64, scanned: u64, discoveries: u64) {
        let next = last_block.saturating_add(1);
        if next > self.next_block {
            self.next_block = next;
            self.updated_at = Some(Utc::now());
        }
        self.record(scanned, discoveries);
    }

    /// Adds batch counts without moving the watermark.
    pub fn record(&mut self, scanned: u64, discoveries: u64) {
        self.total_scanned += scanned;
        self.total_discoveries += discoveries;
    }
}

impl Default for ScanPosition {
    fn default() -> Self {
        Self::new(0)
    }
}

/// Scan result summary.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ScanSummary {
    /// Number of announcements scanned
    pub total_scanned: u64,
    /// Number of view tag matches
    pub view_tag_matches: u64,
    /// Number of payments discovered
    pub discoveries: u64,
    /// View tag matches ruled out by the address check
    pub false_positives: u64,
    /// Announcements with an unsupported scheme
    pub skipped_schemes: u64,
    /// Number of malformed announcements
    pub errors: u64,
    /// Duration in milliseconds
    pub duration_ms: u64,
    /// Scan rate (announcements per second)
    pub rate: f64,
    /// Filter efficiency (% filtered by view tag)
    pub filter_efficiency: f64,
}

impl From<&ScanStats> for ScanSummary {
    fn from(stats: &ScanStats) -> Self {
        Self {
            total_scanned: stats.total_scanned,
            view_tag_matches: stats.view_tag_matches,
            discoveries: stats.discoveries,
            false_positives: stats.false_positives,
            skipped_schemes: stats.skipped_schemes,
            errors: stats.errors,
            duration_ms: stats.duration_ms,
            rate: stats.rate(),
            filter_efficiency: stats.filter_efficiency(),
        }
    }
}
