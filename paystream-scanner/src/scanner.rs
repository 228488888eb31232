//! Recipient-side scanning: fetch, match, and price discovered payments.

use std::sync::Arc;
use std::time::Instant;

use futures::StreamExt;
use parking_lot::RwLock;
use tracing::{debug, info, instrument, warn};

use paystream_core::error::{PaystreamError, Result};
use paystream_core::traits::LedgerReader;
use paystream_core::types::{
    Amount, Announcement, Asset, BlockRange, DerivedKeys, EthAddress, ScanResult,
};
use paystream_stealth::{MatchFailure, MatchReport, ScanStats, StealthMatcher};

use crate::config::ScannerConfig;
use crate::progress::{ProgressCallback, ScanPosition, ScanProgress, ScanSummary};
use crate::source::AnnouncementScanner;

/// A sub-range whose logs could not be fetched.
#[derive(Debug)]
pub struct RangeFailure {
    /// The sub-range
    pub range: BlockRange,
    /// Why it failed after retries and bisection
    pub error: PaystreamError,
}

/// A discovered payment whose balance could not be read.
#[derive(Debug)]
pub struct BalanceFailure {
    /// The stealth address
    pub stealth_address: EthAddress,
    /// Why the balance query failed
    pub error: PaystreamError,
}

/// Everything one scan found, including what went wrong.
///
/// A scan never fails as a whole because of one bad sub-range or one
/// malformed log: the matches found elsewhere are always returned.
#[derive(Debug)]
pub struct ScanReport {
    /// Requested range (`None` when the range was empty)
    pub range: Option<BlockRange>,
    /// Confirmed payments, in block order
    pub results: Vec<ScanResult>,
    /// Malformed announcements
    pub failures: Vec<MatchFailure>,
    /// Sub-ranges that could not be fetched
    pub failed_ranges: Vec<RangeFailure>,
    /// Results whose balance is unknown
    pub balance_failures: Vec<BalanceFailure>,
    /// Matching counters
    pub stats: ScanStats,
    /// Watermark after this scan
    pub position: ScanPosition,
}

impl ScanReport {
    fn empty(position: ScanPosition) -> Self {
        Self {
            range: None,
            results: Vec::new(),
            failures: Vec::new(),
            failed_ranges: Vec::new(),
            balance_failures: Vec::new(),
            stats: ScanStats::new(),
            position,
        }
    }

    /// Returns true if every sub-range was fetched.
    pub fn is_complete(&self) -> bool {
        self.failed_ranges.is_empty()
    }

    /// Sum of the filled balances.
    pub fn total_balance(&self) -> Amount {
        self.results.iter().map(|r| r.balance).sum()
    }

    /// Counters as a serializable summary.
    pub fn summary(&self) -> ScanSummary {
        ScanSummary::from(&self.stats)
    }
}

/// Scans the ledger for payments to one recipient.
pub struct Scanner {
    ledger: Arc<dyn LedgerReader>,
    source: AnnouncementScanner,
    matcher: RwLock<Arc<StealthMatcher>>,
    position: RwLock<ScanPosition>,
    stats: RwLock<ScanStats>,
}

impl Scanner {
    /// Creates a scanner for the recipient owning `keys`.
    pub fn new(ledger: Arc<dyn LedgerReader>, keys: DerivedKeys, config: ScannerConfig) -> Self {
        Self::with_matcher(ledger, StealthMatcher::new(keys), config)
    }

    /// Creates a scanner with a prepared matcher (e.g. holding retired key epochs).
    pub fn with_matcher(
        ledger: Arc<dyn LedgerReader>,
        matcher: StealthMatcher,
        config: ScannerConfig,
    ) -> Self {
        let position = ScanPosition::new(config.start_block);
        Self {
            source: AnnouncementScanner::new(ledger.clone(), config),
            ledger,
            matcher: RwLock::new(Arc::new(matcher)),
            position: RwLock::new(position),
            stats: RwLock::new(ScanStats::new()),
        }
    }

    /// The configuration in use.
    pub fn config(&self) -> &ScannerConfig {
        self.source.config()
    }

    /// Makes `keys` the active epoch, keeping the previous ones.
    pub fn rotate_keys(&self, keys: DerivedKeys) {
        let mut guard = self.matcher.write();
        let mut matcher = StealthMatcher::clone(&guard);
        matcher.rotate(keys);
        *guard = Arc::new(matcher);
    }

    /// Returns the current scan position.
    pub fn position(&self) -> ScanPosition {
        self.position.read().clone()
    }

    /// Sets the watermark, e.g. to a position saved by the caller.
    pub fn set_position(&self, position: ScanPosition) {
        *self.position.write() = position;
    }

    /// Returns the cumulative statistics.
    pub fn stats(&self) -> ScanStats {
        self.stats.read().clone()
    }

    /// Resets position (to the configured start block) and statistics.
    pub fn reset_position(&self) {
        *self.position.write() = ScanPosition::new(self.config().start_block);
        *self.stats.write() = ScanStats::new();
    }

    /// Scans `from_block..=to_block` (`None` = the current head).
    #[instrument(skip(self))]
    pub async fn scan_for_recipient(
        &self,
        from_block: u64,
        to_block: Option<u64>,
    ) -> Result<ScanReport> {
        self.run(from_block, to_block, None).await
    }

    /// Scans from the stored watermark to the current head.
    #[instrument(skip(self))]
    pub async fn resume(&self) -> Result<ScanReport> {
        let from_block = self.position.read().next_block;
        self.run(from_block, None, None).await
    }

    /// Scans with progress reporting after every sub-range.
    #[instrument(skip(self, progress_callback))]
    pub async fn scan_with_progress(
        &self,
        from_block: u64,
        to_block: Option<u64>,
        progress_callback: ProgressCallback,
    ) -> Result<ScanReport> {
        self.run(from_block, to_block, Some(&progress_callback)).await
    }

    async fn run(
        &self,
        from_block: u64,
        to_block: Option<u64>,
        progress_callback: Option<&ProgressCallback>,
    ) -> Result<ScanReport> {
        self.config().validate()?;

        let to_block = match to_block {
            Some(block) => block,
            None => self.ledger.block_number().await?,
        };

        let range = match BlockRange::new(from_block, to_block) {
            Ok(range) => range,
            Err(_) => {
                debug!(from_block, to_block, "empty scan range");
                return Ok(ScanReport::empty(self.position()));
            }
        };

        info!(%range, "starting scan");
        let start = Instant::now();
        let matcher = self.matcher.read().clone();

        let mut report = ScanReport::empty(self.position());
        report.range = Some(range);
        report.position.next_block = range.from;
        let mut progress = ScanProgress::new(range.len());
        let mut scanned_blocks = 0u64;
        let mut contiguous = true;

        let mut batches = self.source.scan(range.from, range.to);
        while let Some(batch) = batches.next().await {
            scanned_blocks += batch.range.len();

            match batch.result {
                Ok(announcements) => {
                    let count = announcements.len();
                    let matched = match_blocking(matcher.clone(), announcements).await?;
                    debug!(range = %batch.range, count, found = matched.results.len(), "matched batch");

                    let (scanned, found) = (matched.stats.total_scanned, matched.stats.discoveries);
                    if contiguous {
                        report.position.advance(batch.range.to, scanned, found);
                    } else {
                        report.position.record(scanned, found);
                    }
                    report.stats.merge(&matched.stats);
                    report.results.extend(matched.results);
                    report.failures.extend(matched.failures);
                }
                Err(error) => {
                    warn!(range = %batch.range, %error, "sub-range failed");
                    contiguous = false;
                    report.failed_ranges.push(RangeFailure {
                        range: batch.range,
                        error,
                    });
                }
            }

            if let Some(callback) = progress_callback {
                progress.update(
                    scanned_blocks,
                    report.results.len() as u64,
                    start.elapsed().as_millis() as u64,
                );
                callback(progress.clone());
            }
        }

        if let Some(asset) = self.config().balance_asset {
            self.fill_balances(&mut report, asset).await;
        }

        report.stats.duration_ms = start.elapsed().as_millis() as u64;

        self.stats.write().merge(&report.stats);
        *self.position.write() = report.position.clone();

        info!(
            discoveries = report.results.len(),
            scanned = report.stats.total_scanned,
            failed_ranges = report.failed_ranges.len(),
            malformed = report.failures.len(),
            next_block = report.position.next_block,
            duration_ms = report.stats.duration_ms,
            "scan complete"
        );

        Ok(report)
    }

    async fn fill_balances(&self, report: &mut ScanReport, asset: Asset) {
        for result in report.results.iter_mut() {
            let address = result.stealth_address();
            let balance = match asset {
                Asset::Native => self.ledger.native_balance(address).await,
                Asset::Token(token) => self.ledger.token_balance(token, address).await,
            };
            match balance {
                Ok(balance) => result.balance = balance,
                Err(error) => {
                    warn!(%address, %error, "balance query failed");
                    report.balance_failures.push(BalanceFailure {
                        stealth_address: address,
                        error,
                    });
                }
            }
        }
    }
}

/// Runs CPU-bound matching off the async worker threads.
async fn match_blocking(
    matcher: Arc<StealthMatcher>,
    announcements: Vec<Announcement>,
) -> Result<MatchReport> {
    tokio::task::spawn_blocking(move || matcher.match_announcements(&announcements))
        .await
        .map_err(|e| PaystreamError::InternalError(format!("matching task failed: {}", e)))
}
