//! Payment discovery (recipient side).
//!
//! Matching is a pure function of `(announcements, keys)`: the same inputs
//! always give the same results, and each announcement is evaluated on its
//! own, so large batches are split across worker threads.

use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use paystream_core::error::PaystreamError;
use paystream_core::types::{Announcement, DerivedKeys, MetaAddress, ScanResult, TxHash};
use paystream_crypto::{
    addresses_match, derive_stealth_keys_from_hash, hash_shared_secret, shared_secret,
    verify_view_tag,
};

/// Batches smaller than this are matched on the calling thread.
const PARALLEL_THRESHOLD: usize = 256;

// ═══════════════════════════════════════════════════════════════════════════════
// SINGLE ANNOUNCEMENT
// ═══════════════════════════════════════════════════════════════════════════════

/// Result of matching a single announcement.
#[derive(Debug)]
pub enum MatchOutcome {
    /// View tag didn't match any key epoch
    NotForUs,
    /// View tag matched but the address did not (the 1/256 false positive)
    ViewTagCollision,
    /// Announcement uses a scheme other than secp256k1
    SkippedScheme(u64),
    /// Address confirmed; private key recovered
    Matched(ScanResult),
    /// Malformed announcement (bad point, empty metadata)
    Failed(PaystreamError),
}

impl MatchOutcome {
    /// Returns true if a payment was discovered.
    pub fn is_match(&self) -> bool {
        matches!(self, MatchOutcome::Matched(_))
    }

    /// Returns the scan result if present.
    pub fn into_result(self) -> Option<ScanResult> {
        match self {
            MatchOutcome::Matched(result) => Some(result),
            _ => None,
        }
    }
}

/// Matches one announcement against every key epoch (active first).
///
/// # Algorithm (per epoch)
///
/// 1. `S' = v·R`
/// 2. `h = Keccak256(compressed(S'))`; skip the epoch unless `h[0]` equals the view tag
/// 3. `p = k + h mod n`, `address(p·G)` must equal the announced address
pub fn match_announcement(announcement: &Announcement, epochs: &[DerivedKeys]) -> MatchOutcome {
    if !announcement.is_supported_scheme() {
        return MatchOutcome::SkippedScheme(announcement.scheme_id);
    }

    let view_tag = match announcement.view_tag() {
        Ok(tag) => tag,
        Err(e) => return MatchOutcome::Failed(e),
    };

    let ephemeral = match announcement.ephemeral_public_key() {
        Ok(point) => point,
        Err(e) => return MatchOutcome::Failed(e),
    };

    let mut collided = false;
    for (epoch, keys) in epochs.iter().enumerate() {
        let s = match shared_secret(keys.viewing_private_key(), &ephemeral) {
            Ok(s) => s,
            Err(e) => return MatchOutcome::Failed(e),
        };
        let hashed = hash_shared_secret(&s);

        if !verify_view_tag(&hashed, view_tag) {
            continue;
        }

        let stealth = match derive_stealth_keys_from_hash(keys.spending_private_key(), &hashed) {
            Ok(stealth) => stealth,
            Err(e) => return MatchOutcome::Failed(e),
        };

        if addresses_match(&stealth.address, &announcement.stealth_address) {
            return MatchOutcome::Matched(ScanResult::new(
                announcement.clone(),
                stealth.private_key,
                epoch,
            ));
        }
        collided = true;
    }

    if collided {
        MatchOutcome::ViewTagCollision
    } else {
        MatchOutcome::NotForUs
    }
}

/// Matches announcements against a single key set.
///
/// The report holds one result per announcement that belongs to `keys`, in
/// input order, plus a [`MatchFailure`] for every malformed announcement.
pub fn match_announcements(announcements: &[Announcement], keys: &DerivedKeys) -> MatchReport {
    StealthMatcher::new(keys.clone()).match_announcements(announcements)
}

// ═══════════════════════════════════════════════════════════════════════════════
// STATISTICS
// ═══════════════════════════════════════════════════════════════════════════════

/// Statistics for matching operations.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScanStats {
    /// Total announcements examined
    pub total_scanned: u64,
    /// Announcements whose view tag matched some epoch
    pub view_tag_matches: u64,
    /// Confirmed payments
    pub discoveries: u64,
    /// View tag matches ruled out by the address check
    pub false_positives: u64,
    /// Announcements with an unsupported scheme id
    pub skipped_schemes: u64,
    /// Malformed announcements
    pub errors: u64,
    /// Duration in milliseconds
    pub duration_ms: u64,
}

impl ScanStats {
    /// Creates a new stats tracker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a match outcome.
    pub fn record(&mut self, outcome: &MatchOutcome) {
        self.total_scanned += 1;
        match outcome {
            MatchOutcome::Matched(_) => {
                self.view_tag_matches += 1;
                self.discoveries += 1;
            }
            MatchOutcome::ViewTagCollision => {
                self.view_tag_matches += 1;
                self.false_positives += 1;
            }
            MatchOutcome::SkippedScheme(_) => self.skipped_schemes += 1,
            MatchOutcome::Failed(_) => self.errors += 1,
            MatchOutcome::NotForUs => {}
        }
    }

    /// Adds another tracker's counts into this one.
    pub fn merge(&mut self, other: &ScanStats) {
        self.total_scanned += other.total_scanned;
        self.view_tag_matches += other.view_tag_matches;
        self.discoveries += other.discoveries;
        self.false_positives += other.false_positives;
        self.skipped_schemes += other.skipped_schemes;
        self.errors += other.errors;
        self.duration_ms += other.duration_ms;
    }

    /// Returns the scan rate (announcements per second).
    pub fn rate(&self) -> f64 {
        if self.duration_ms == 0 {
            0.0
        } else {
            (self.total_scanned as f64 / self.duration_ms as f64) * 1000.0
        }
    }

    /// Returns the filter efficiency (percentage of announcements filtered by view tag).
    pub fn filter_efficiency(&self) -> f64 {
        if self.total_scanned == 0 {
            0.0
        } else {
            ((self.total_scanned - self.view_tag_matches) as f64 / self.total_scanned as f64)
                * 100.0
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// MATCHER
// ═══════════════════════════════════════════════════════════════════════════════

/// An announcement that could not be evaluated.
#[derive(Debug)]
pub struct MatchFailure {
    /// Block of the failing log
    pub block_number: u64,
    /// Transaction of the failing log
    pub transaction_hash: TxHash,
    /// Log index within the block
    pub log_index: u64,
    /// Why it failed
    pub error: PaystreamError,
}

/// Partial results plus the per-announcement failures of one batch.
#[derive(Debug, Default)]
pub struct MatchReport {
    /// Confirmed payments, in input order
    pub results: Vec<ScanResult>,
    /// Announcements that failed validation
    pub failures: Vec<MatchFailure>,
    /// Counters for the batch
    pub stats: ScanStats,
}

impl MatchReport {
    fn push(&mut self, announcement: &Announcement, outcome: MatchOutcome) {
        self.stats.record(&outcome);
        match outcome {
            MatchOutcome::Matched(result) => {
                debug!(
                    address = %result.stealth_address(),
                    block = announcement.block_number,
                    epoch = result.key_epoch,
                    "payment discovered"
                );
                self.results.push(result);
            }
            MatchOutcome::Failed(error) => {
                warn!(
                    block = announcement.block_number,
                    tx = %announcement.transaction_hash,
                    %error,
                    "skipping malformed announcement"
                );
                self.failures.push(MatchFailure {
                    block_number: announcement.block_number,
                    transaction_hash: announcement.transaction_hash,
                    log_index: announcement.log_index,
                    error,
                });
            }
            _ => {}
        }
    }
}

/// Matches announcements against the recipient's key epochs.
///
/// Epoch 0 is the active key set; later epochs are keys behind rotated-out
/// meta-addresses, kept so older payments stay recoverable.
#[derive(Clone)]
pub struct StealthMatcher {
    epochs: Vec<DerivedKeys>,
    workers: usize,
}

impl StealthMatcher {
    /// Creates a matcher for one key set.
    pub fn new(keys: DerivedKeys) -> Self {
        Self {
            epochs: vec![keys],
            workers: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1),
        }
    }

    /// Adds a retired key set (checked after the active one).
    pub fn with_retired_keys(mut self, keys: DerivedKeys) -> Self {
        self.epochs.push(keys);
        self
    }

    /// Sets the number of worker threads for large batches.
    pub fn workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    /// Makes `keys` the active epoch; the previous epochs are retained.
    pub fn rotate(&mut self, keys: DerivedKeys) {
        self.epochs.insert(0, keys);
    }

    /// Number of key epochs.
    pub fn epoch_count(&self) -> usize {
        self.epochs.len()
    }

    /// Meta-address of the active epoch.
    pub fn meta_address(&self) -> MetaAddress {
        self.epochs[0].meta_address()
    }

    /// Matches one announcement.
    pub fn match_one(&self, announcement: &Announcement) -> MatchOutcome {
        match_announcement(announcement, &self.epochs)
    }

    /// Matches a batch; one bad announcement never hides the others.
    pub fn match_announcements(&self, announcements: &[Announcement]) -> MatchReport {
        let start = Instant::now();
        let mut report = MatchReport::default();

        if announcements.len() < PARALLEL_THRESHOLD || self.workers == 1 {
            for announcement in announcements {
                report.push(announcement, self.match_one(announcement));
            }
        } else {
            let chunk_size = announcements.len().div_ceil(self.workers);
            let outcomes: Vec<Vec<MatchOutcome>> = std::thread::scope(|scope| {
                let handles: Vec<_> = announcements
                    .chunks(chunk_size)
                    .map(|chunk| {
                        scope.spawn(move || {
                            chunk.iter().map(|a| self.match_one(a)).collect::<Vec<_>>()
                        })
                    })
                    .collect();

                handles
                    .into_iter()
                    .map(|handle| match handle.join() {
                        Ok(outcomes) => outcomes,
                        Err(panic) => std::panic::resume_unwind(panic),
                    })
                    .collect()
            });

            for (announcement, outcome) in announcements.iter().zip(outcomes.into_iter().flatten()) {
                report.push(announcement, outcome);
            }
        }

        report.stats.duration_ms = start.elapsed().as_millis() as u64;

        info!(
            scanned = report.stats.total_scanned,
            discoveries = report.stats.discoveries,
            false_positives = report.stats.false_positives,
            errors = report.stats.errors,
            duration_ms = report.stats.duration_ms,
            "match complete"
        );

        report
    }
}
