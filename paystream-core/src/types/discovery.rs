//! Discovery types: block ranges and scan results.

use serde::{Deserialize, Serialize};

use super::{Amount, Announcement, EthAddress, SecretScalar};
use crate::error::{PaystreamError, Result};

// ═══════════════════════════════════════════════════════════════════════════════
// BLOCK RANGE
// ═══════════════════════════════════════════════════════════════════════════════

/// An inclusive range of blocks `from..=to`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BlockRange {
    /// First block (inclusive)
    pub from: u64,
    /// Last block (inclusive)
    pub to: u64,
}

impl BlockRange {
    /// Creates a range, rejecting `from > to`.
    pub fn new(from: u64, to: u64) -> Result<Self> {
        if from > to {
            return Err(PaystreamError::ValidationError(format!(
                "invalid block range: {} > {}",
                from, to
            )));
        }
        Ok(Self { from, to })
    }

    /// Number of blocks covered, saturating at `u64::MAX` for the full range.
    pub fn len(&self) -> u64 {
        (self.to - self.from).saturating_add(1)
    }

    /// Always false: a range covers at least one block.
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Returns true if `block` is inside the range.
    pub fn contains(&self, block: u64) -> bool {
        block >= self.from && block <= self.to
    }

    /// Splits into consecutive sub-ranges of at most `max_len` blocks.
    pub fn chunks(&self, max_len: u64) -> Vec<BlockRange> {
        let max_len = max_len.max(1);
        let mut out = Vec::with_capacity(self.len().div_ceil(max_len).min(1024) as usize);
        let mut start = self.from;
        loop {
            let end = start.saturating_add(max_len - 1).min(self.to);
            out.push(BlockRange {
                from: start,
                to: end,
            });
            if end == self.to {
                break;
            }
            start = end + 1;
        }
        out
    }

    /// Halves the range. Returns `None` for a single block.
    pub fn bisect(&self) -> Option<(BlockRange, BlockRange)> {
        if self.from == self.to {
            return None;
        }
        let mid = self.from + (self.to - self.from) / 2;
        Some((
            BlockRange {
                from: self.from,
                to: mid,
            },
            BlockRange {
                from: mid + 1,
                to: self.to,
            },
        ))
    }
}

impl std::fmt::Display for BlockRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}..={}", self.from, self.to)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// SCAN RESULT
// ═══════════════════════════════════════════════════════════════════════════════

/// A confirmed payment to the recipient.
///
/// Holds the recovered one-time private key. Never serialized or persisted;
/// `Debug` redacts the key.
#[derive(Clone, Debug)]
pub struct ScanResult {
    /// The announcement that matched
    pub announcement: Announcement,
    /// Private key controlling `announcement.stealth_address`
    pub recovered_private_key: SecretScalar,
    /// Index of the key epoch that matched (0 = active keys)
    pub key_epoch: usize,
    /// Balance at the stealth address (0 until filled by the scanner)
    pub balance: Amount,
}

impl ScanResult {
    /// Creates a result with an unknown (zero) balance.
    pub fn new(announcement: Announcement, recovered_private_key: SecretScalar, key_epoch: usize) -> Self {
        Self {
            announcement,
            recovered_private_key,
            key_epoch,
            balance: 0,
        }
    }

    /// The stealth address the key controls.
    pub fn stealth_address(&self) -> EthAddress {
        self.announcement.stealth_address
    }
}
