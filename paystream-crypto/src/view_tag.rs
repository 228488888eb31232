//! View tag computation for efficient scanning.
//!
//! The shared secret `S` is hashed once:
//!
//! ```text
//! h = Keccak256(compressed(S))      view_tag = h[0]
//! ```
//!
//! Recipients compare the announced tag against their own before doing the
//! full key recovery, which skips ~255/256 of foreign announcements. One in
//! 256 foreign announcements still passes the tag check and is only ruled
//! out by the address comparison.
//!
//! ## Security
//!
//! The tag reveals 8 bits of `h`, leaving 248 bits; it cannot identify the
//! recipient on its own.

use subtle::ConstantTimeEq;
use zeroize::Zeroizing;

use paystream_core::constants::{KECCAK256_SIZE, VIEW_TAG_SPACE};
use paystream_core::types::CurvePoint;

use crate::hash::keccak256;

/// Hashes the ECDH shared secret: `Keccak256(compressed(S))`.
pub fn hash_shared_secret(shared_secret: &CurvePoint) -> Zeroizing<[u8; KECCAK256_SIZE]> {
    let compressed = Zeroizing::new(shared_secret.to_compressed());
    Zeroizing::new(keccak256(&compressed[..]))
}

/// Computes the view tag from a shared secret.
pub fn compute_view_tag(shared_secret: &CurvePoint) -> u8 {
    hash_shared_secret(shared_secret)[0]
}

/// Checks a view tag in constant time.
pub fn verify_view_tag(hashed_secret: &[u8; KECCAK256_SIZE], expected_tag: u8) -> bool {
    hashed_secret[0].ct_eq(&expected_tag).into()
}

/// View tag distribution tracker.
#[derive(Debug, Clone)]
pub struct ViewTagStats {
    /// Count of each view tag value
    pub distribution: Vec<u64>,
    /// Total number of tags analyzed
    pub total: u64,
}

impl Default for ViewTagStats {
    fn default() -> Self {
        Self {
            distribution: vec![0; VIEW_TAG_SPACE],
            total: 0,
        }
    }
}

impl ViewTagStats {
    /// Creates a new stats tracker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a view tag.
    pub fn add(&mut self, tag: u8) {
        self.distribution[tag as usize] += 1;
        self.total += 1;
    }

    /// Returns the most common view tag.
    pub fn most_common(&self) -> Option<(u8, u64)> {
        self.distribution
            .iter()
            .enumerate()
            .max_by_key(|(_, &count)| count)
            .map(|(tag, &count)| (tag as u8, count))
    }

    /// Chi-squared statistic against a uniform distribution.
    pub fn chi_squared(&self) -> f64 {
        let expected = self.total as f64 / VIEW_TAG_SPACE as f64;
        if expected == 0.0 {
            return 0.0;
        }

        self.distribution
            .iter()
            .map(|&observed| {
                let diff = observed as f64 - expected;
                (diff * diff) / expected
            })
            .sum()
    }
}
