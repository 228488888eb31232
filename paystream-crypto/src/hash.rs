//! Keccak-256 hashing.
//!
//! Keccak-256 is the Ethereum hash (NOT SHA3-256; the padding differs). It is
//! used for addresses, view tags, the stealth scalar, and key derivation.
//!
//! ## Multi-part input
//!
//! When several fields are hashed together each one is length-prefixed:
//!
//! ```text
//! output = Keccak256(len(a) || a || len(b) || b || ...)     len = u64 LE
//! ```
//!
//! so that moving bytes between adjacent fields always changes the digest.

use sha3::{Digest, Keccak256};

use paystream_core::constants::KECCAK256_SIZE;

/// Computes Keccak-256 of `input`.
pub fn keccak256(input: &[u8]) -> [u8; KECCAK256_SIZE] {
    Keccak256::digest(input).into()
}

/// Computes Keccak-256 over length-prefixed parts.
///
/// # Example
///
/// ```rust
/// use paystream_crypto::hash::keccak256_multi;
///
/// let a = keccak256_multi(&[b"ab", b"c"]);
/// let b = keccak256_multi(&[b"a", b"bc"]);
/// assert_ne!(a, b);
/// ```
pub fn keccak256_multi(inputs: &[&[u8]]) -> [u8; KECCAK256_SIZE] {
    let mut hasher = Keccak256::new();
    for input in inputs {
        hasher.update((input.len() as u64).to_le_bytes());
        hasher.update(input);
    }
    hasher.finalize().into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keccak256_known_vectors() {
        assert_eq!(
            hex::encode(keccak256(b"")),
            "c5d2460186f7233c927e7db2dcc703c0e500b653ca82273b7bfad8045d85a470"
        );
        assert_eq!(
            hex::encode(keccak256(b"hello")),
            "1c8aff950685c2ed4bc3174f3472287b56d9517b9c948127319a09a7a36deac8"
        );
    }

    #[test]
    fn test_keccak256_multi_unambiguous() {
        let multi = keccak256_multi(&[b"part1", b"part2"]);
        let single = keccak256(b"part1part2");
        assert_ne!(multi, single);

        assert_ne!(
            keccak256_multi(&[b"sig", b"spending", b"x"]),
            keccak256_multi(&[b"sig", b"spendingx", b""])
        );
    }

    #[test]
    fn test_keccak256_multi_deterministic() {
        assert_eq!(
            keccak256_multi(&[b"a", b"b"]),
            keccak256_multi(&[b"a", b"b"])
        );
    }
}
