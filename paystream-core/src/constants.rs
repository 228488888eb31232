//! Protocol constants for PayStream.
//!
//! Sizes follow SEC1 encodings of secp256k1 and the ERC-5564 scheme 1 layout.

// ═══════════════════════════════════════════════════════════════════════════════
// SECP256K1 SIZES
// ═══════════════════════════════════════════════════════════════════════════════

/// Size of a secp256k1 scalar (private key) in bytes.
pub const SCALAR_SIZE: usize = 32;

/// Size of an uncompressed SEC1 point including the `0x04` marker.
pub const UNCOMPRESSED_POINT_SIZE: usize = 65;

/// Size of a compressed SEC1 point (`0x02`/`0x03` marker + x).
pub const COMPRESSED_POINT_SIZE: usize = 33;

/// Size of the raw `x || y` coordinates of a point.
pub const POINT_COORDINATES_SIZE: usize = 64;

/// SEC1 marker byte for uncompressed points.
pub const UNCOMPRESSED_POINT_MARKER: u8 = 0x04;

// ═══════════════════════════════════════════════════════════════════════════════
// META-ADDRESS ENCODING
// ═══════════════════════════════════════════════════════════════════════════════

/// Size of an encoded stealth meta-address:
/// `0x04 || spending (64) || viewing (64)` = 129 bytes.
pub const META_ADDRESS_SIZE: usize = 1 + POINT_COORDINATES_SIZE + POINT_COORDINATES_SIZE;

// ═══════════════════════════════════════════════════════════════════════════════
// ERC-5564
// ═══════════════════════════════════════════════════════════════════════════════

/// ERC-5564 scheme identifier for secp256k1 with view tags.
pub const SCHEME_ID_SECP256K1: u64 = 1;

/// Size of view tag in bytes.
/// One byte filters out 255 of every 256 foreign announcements.
pub const VIEW_TAG_SIZE: usize = 1;

/// Number of possible view tag values (2^8 = 256).
pub const VIEW_TAG_SPACE: usize = 256;

/// Metadata selector marking a native-coin payment.
pub const NATIVE_TRANSFER_SELECTOR: [u8; 4] = [0xee, 0xee, 0xee, 0xee];

/// Metadata selector marking an ERC-20 `transfer(address,uint256)` payment.
pub const ERC20_TRANSFER_SELECTOR: [u8; 4] = [0xa9, 0x05, 0x9c, 0xbb];

/// Full size of metadata carrying a payment hint:
/// view tag (1) + selector (4) + token (20) + amount (32).
pub const PAYMENT_METADATA_SIZE: usize = VIEW_TAG_SIZE + 4 + ETH_ADDRESS_SIZE + 32;

// ═══════════════════════════════════════════════════════════════════════════════
// KEY DERIVATION
// ═══════════════════════════════════════════════════════════════════════════════

/// Size of an Ethereum `personal_sign` signature (`r || s || v`).
pub const SIGNATURE_SIZE: usize = 65;

/// Default domain for stealth key derivation.
/// Any other feature reusing wallet signatures must pick a different domain.
pub const DOMAIN_STEALTH_KEYS: &str = "stealth-keys";

/// Label mixed into the spending key entropy.
pub const LABEL_SPENDING: &str = "spending";

/// Label mixed into the viewing key entropy.
pub const LABEL_VIEWING: &str = "viewing";

/// Application name shown in the key-derivation signing prompt.
pub const KEY_DERIVATION_APP_NAME: &str = "NEXUS PayStream";

// ═══════════════════════════════════════════════════════════════════════════════
// ETHEREUM CONSTANTS
// ═══════════════════════════════════════════════════════════════════════════════

/// Size of Ethereum address in bytes (20 bytes = 160 bits).
pub const ETH_ADDRESS_SIZE: usize = 20;

/// Size of keccak256 hash output.
pub const KECCAK256_SIZE: usize = 32;

/// Size of a transaction hash.
pub const TX_HASH_SIZE: usize = 32;

/// Gas used by a plain native-coin transfer.
pub const NATIVE_TRANSFER_GAS: u64 = 21_000;

/// Gas limit used for ERC-20 `transfer` sweeps when estimation is unavailable.
pub const ERC20_TRANSFER_GAS: u64 = 65_000;

// ═══════════════════════════════════════════════════════════════════════════════
// NETWORK DEFAULTS (Polygon PoS)
// ═══════════════════════════════════════════════════════════════════════════════

/// Polygon PoS chain id.
pub const POLYGON_CHAIN_ID: u64 = 137;

/// Public Polygon RPC endpoint.
pub const DEFAULT_RPC_URL: &str = "https://polygon-rpc.com";

/// Default JSON-RPC request timeout in seconds.
pub const DEFAULT_RPC_TIMEOUT_SECS: u64 = 30;

/// Canonical ERC-5564 announcer (same CREATE2 address on every chain).
pub const ERC5564_ANNOUNCER_ADDRESS: &str = "0x55649E01B5Df198D18D95b5cc5051630cfD45564";

/// Raw bytes of [`ERC5564_ANNOUNCER_ADDRESS`].
pub const ERC5564_ANNOUNCER_BYTES: [u8; ETH_ADDRESS_SIZE] = [
    0x55, 0x64, 0x9e, 0x01, 0xb5, 0xdf, 0x19, 0x8d, 0x18, 0xd9, 0x5b, 0x5c, 0xc5, 0x05, 0x16, 0x30,
    0xcf, 0xd4, 0x55, 0x64,
];

/// Native USDC on Polygon PoS.
pub const USDC_POLYGON_ADDRESS: &str = "0x3c499c542cEF5E3811e1192ce70d8cC03d5c3359";

/// Raw bytes of [`USDC_POLYGON_ADDRESS`].
pub const USDC_POLYGON_BYTES: [u8; ETH_ADDRESS_SIZE] = [
    0x3c, 0x49, 0x9c, 0x54, 0x2c, 0xef, 0x5e, 0x38, 0x11, 0xe1, 0x19, 0x2c, 0xe7, 0x0d, 0x8c, 0xc0,
    0x3d, 0x5c, 0x33, 0x59,
];

// ═══════════════════════════════════════════════════════════════════════════════
// SCANNING
// ═══════════════════════════════════════════════════════════════════════════════

/// Default widest block range requested in a single log query.
/// Public endpoints commonly cap `eth_getLogs` well below 10k blocks.
pub const DEFAULT_MAX_BLOCK_RANGE: u64 = 3_000;

/// Default number of block sub-ranges queried concurrently.
pub const DEFAULT_SCAN_CONCURRENCY: usize = 4;

/// Default number of retries for a transport failure on one sub-range.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Default initial backoff between retries, in milliseconds.
pub const DEFAULT_RETRY_BACKOFF_MS: u64 = 250;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_meta_address_size() {
        // marker (1) + spending (64) + viewing (64)
        assert_eq!(META_ADDRESS_SIZE, 129);
    }

    #[test]
    fn test_point_sizes_consistent() {
        assert_eq!(UNCOMPRESSED_POINT_SIZE, 1 + POINT_COORDINATES_SIZE);
        assert_eq!(COMPRESSED_POINT_SIZE, 1 + SCALAR_SIZE);
    }

    #[test]
    fn test_payment_metadata_size() {
        assert_eq!(PAYMENT_METADATA_SIZE, 57);
    }

    #[test]
    fn test_default_address_bytes_match_strings() {
        use crate::types::EthAddress;

        assert_eq!(
            EthAddress::from_hex(ERC5564_ANNOUNCER_ADDRESS).unwrap(),
            EthAddress::from_array(ERC5564_ANNOUNCER_BYTES)
        );
        assert_eq!(
            EthAddress::from_hex(USDC_POLYGON_ADDRESS).unwrap(),
            EthAddress::from_array(USDC_POLYGON_BYTES)
        );
    }

    #[test]
    fn test_derivation_labels_unique() {
        assert_ne!(LABEL_SPENDING, LABEL_VIEWING);
    }
}
