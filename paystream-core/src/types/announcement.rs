//! Announcement types for ERC-5564.
//!
//! Every stealth payment is accompanied by an `Announcement` event emitted by
//! the announcer contract. It carries the payer's ephemeral public key and
//! metadata whose first byte is the view tag.

use serde::{Deserialize, Serialize};

use super::{Asset, CurvePoint, EthAddress, TxHash};
use crate::constants::{
    COMPRESSED_POINT_SIZE, ERC20_TRANSFER_SELECTOR, ETH_ADDRESS_SIZE, NATIVE_TRANSFER_SELECTOR,
    PAYMENT_METADATA_SIZE, SCHEME_ID_SECP256K1, UNCOMPRESSED_POINT_SIZE, VIEW_TAG_SIZE,
    VIEW_TAG_SPACE,
};
use crate::error::{PaystreamError, Result};

/// An announcement read from the ledger.
///
/// Event signature:
/// ```text
/// Announcement(uint256 indexed schemeId, address indexed stealthAddress,
///              address indexed caller, bytes ephemeralPubKey, bytes metadata)
/// ```
/// plus the ledger-provided position of the log.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Announcement {
    /// ERC-5564 scheme identifier (1 = secp256k1 with view tags)
    pub scheme_id: u64,
    /// The one-time address funds were sent to
    pub stealth_address: EthAddress,
    /// Account that called the announcer
    pub caller: EthAddress,
    /// Payer's ephemeral public key `R` (SEC1, compressed or uncompressed)
    #[serde(with = "hex")]
    pub ephemeral_pub_key: Vec<u8>,
    /// `view_tag || [payment hint]`
    #[serde(with = "hex")]
    pub metadata: Vec<u8>,
    /// Block the log was included in
    pub block_number: u64,
    /// Transaction that emitted the log
    pub transaction_hash: TxHash,
    /// Position of the log within its block
    #[serde(default)]
    pub log_index: u64,
}

impl Announcement {
    /// Returns true if this announcement uses the secp256k1 scheme.
    pub fn is_supported_scheme(&self) -> bool {
        self.scheme_id == SCHEME_ID_SECP256K1
    }

    /// Returns the view tag carried in `metadata[0]`.
    pub fn view_tag(&self) -> Result<u8> {
        self.metadata.first().copied().ok_or_else(|| {
            PaystreamError::InvalidAnnouncement("metadata is empty, no view tag".into())
        })
    }

    /// Parses the ephemeral public key.
    pub fn ephemeral_public_key(&self) -> Result<CurvePoint> {
        match self.ephemeral_pub_key.len() {
            COMPRESSED_POINT_SIZE | UNCOMPRESSED_POINT_SIZE => {
                CurvePoint::from_sec1_bytes(&self.ephemeral_pub_key)
            }
            n => Err(PaystreamError::InvalidKeyMaterial(format!(
                "ephemeral public key must be {} or {} bytes, got {}",
                COMPRESSED_POINT_SIZE, UNCOMPRESSED_POINT_SIZE, n
            ))),
        }
    }

    /// Decodes the optional payment hint that follows the view tag.
    ///
    /// Returns `Ok(None)` when the metadata carries only a view tag or an
    /// unrecognised layout.
    pub fn payment_hint(&self) -> Result<Option<PaymentMetadata>> {
        if self.metadata.is_empty() {
            return Err(PaystreamError::InvalidAnnouncement(
                "metadata is empty, no view tag".into(),
            ));
        }
        PaymentMetadata::decode(&self.metadata)
    }

    /// Checks the structural fields that do not require curve arithmetic.
    pub fn validate(&self) -> Result<()> {
        self.view_tag()?;

        if self.ephemeral_pub_key.is_empty() {
            return Err(PaystreamError::InvalidAnnouncement(
                "ephemeral public key is empty".into(),
            ));
        }

        if self.stealth_address.is_zero() {
            return Err(PaystreamError::InvalidAnnouncement(
                "stealth address is the zero address".into(),
            ));
        }

        Ok(())
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// METADATA
// ═══════════════════════════════════════════════════════════════════════════════

/// The payment hint appended to announcement metadata.
///
/// # Layout
/// ```text
/// view_tag (1) || selector (4) || token (20) || amount (32, big-endian)
/// ```
/// The native-coin selector is `0xeeeeeeee` with token `0xeeee..ee`; ERC-20
/// transfers use the `transfer(address,uint256)` selector.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentMetadata {
    /// View tag (first byte)
    pub view_tag: u8,
    /// Asset that was paid
    pub asset: Asset,
    /// Amount in the asset's base unit
    pub amount: u128,
}

impl PaymentMetadata {
    /// Creates metadata carrying a payment hint.
    pub fn new(view_tag: u8, asset: Asset, amount: u128) -> Self {
        Self {
            view_tag,
            asset,
            amount,
        }
    }

    /// Encodes to the 57-byte layout.
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(PAYMENT_METADATA_SIZE);
        out.push(self.view_tag);
        match self.asset {
            Asset::Native => {
                out.extend_from_slice(&NATIVE_TRANSFER_SELECTOR);
                out.extend_from_slice(&[0xee; ETH_ADDRESS_SIZE]);
            }
            Asset::Token(token) => {
                out.extend_from_slice(&ERC20_TRANSFER_SELECTOR);
                out.extend_from_slice(token.as_bytes());
            }
        }
        out.extend_from_slice(&[0u8; 16]);
        out.extend_from_slice(&self.amount.to_be_bytes());
        out
    }

    /// Decodes a payment hint from full metadata bytes.
    pub fn decode(metadata: &[u8]) -> Result<Option<Self>> {
        let Some(&view_tag) = metadata.first() else {
            return Err(PaystreamError::InvalidAnnouncement(
                "metadata is empty, no view tag".into(),
            ));
        };

        if metadata.len() < PAYMENT_METADATA_SIZE {
            return Ok(None);
        }

        let selector_end = VIEW_TAG_SIZE + 4;
        let token_end = selector_end + ETH_ADDRESS_SIZE;
        let selector = &metadata[VIEW_TAG_SIZE..selector_end];
        let token = &metadata[selector_end..token_end];
        let amount_bytes = &metadata[token_end..PAYMENT_METADATA_SIZE];

        let asset = if selector == NATIVE_TRANSFER_SELECTOR {
            Asset::Native
        } else if selector == ERC20_TRANSFER_SELECTOR {
            Asset::Token(EthAddress::from_bytes(token)?)
        } else {
            return Ok(None);
        };

        if amount_bytes[..16].iter().any(|&b| b != 0) {
            return Err(PaystreamError::InvalidAnnouncement(
                "payment amount exceeds 128 bits".into(),
            ));
        }
        let mut low = [0u8; 16];
        low.copy_from_slice(&amount_bytes[16..]);

        Ok(Some(Self {
            view_tag,
            asset,
            amount: u128::from_be_bytes(low),
        }))
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// BUILDER
// ═══════════════════════════════════════════════════════════════════════════════

/// Builder for announcements, mostly used by ledgers and tests.
#[derive(Default)]
pub struct AnnouncementBuilder {
    scheme_id: Option<u64>,
    stealth_address: Option<EthAddress>,
    caller: Option<EthAddress>,
    ephemeral_pub_key: Option<Vec<u8>>,
    metadata: Option<Vec<u8>>,
    block_number: u64,
    transaction_hash: TxHash,
    log_index: u64,
}

impl AnnouncementBuilder {
    /// Creates a new announcement builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the scheme id (defaults to 1).
    pub fn scheme_id(mut self, scheme_id: u64) -> Self {
        self.scheme_id = Some(scheme_id);
        self
    }

    /// Sets the stealth address (required).
    pub fn stealth_address(mut self, address: EthAddress) -> Self {
        self.stealth_address = Some(address);
        self
    }

    /// Sets the caller (defaults to the zero address).
    pub fn caller(mut self, caller: EthAddress) -> Self {
        self.caller = Some(caller);
        self
    }

    /// Sets the ephemeral public key bytes (required).
    pub fn ephemeral_pub_key(mut self, key: Vec<u8>) -> Self {
        self.ephemeral_pub_key = Some(key);
        self
    }

    /// Sets the raw metadata (required unless `view_tag` is used).
    pub fn metadata(mut self, metadata: Vec<u8>) -> Self {
        self.metadata = Some(metadata);
        self
    }

    /// Sets metadata to just the view tag.
    pub fn view_tag(mut self, tag: u8) -> Self {
        self.metadata = Some(vec![tag]);
        self
    }

    /// Sets the block number.
    pub fn block_number(mut self, num: u64) -> Self {
        self.block_number = num;
        self
    }

    /// Sets the transaction hash.
    pub fn transaction_hash(mut self, hash: TxHash) -> Self {
        self.transaction_hash = hash;
        self
    }

    /// Sets the log index.
    pub fn log_index(mut self, index: u64) -> Self {
        self.log_index = index;
        self
    }

    /// Builds and validates the announcement.
    pub fn build(self) -> Result<Announcement> {
        let stealth_address = self
            .stealth_address
            .ok_or_else(|| PaystreamError::ValidationError("stealth_address is required".into()))?;

        let ephemeral_pub_key = self.ephemeral_pub_key.ok_or_else(|| {
            PaystreamError::ValidationError("ephemeral_pub_key is required".into())
        })?;

        let metadata = self
            .metadata
            .ok_or_else(|| PaystreamError::ValidationError("metadata is required".into()))?;

        let announcement = Announcement {
            scheme_id: self.scheme_id.unwrap_or(SCHEME_ID_SECP256K1),
            stealth_address,
            caller: self.caller.unwrap_or_else(EthAddress::zero),
            ephemeral_pub_key,
            metadata,
            block_number: self.block_number,
            transaction_hash: self.transaction_hash,
            log_index: self.log_index,
        };

        announcement.validate()?;
        Ok(announcement)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// STATISTICS
// ═══════════════════════════════════════════════════════════════════════════════

/// Aggregate statistics over a set of announcements.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AnnouncementStats {
    /// Total number of announcements
    pub total_count: u64,
    /// Announcements per view tag (for distribution analysis)
    pub view_tag_distribution: Vec<u64>,
    /// Lowest block seen
    pub earliest_block: Option<u64>,
    /// Highest block seen
    pub latest_block: Option<u64>,
    /// Announcements using a scheme other than secp256k1
    pub unsupported_scheme_count: u64,
    /// Announcements whose metadata carries a payment hint
    pub payment_hint_count: u64,
}

impl Default for AnnouncementStats {
    fn default() -> Self {
        Self {
            total_count: 0,
            view_tag_distribution: vec![0; VIEW_TAG_SPACE],
            earliest_block: None,
            latest_block: None,
            unsupported_scheme_count: 0,
            payment_hint_count: 0,
        }
    }
}

impl AnnouncementStats {
    /// Creates empty stats.
    pub fn new() -> Self {
        Self::default()
    }

    /// Updates stats with a new announcement.
    pub fn add(&mut self, announcement: &Announcement) {
        self.total_count += 1;

        if let Ok(tag) = announcement.view_tag() {
            self.view_tag_distribution[tag as usize] += 1;
        }

        let block = announcement.block_number;
        self.earliest_block = Some(self.earliest_block.map_or(block, |b| b.min(block)));
        self.latest_block = Some(self.latest_block.map_or(block, |b| b.max(block)));

        if !announcement.is_supported_scheme() {
            self.unsupported_scheme_count += 1;
        }

        if matches!(announcement.payment_hint(), Ok(Some(_))) {
            self.payment_hint_count += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const GENERATOR_COMPRESSED: &str =
        "0279be667ef9dcbbac55a06295ce870b07029bfcdb2dce28d959f2815b16f81798";

    fn make_announcement(tag: u8) -> Announcement {
        AnnouncementBuilder::new()
            .stealth_address(EthAddress::from_array([0x11; 20]))
            .ephemeral_pub_key(hex::decode(GENERATOR_COMPRESSED).unwrap())
            .view_tag(tag)
            .block_number(42)
            .build()
            .unwrap()
    }

    #[test]
    fn test_builder_defaults() {
        let ann = make_announcement(0x42);
        assert_eq!(ann.scheme_id, SCHEME_ID_SECP256K1);
        assert!(ann.caller.is_zero());
        assert_eq!(ann.view_tag().unwrap(), 0x42);
        assert!(ann.is_supported_scheme());
        assert!(ann.ephemeral_public_key().is_ok());
    }

    #[test]
    fn test_builder_missing_required() {
        let result = AnnouncementBuilder::new().view_tag(0x42).build();
        assert!(matches!(result, Err(PaystreamError::ValidationError(_))));

        let result = AnnouncementBuilder::new()
            .stealth_address(EthAddress::from_array([0x11; 20]))
            .ephemeral_pub_key(vec![0x02; 33])
            .build();
        assert!(matches!(result, Err(PaystreamError::ValidationError(_))));
    }

    #[test]
    fn test_empty_metadata_rejected() {
        let result = AnnouncementBuilder::new()
            .stealth_address(EthAddress::from_array([0x11; 20]))
            .ephemeral_pub_key(vec![0x02; 33])
            .metadata(vec![])
            .build();
        assert!(matches!(result, Err(PaystreamError::InvalidAnnouncement(_))));
    }

    #[test]
    fn test_bad_ephemeral_length() {
        let mut ann = make_announcement(1);
        ann.ephemeral_pub_key = vec![0x02; 20];
        assert!(matches!(
            ann.ephemeral_public_key(),
            Err(PaystreamError::InvalidKeyMaterial(_))
        ));
    }

    #[test]
    fn test_payment_metadata_native() {
        let meta = PaymentMetadata::new(0x7f, Asset::Native, 1_000_000_000_000_000_000);
        let bytes = meta.encode();
        assert_eq!(bytes.len(), PAYMENT_METADATA_SIZE);
        assert_eq!(bytes[0], 0x7f);
        assert_eq!(&bytes[1..5], &NATIVE_TRANSFER_SELECTOR);
        assert_eq!(PaymentMetadata::decode(&bytes).unwrap(), Some(meta));
    }

    #[test]
    fn test_payment_metadata_token() {
        let token = EthAddress::from_array([0x3c; 20]);
        let meta = PaymentMetadata::new(0x01, Asset::Token(token), 25_000_000);
        let bytes = meta.encode();
        assert_eq!(&bytes[1..5], &ERC20_TRANSFER_SELECTOR);
        assert_eq!(&bytes[5..25], token.as_bytes());
        assert_eq!(PaymentMetadata::decode(&bytes).unwrap(), Some(meta));
    }

    #[test]
    fn test_payment_metadata_view_tag_only() {
        assert_eq!(PaymentMetadata::decode(&[0x42]).unwrap(), None);
    }

    #[test]
    fn test_payment_metadata_unknown_selector() {
        let mut bytes = PaymentMetadata::new(0x01, Asset::Native, 5).encode();
        bytes[1..5].copy_from_slice(&[0xde, 0xad, 0xbe, 0xef]);
        assert_eq!(PaymentMetadata::decode(&bytes).unwrap(), None);
    }

    #[test]
    fn test_payment_metadata_amount_overflow() {
        let mut bytes = PaymentMetadata::new(0x01, Asset::Native, 5).encode();
        bytes[25] = 0x01;
        assert!(PaymentMetadata::decode(&bytes).is_err());
    }

    #[test]
    fn test_announcement_stats() {
        let mut stats = AnnouncementStats::new();
        stats.add(&make_announcement(0x42));
        stats.add(&make_announcement(0x42));

        let mut other = make_announcement(0x01);
        other.scheme_id = 2;
        other.block_number = 7;
        other.metadata = PaymentMetadata::new(0x01, Asset::Native, 9).encode();
        stats.add(&other);

        assert_eq!(stats.total_count, 3);
        assert_eq!(stats.view_tag_distribution[0x42], 2);
        assert_eq!(stats.view_tag_distribution[0x01], 1);
        assert_eq!(stats.earliest_block, Some(7));
        assert_eq!(stats.latest_block, Some(42));
        assert_eq!(stats.unsupported_scheme_count, 1);
        assert_eq!(stats.payment_hint_count, 1);
    }

    #[test]
    fn test_announcement_serde() {
        let ann = make_announcement(0x42);
        let json = serde_json::to_string(&ann).unwrap();
        let parsed: Announcement = serde_json::from_str(&json).unwrap();
        assert_eq!(ann, parsed);
    }
}
