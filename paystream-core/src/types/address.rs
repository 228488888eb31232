//! Address types for PayStream.
//!
//! - [`MetaAddress`]: The recipient's published `{spending, viewing}` public keys
//! - [`EthAddress`]: A 20-byte account address with EIP-55 checksumming
//! - [`TxHash`]: A 32-byte transaction hash
//! - [`StealthAddress`]: A one-time address produced for a single payment

use serde::{Deserialize, Serialize};
use sha3::{Digest, Keccak256};
use tracing::debug;

use super::CurvePoint;
use crate::constants::{
    ETH_ADDRESS_SIZE, META_ADDRESS_SIZE, POINT_COORDINATES_SIZE, TX_HASH_SIZE,
    UNCOMPRESSED_POINT_MARKER,
};
use crate::error::{PaystreamError, Result};

// ═══════════════════════════════════════════════════════════════════════════════
// META-ADDRESS
// ═══════════════════════════════════════════════════════════════════════════════

/// A stealth meta-address published by a merchant for receiving payments.
///
/// Payers read it from the merchant registry and derive a fresh stealth
/// address from it for every payment.
///
/// # Wire Format
/// ```text
/// 0x04 || spending_pk (x || y, 64) || viewing_pk (x || y, 64)   = 129 bytes
/// ```
///
/// Rotating the meta-address only affects future payments; stealth addresses
/// generated under the previous keys stay recoverable with those keys.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetaAddress {
    /// Spending public key - used to derive stealth addresses
    pub spending_pk: CurvePoint,
    /// Viewing public key - used for ECDH with the payer's ephemeral key
    pub viewing_pk: CurvePoint,
}

impl MetaAddress {
    /// Creates a meta-address from the two public keys.
    pub fn new(spending_pk: CurvePoint, viewing_pk: CurvePoint) -> Self {
        Self {
            spending_pk,
            viewing_pk,
        }
    }

    /// Serializes to the 129-byte wire format.
    pub fn to_bytes(&self) -> [u8; META_ADDRESS_SIZE] {
        let mut bytes = [0u8; META_ADDRESS_SIZE];
        bytes[0] = UNCOMPRESSED_POINT_MARKER;
        bytes[1..1 + POINT_COORDINATES_SIZE].copy_from_slice(&self.spending_pk.coordinates());
        bytes[1 + POINT_COORDINATES_SIZE..].copy_from_slice(&self.viewing_pk.coordinates());
        bytes
    }

    /// Parses the wire format by fixed offsets.
    ///
    /// Inputs shorter than 129 bytes are rejected. The marker byte is not
    /// checked; trailing bytes past offset 129 are ignored. Both keys must be
    /// valid, non-identity curve points.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < META_ADDRESS_SIZE {
            return Err(PaystreamError::InvalidMetaAddress(format!(
                "too short: {} bytes, minimum {}",
                bytes.len(),
                META_ADDRESS_SIZE
            )));
        }

        if bytes[0] != UNCOMPRESSED_POINT_MARKER {
            debug!(marker = bytes[0], "meta-address marker byte is not 0x04; parsing by offset");
        }

        let spending_pk = CurvePoint::from_coordinates(&bytes[1..1 + POINT_COORDINATES_SIZE])?;
        let viewing_pk =
            CurvePoint::from_coordinates(&bytes[1 + POINT_COORDINATES_SIZE..META_ADDRESS_SIZE])?;

        Ok(Self {
            spending_pk,
            viewing_pk,
        })
    }

    /// Encodes to `0x`-prefixed hex (registry `bytes` argument).
    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.to_bytes()))
    }

    /// Decodes from hex (with or without `0x`).
    pub fn from_hex(s: &str) -> Result<Self> {
        let s = s.strip_prefix("0x").unwrap_or(s);
        let bytes = hex::decode(s)?;
        Self::from_bytes(&bytes)
    }
}

impl std::fmt::Display for MetaAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// ETHEREUM ADDRESS
// ═══════════════════════════════════════════════════════════════════════════════

/// A 20-byte account address.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EthAddress {
    bytes: [u8; ETH_ADDRESS_SIZE],
}

impl EthAddress {
    /// Creates an address from raw bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != ETH_ADDRESS_SIZE {
            return Err(PaystreamError::InvalidAddress(format!(
                "expected {} bytes, got {}",
                ETH_ADDRESS_SIZE,
                bytes.len()
            )));
        }

        let mut arr = [0u8; ETH_ADDRESS_SIZE];
        arr.copy_from_slice(bytes);
        Ok(Self { bytes: arr })
    }

    /// Creates from a fixed-size array.
    pub const fn from_array(bytes: [u8; ETH_ADDRESS_SIZE]) -> Self {
        Self { bytes }
    }

    /// Returns the raw bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Returns the fixed-size array.
    pub fn to_array(&self) -> [u8; ETH_ADDRESS_SIZE] {
        self.bytes
    }

    /// Returns the EIP-55 mixed-case checksummed hex string.
    pub fn to_checksum_string(&self) -> String {
        let lower = hex::encode(self.bytes);
        let hash = Keccak256::digest(lower.as_bytes());

        let mut out = String::with_capacity(2 + lower.len());
        out.push_str("0x");
        for (i, c) in lower.chars().enumerate() {
            let nibble = (hash[i / 2] >> (if i % 2 == 0 { 4 } else { 0 })) & 0x0f;
            if c.is_ascii_alphabetic() && nibble >= 8 {
                out.push(c.to_ascii_uppercase());
            } else {
                out.push(c);
            }
        }
        out
    }

    /// Parses from hex string (with or without 0x prefix).
    ///
    /// Mixed-case input must carry a valid EIP-55 checksum; all-lowercase and
    /// all-uppercase input is accepted as-is.
    pub fn from_hex(s: &str) -> Result<Self> {
        let body = s.strip_prefix("0x").unwrap_or(s);
        let bytes = hex::decode(body)?;
        let address = Self::from_bytes(&bytes)?;

        let has_lower = body.chars().any(|c| c.is_ascii_lowercase());
        let has_upper = body.chars().any(|c| c.is_ascii_uppercase());
        if has_lower && has_upper && address.to_checksum_string()[2..] != *body {
            return Err(PaystreamError::InvalidAddress(format!(
                "bad EIP-55 checksum: {}",
                s
            )));
        }

        Ok(address)
    }

    /// Returns the zero address.
    pub const fn zero() -> Self {
        Self {
            bytes: [0u8; ETH_ADDRESS_SIZE],
        }
    }

    /// Returns true if this is the zero address.
    pub fn is_zero(&self) -> bool {
        self.bytes.iter().all(|&b| b == 0)
    }
}

impl std::fmt::Debug for EthAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "EthAddress({})", self.to_checksum_string())
    }
}

impl std::fmt::Display for EthAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_checksum_string())
    }
}

impl std::str::FromStr for EthAddress {
    type Err = PaystreamError;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_hex(s)
    }
}

impl Serialize for EthAddress {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_checksum_string())
    }
}

impl<'de> Deserialize<'de> for EthAddress {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Self::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// TRANSACTION HASH
// ═══════════════════════════════════════════════════════════════════════════════

/// A 32-byte transaction hash.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct TxHash {
    bytes: [u8; TX_HASH_SIZE],
}

impl TxHash {
    /// Creates from a fixed-size array.
    pub const fn from_array(bytes: [u8; TX_HASH_SIZE]) -> Self {
        Self { bytes }
    }

    /// Creates a hash from raw bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != TX_HASH_SIZE {
            return Err(PaystreamError::ValidationError(format!(
                "transaction hash must be {} bytes, got {}",
                TX_HASH_SIZE,
                bytes.len()
            )));
        }
        let mut arr = [0u8; TX_HASH_SIZE];
        arr.copy_from_slice(bytes);
        Ok(Self { bytes: arr })
    }

    /// Returns the raw bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Returns `0x`-prefixed lowercase hex.
    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.bytes))
    }

    /// Parses from hex (with or without `0x`).
    pub fn from_hex(s: &str) -> Result<Self> {
        let s = s.strip_prefix("0x").unwrap_or(s);
        let bytes = hex::decode(s)?;
        Self::from_bytes(&bytes)
    }
}

impl std::fmt::Debug for TxHash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "TxHash({})", self.to_hex())
    }
}

impl std::fmt::Display for TxHash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl Serialize for TxHash {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for TxHash {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Self::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// STEALTH ADDRESS
// ═══════════════════════════════════════════════════════════════════════════════

/// A one-time address generated for a single payment.
///
/// Contains everything the payer needs to send funds and publish the
/// announcement. It carries no private key: only the recipient can recover
/// the spending key, from their spending key and the shared secret.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StealthAddress {
    /// The account to send funds to
    pub address: EthAddress,
    /// Payer's ephemeral public key `R`, published in the announcement
    pub ephemeral_public_key: CurvePoint,
    /// First byte of the hashed shared secret
    pub view_tag: u8,
    /// The stealth public key `P` behind `address`
    pub stealth_public_key: CurvePoint,
}

impl StealthAddress {
    /// Minimal ERC-5564 metadata: just the view tag.
    pub fn metadata(&self) -> Vec<u8> {
        vec![self.view_tag]
    }

    /// Ephemeral public key as the compressed bytes placed in the announcement.
    pub fn ephemeral_public_key_bytes(&self) -> Vec<u8> {
        self.ephemeral_public_key.to_compressed().to_vec()
    }
}
