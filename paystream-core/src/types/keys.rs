//! Key types for PayStream.
//!
//! - [`CurvePoint`]: A validated secp256k1 point (never the identity)
//! - [`SecretScalar`]: A validated secret scalar in `[1, n)`, zeroized on drop
//! - [`KeyPair`]: Secret scalar plus its public point
//! - [`DerivedKeys`]: Spending + viewing key pairs derived from a wallet signature

use k256::elliptic_curve::rand_core::CryptoRngCore;
use k256::elliptic_curve::sec1::ToEncodedPoint;
use k256::{AffinePoint, FieldBytes, NonZeroScalar, ProjectivePoint, PublicKey, SecretKey};
use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

use crate::constants::{
    POINT_COORDINATES_SIZE, SCALAR_SIZE, UNCOMPRESSED_POINT_MARKER, UNCOMPRESSED_POINT_SIZE,
};
use crate::error::{PaystreamError, Result};
use crate::types::MetaAddress;

// ═══════════════════════════════════════════════════════════════════════════════
// CURVE POINT
// ═══════════════════════════════════════════════════════════════════════════════

/// A secp256k1 public point.
///
/// Construction always checks that the point is on the curve and is not the
/// identity element, so every `CurvePoint` in circulation is usable as a key.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct CurvePoint {
    inner: PublicKey,
}

impl CurvePoint {
    /// Parses a SEC1-encoded point (compressed or uncompressed).
    pub fn from_sec1_bytes(bytes: &[u8]) -> Result<Self> {
        PublicKey::from_sec1_bytes(bytes)
            .map(|inner| Self { inner })
            .map_err(|_| {
                PaystreamError::InvalidKeyMaterial(format!(
                    "not a valid secp256k1 point ({} bytes)",
                    bytes.len()
                ))
            })
    }

    /// Parses the raw 64-byte `x || y` coordinates (no SEC1 marker).
    pub fn from_coordinates(coordinates: &[u8]) -> Result<Self> {
        if coordinates.len() != POINT_COORDINATES_SIZE {
            return Err(PaystreamError::InvalidKeyMaterial(format!(
                "expected {} coordinate bytes, got {}",
                POINT_COORDINATES_SIZE,
                coordinates.len()
            )));
        }

        let mut encoded = [0u8; UNCOMPRESSED_POINT_SIZE];
        encoded[0] = UNCOMPRESSED_POINT_MARKER;
        encoded[1..].copy_from_slice(coordinates);
        Self::from_sec1_bytes(&encoded)
    }

    /// Wraps an already validated public key.
    pub fn from_public_key(inner: PublicKey) -> Self {
        Self { inner }
    }

    /// Converts an affine point, rejecting the identity.
    pub fn from_affine(point: AffinePoint) -> Result<Self> {
        PublicKey::from_affine(point)
            .map(|inner| Self { inner })
            .map_err(|_| PaystreamError::InvalidKeyMaterial("point at infinity".into()))
    }

    /// Converts a projective point, rejecting the identity.
    pub fn from_projective(point: ProjectivePoint) -> Result<Self> {
        Self::from_affine(point.to_affine())
    }

    /// Returns the underlying public key.
    pub fn as_public_key(&self) -> &PublicKey {
        &self.inner
    }

    /// Returns the point in projective coordinates for arithmetic.
    pub fn to_projective(&self) -> ProjectivePoint {
        self.inner.to_projective()
    }

    /// Returns the 65-byte uncompressed SEC1 encoding.
    pub fn to_uncompressed(&self) -> [u8; UNCOMPRESSED_POINT_SIZE] {
        let encoded = self.inner.to_encoded_point(false);
        let mut out = [0u8; UNCOMPRESSED_POINT_SIZE];
        out.copy_from_slice(encoded.as_bytes());
        out
    }

    /// Returns the 33-byte compressed SEC1 encoding.
    pub fn to_compressed(&self) -> [u8; SCALAR_SIZE + 1] {
        let encoded = self.inner.to_encoded_point(true);
        let mut out = [0u8; SCALAR_SIZE + 1];
        out.copy_from_slice(encoded.as_bytes());
        out
    }

    /// Returns the raw `x || y` coordinates (uncompressed encoding without marker).
    pub fn coordinates(&self) -> [u8; POINT_COORDINATES_SIZE] {
        let uncompressed = self.to_uncompressed();
        let mut out = [0u8; POINT_COORDINATES_SIZE];
        out.copy_from_slice(&uncompressed[1..]);
        out
    }

    /// Returns the `0x`-prefixed hex of the uncompressed encoding.
    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.to_uncompressed()))
    }

    /// Parses a hex-encoded SEC1 point (with or without `0x`).
    pub fn from_hex(s: &str) -> Result<Self> {
        let s = s.strip_prefix("0x").unwrap_or(s);
        let bytes = hex::decode(s)
            .map_err(|e| PaystreamError::InvalidKeyMaterial(format!("bad point hex: {}", e)))?;
        Self::from_sec1_bytes(&bytes)
    }
}

impl std::fmt::Debug for CurvePoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let compressed = self.to_compressed();
        write!(
            f,
            "CurvePoint({}...{})",
            hex::encode(&compressed[..5]),
            hex::encode(&compressed[compressed.len() - 4..])
        )
    }
}

impl Serialize for CurvePoint {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for CurvePoint {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Self::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// SECRET SCALAR
// ═══════════════════════════════════════════════════════════════════════════════

/// A secp256k1 secret scalar in `[1, n)`.
///
/// Backed by [`k256::SecretKey`], which zeroizes its memory on drop.
/// Never expose this value in logs or error messages.
#[derive(Clone)]
pub struct SecretScalar {
    inner: SecretKey,
}

impl SecretScalar {
    /// Parses a 32-byte big-endian scalar.
    ///
    /// # Errors
    /// `InvalidKeyMaterial` if the length is wrong, the value is zero, or it is
    /// not below the curve order.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != SCALAR_SIZE {
            return Err(PaystreamError::InvalidKeyMaterial(format!(
                "expected {} scalar bytes, got {}",
                SCALAR_SIZE,
                bytes.len()
            )));
        }

        let field_bytes = FieldBytes::clone_from_slice(bytes);
        SecretKey::from_bytes(&field_bytes)
            .map(|inner| Self { inner })
            .map_err(|_| {
                PaystreamError::InvalidKeyMaterial("scalar is zero or not below the curve order".into())
            })
    }

    /// Samples a uniformly random scalar from a cryptographically secure RNG.
    pub fn random(rng: &mut impl CryptoRngCore) -> Self {
        Self {
            inner: SecretKey::random(rng),
        }
    }

    /// Wraps a non-zero scalar.
    pub fn from_nonzero(scalar: NonZeroScalar) -> Self {
        Self {
            inner: SecretKey::from(scalar),
        }
    }

    /// Wraps an existing secret key.
    pub fn from_secret_key(inner: SecretKey) -> Self {
        Self { inner }
    }

    /// Returns the underlying secret key.
    pub fn as_secret_key(&self) -> &SecretKey {
        &self.inner
    }

    /// Returns the scalar for arithmetic.
    pub fn to_nonzero_scalar(&self) -> NonZeroScalar {
        self.inner.to_nonzero_scalar()
    }

    /// Returns the big-endian bytes, zeroized when the returned buffer drops.
    ///
    /// # Security
    /// Handle the returned bytes carefully - do not log or expose them.
    pub fn to_bytes(&self) -> Zeroizing<[u8; SCALAR_SIZE]> {
        let mut out = Zeroizing::new([0u8; SCALAR_SIZE]);
        out.copy_from_slice(&self.inner.to_bytes());
        out
    }

    /// Returns the public point `self · G`.
    pub fn public_point(&self) -> CurvePoint {
        CurvePoint::from_public_key(self.inner.public_key())
    }
}

impl std::fmt::Debug for SecretScalar {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Never expose secret key content
        write!(f, "SecretScalar([REDACTED])")
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// KEY PAIR
// ═══════════════════════════════════════════════════════════════════════════════

/// A secp256k1 key pair (secret scalar + public point).
#[derive(Clone)]
pub struct KeyPair {
    /// Secret scalar (keep private, zeroized on drop)
    pub secret: SecretScalar,
    /// Public point (safe to share)
    pub public: CurvePoint,
}

impl KeyPair {
    /// Builds the key pair for a secret scalar.
    pub fn from_secret(secret: SecretScalar) -> Self {
        let public = secret.public_point();
        Self { secret, public }
    }
}

impl std::fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyPair")
            .field("public", &self.public)
            .field("secret", &"[REDACTED]")
            .finish()
    }
}

/// Ephemeral key pair generated by the payer for a single payment.
///
/// Lives only for the duration of the payment flow; never persisted.
pub type EphemeralKeyPair = KeyPair;

// ═══════════════════════════════════════════════════════════════════════════════
// DERIVED KEYS
// ═══════════════════════════════════════════════════════════════════════════════

/// Spending and viewing keys derived from a wallet signature.
///
/// Recomputable at will from the same signature and domain, so it is held in
/// volatile memory only. Deliberately not `Serialize`.
#[derive(Clone)]
pub struct DerivedKeys {
    /// Keys for spending from stealth addresses
    pub spending: KeyPair,
    /// Keys for viewing/scanning announcements
    pub viewing: KeyPair,
}

impl DerivedKeys {
    /// Creates a key set from the two secret scalars.
    pub fn new(spending: SecretScalar, viewing: SecretScalar) -> Self {
        Self {
            spending: KeyPair::from_secret(spending),
            viewing: KeyPair::from_secret(viewing),
        }
    }

    /// Spending private key.
    pub fn spending_private_key(&self) -> &SecretScalar {
        &self.spending.secret
    }

    /// Viewing private key.
    pub fn viewing_private_key(&self) -> &SecretScalar {
        &self.viewing.secret
    }

    /// Spending public key.
    pub fn spending_public_key(&self) -> &CurvePoint {
        &self.spending.public
    }

    /// Viewing public key.
    pub fn viewing_public_key(&self) -> &CurvePoint {
        &self.viewing.public
    }

    /// Returns the meta-address to publish for these keys.
    pub fn meta_address(&self) -> MetaAddress {
        MetaAddress::new(self.spending.public, self.viewing.public)
    }
}

impl std::fmt::Debug for DerivedKeys {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DerivedKeys")
            .field("spending_public", &self.spending.public)
            .field("viewing_public", &self.viewing.public)
            .field("secrets", &"[REDACTED]")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    // Generator point G, uncompressed.
    const GENERATOR_HEX: &str = "0479be667ef9dcbbac55a06295ce870b07029bfcdb2dce28d959f2815b16f81798483ada7726a3c4655da4fbfc0e1108a8fd17b448a68554199c47d08ffb10d4b8";

    // Curve order n.
    const ORDER_HEX: &str = "fffffffffffffffffffffffffffffffebaaedce6af48a03bbfd25e8cd0364141";

    #[test]
    fn test_generator_parses() {
        let g = CurvePoint::from_hex(GENERATOR_HEX).unwrap();
        assert_eq!(hex::encode(g.to_uncompressed()), GENERATOR_HEX);
        assert_eq!(g.to_compressed()[0], 0x02);
    }

    #[test]
    fn test_bad_point_hex_is_invalid_key_material() {
        for input in ["0xzz", "04abc", "not hex"] {
            assert!(matches!(
                CurvePoint::from_hex(input),
                Err(PaystreamError::InvalidKeyMaterial(_))
            ));
        }
    }

    #[test]
    fn test_coordinates_roundtrip() {
        let g = CurvePoint::from_hex(GENERATOR_HEX).unwrap();
        let coords = g.coordinates();
        let g2 = CurvePoint::from_coordinates(&coords).unwrap();
        assert_eq!(g, g2);
    }

    #[test]
    fn test_off_curve_point_rejected() {
        let mut coords = [0u8; POINT_COORDINATES_SIZE];
        coords[31] = 1;
        coords[63] = 1;
        let result = CurvePoint::from_coordinates(&coords);
        assert!(matches!(result, Err(PaystreamError::InvalidKeyMaterial(_))));
    }

    #[test]
    fn test_all_zero_point_rejected() {
        let result = CurvePoint::from_coordinates(&[0u8; POINT_COORDINATES_SIZE]);
        assert!(matches!(result, Err(PaystreamError::InvalidKeyMaterial(_))));
    }

    #[test]
    fn test_identity_encoding_rejected() {
        // SEC1 encodes the identity as a single zero byte
        let result = CurvePoint::from_sec1_bytes(&[0x00]);
        assert!(matches!(result, Err(PaystreamError::InvalidKeyMaterial(_))));
    }

    #[test_case(&[0u8; 32] ; "zero scalar")]
    #[test_case(&hex::decode(ORDER_HEX).unwrap() ; "curve order")]
    #[test_case(&[0xffu8; 32] ; "above curve order")]
    #[test_case(&[1u8; 31] ; "short scalar")]
    fn test_invalid_scalars_rejected(bytes: &[u8]) {
        let result = SecretScalar::from_bytes(bytes);
        assert!(matches!(result, Err(PaystreamError::InvalidKeyMaterial(_))));
    }

    #[test]
    fn test_scalar_one_maps_to_generator() {
        let mut one = [0u8; 32];
        one[31] = 1;
        let secret = SecretScalar::from_bytes(&one).unwrap();
        let g = CurvePoint::from_hex(GENERATOR_HEX).unwrap();
        assert_eq!(secret.public_point(), g);
        assert_eq!(*secret.to_bytes(), one);
    }

    #[test]
    fn test_secret_debug_redacted() {
        let mut bytes = [0u8; 32];
        bytes[31] = 7;
        let secret = SecretScalar::from_bytes(&bytes).unwrap();
        let debug = format!("{:?}", secret);
        assert!(debug.contains("REDACTED"));

        let pair = KeyPair::from_secret(secret);
        let debug = format!("{:?}", pair);
        assert!(debug.contains("REDACTED"));
        assert!(!debug.contains("0000000000000007"));
    }

    #[test]
    fn test_point_serde() {
        let g = CurvePoint::from_hex(GENERATOR_HEX).unwrap();
        let json = serde_json::to_string(&g).unwrap();
        let g2: CurvePoint = serde_json::from_str(&json).unwrap();
        assert_eq!(g, g2);
    }
}
