//! secp256k1 arithmetic on validated points and scalars.
//!
//! Thin wrappers over `k256` that keep the identity element and out-of-range
//! scalars out of every result. Arithmetic is delegated to `k256`, whose
//! scalar multiplication does not branch on secret bits.

use k256::elliptic_curve::ops::Reduce;
use k256::{FieldBytes, NonZeroScalar, Scalar, U256};

use paystream_core::constants::SCALAR_SIZE;
use paystream_core::error::{PaystreamError, Result};
use paystream_core::types::{CurvePoint, SecretScalar};

/// Computes `scalar · point`.
pub fn scalar_mul(scalar: &SecretScalar, point: &CurvePoint) -> Result<CurvePoint> {
    let k = scalar.to_nonzero_scalar();
    CurvePoint::from_projective(point.to_projective() * *k)
}

/// Computes `scalar · G`.
pub fn mul_generator(scalar: &SecretScalar) -> CurvePoint {
    scalar.public_point()
}

/// Computes `a + b`. A sum equal to the identity is rejected.
pub fn add(a: &CurvePoint, b: &CurvePoint) -> Result<CurvePoint> {
    CurvePoint::from_projective(a.to_projective() + b.to_projective())
}

/// Computes `a + b mod n`. A zero sum is rejected.
pub fn scalar_add(a: &SecretScalar, b: &SecretScalar) -> Result<SecretScalar> {
    let sum: Scalar = *a.to_nonzero_scalar() + *b.to_nonzero_scalar();
    let nonzero: Option<NonZeroScalar> = NonZeroScalar::new(sum).into();
    nonzero
        .map(SecretScalar::from_nonzero)
        .ok_or_else(|| PaystreamError::InvalidKeyMaterial("scalar sum is zero".into()))
}

/// Reduces a 32-byte big-endian digest modulo the curve order.
///
/// A zero result (probability ~2^-256) is rejected.
pub fn hash_to_scalar(digest: &[u8; SCALAR_SIZE]) -> Result<SecretScalar> {
    let bytes = FieldBytes::from(*digest);
    let reduced = <Scalar as Reduce<U256>>::reduce_bytes(&bytes);
    let nonzero: Option<NonZeroScalar> = NonZeroScalar::new(reduced).into();
    nonzero
        .map(SecretScalar::from_nonzero)
        .ok_or_else(|| PaystreamError::InvalidKeyMaterial("digest reduces to zero".into()))
}

/// ECDH: `secret · public`.
///
/// Payer computes `r · V`, recipient computes `v · R`; both equal `r·v·G`.
pub fn shared_secret(secret: &SecretScalar, public: &CurvePoint) -> Result<CurvePoint> {
    scalar_mul(secret, public)
}
