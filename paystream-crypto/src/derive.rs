//! Stealth key and address derivation.
//!
//! ## Derivation Flow
//!
//! ```text
//! S = r·V = v·R                         (ECDH)
//!       ↓
//! h = Keccak256(compressed(S))          (view tag = h[0])
//!       ↓
//! P = K + h·G                           (payer: stealth public key)
//! p = k + h mod n                       (recipient: stealth private key)
//!       ↓
//! address = Keccak256(P.x || P.y)[12..32]
//! ```
//!
//! `p·G = k·G + h·G = K + h·G = P`, so the recipient's recovered key always
//! controls the address the payer computed.

use subtle::ConstantTimeEq;

use paystream_core::constants::{ETH_ADDRESS_SIZE, KECCAK256_SIZE};
use paystream_core::error::Result;
use paystream_core::types::{CurvePoint, EthAddress, SecretScalar};

use crate::curve::{add, hash_to_scalar, mul_generator, scalar_add};
use crate::hash::keccak256;
use crate::view_tag::hash_shared_secret;

/// Result of recipient-side stealth key derivation.
#[derive(Debug, Clone)]
pub struct StealthKeys {
    /// The stealth public key `P`
    pub public_key: CurvePoint,
    /// The stealth private key `p` (zeroized on drop)
    pub private_key: SecretScalar,
    /// The derived account address
    pub address: EthAddress,
}

// ═══════════════════════════════════════════════════════════════════════════════
// STEALTH PUBLIC KEY DERIVATION
// ═══════════════════════════════════════════════════════════════════════════════

/// Derives the stealth public key `P = K + h·G`.
///
/// # Arguments
///
/// * `spending_pk` - The recipient's spending public key `K`
/// * `hashed_secret` - `h = Keccak256(compressed(S))`
pub fn derive_stealth_public_key(
    spending_pk: &CurvePoint,
    hashed_secret: &[u8; KECCAK256_SIZE],
) -> Result<CurvePoint> {
    let h = hash_to_scalar(hashed_secret)?;
    add(spending_pk, &mul_generator(&h))
}

// ═══════════════════════════════════════════════════════════════════════════════
// STEALTH PRIVATE KEY DERIVATION
// ═══════════════════════════════════════════════════════════════════════════════

/// Derives the stealth private key `p = k + h mod n`.
///
/// # Security
///
/// The output controls funds. It is zeroized on drop and must never be
/// logged or persisted.
pub fn derive_stealth_private_key(
    spending_sk: &SecretScalar,
    hashed_secret: &[u8; KECCAK256_SIZE],
) -> Result<SecretScalar> {
    let h = hash_to_scalar(hashed_secret)?;
    scalar_add(spending_sk, &h)
}

// ═══════════════════════════════════════════════════════════════════════════════
// ADDRESS DERIVATION
// ═══════════════════════════════════════════════════════════════════════════════

/// Derives the account address of a public key.
///
/// ```text
/// address = Keccak256(uncompressed(P)[1..65])[12..32]
/// ```
pub fn derive_eth_address(public_key: &CurvePoint) -> EthAddress {
    let hash = keccak256(&public_key.coordinates());

    let mut address_bytes = [0u8; ETH_ADDRESS_SIZE];
    address_bytes.copy_from_slice(&hash[KECCAK256_SIZE - ETH_ADDRESS_SIZE..]);
    EthAddress::from_array(address_bytes)
}

// ═══════════════════════════════════════════════════════════════════════════════
// COMBINED DERIVATION
// ═══════════════════════════════════════════════════════════════════════════════

/// Derives complete stealth keys from the recipient's spending key and the
/// shared secret `S = v·R`.
pub fn derive_stealth_keys(
    spending_sk: &SecretScalar,
    shared_secret: &CurvePoint,
) -> Result<StealthKeys> {
    let hashed = hash_shared_secret(shared_secret);
    derive_stealth_keys_from_hash(spending_sk, &hashed)
}

/// Same as [`derive_stealth_keys`] for callers that already hashed `S`.
pub fn derive_stealth_keys_from_hash(
    spending_sk: &SecretScalar,
    hashed_secret: &[u8; KECCAK256_SIZE],
) -> Result<StealthKeys> {
    let private_key = derive_stealth_private_key(spending_sk, hashed_secret)?;
    let public_key = private_key.public_point();
    let address = derive_eth_address(&public_key);

    Ok(StealthKeys {
        public_key,
        private_key,
        address,
    })
}

/// Derives only the address and stealth public key (payer side).
pub fn derive_stealth_address(
    spending_pk: &CurvePoint,
    shared_secret: &CurvePoint,
) -> Result<(EthAddress, CurvePoint)> {
    let hashed = hash_shared_secret(shared_secret);
    let stealth_pk = derive_stealth_public_key(spending_pk, &hashed)?;
    Ok((derive_eth_address(&stealth_pk), stealth_pk))
}

// ═══════════════════════════════════════════════════════════════════════════════
// VERIFICATION
// ═══════════════════════════════════════════════════════════════════════════════

/// Constant-time address comparison.
pub fn addresses_match(a: &EthAddress, b: &EthAddress) -> bool {
    a.as_bytes().ct_eq(b.as_bytes()).into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::curve::shared_secret;
    use test_case::test_case;

    fn scalar(n: u64) -> SecretScalar {
        let mut bytes = [0u8; 32];
        bytes[24..].copy_from_slice(&n.to_be_bytes());
        SecretScalar::from_bytes(&bytes).unwrap()
    }

    #[test_case(1, "0x7E5F4552091A69125d5DfCb7b8C2659029395Bdf" ; "private key one")]
    #[test_case(2, "0x2B5AD5c4795c026514f8317c7a215E218DcCD6cF" ; "private key two")]
    fn test_derive_eth_address_known(n: u64, expected: &str) {
        let address = derive_eth_address(&scalar(n).public_point());
        assert_eq!(address.to_checksum_string(), expected);
    }

    #[test]
    fn test_public_and_private_derivations_agree() {
        let spending_sk = scalar(0xDEAD_BEEF);
        let spending_pk = spending_sk.public_point();
        let hashed = [0xAB; 32];

        let stealth_pk = derive_stealth_public_key(&spending_pk, &hashed).unwrap();
        let stealth_sk = derive_stealth_private_key(&spending_sk, &hashed).unwrap();

        assert_eq!(stealth_sk.public_point(), stealth_pk);
        assert_ne!(stealth_pk, spending_pk);
    }

    #[test]
    fn test_payer_and_recipient_agree() {
        let spending = scalar(11);
        let viewing = scalar(22);
        let ephemeral = scalar(33);

        // Payer: S = r·V
        let payer_s = shared_secret(&ephemeral, &viewing.public_point()).unwrap();
        let (address, stealth_pk) =
            derive_stealth_address(&spending.public_point(), &payer_s).unwrap();

        // Recipient: S = v·R
        let recipient_s = shared_secret(&viewing, &ephemeral.public_point()).unwrap();
        let keys = derive_stealth_keys(&spending, &recipient_s).unwrap();

        assert_eq!(keys.address, address);
        assert_eq!(keys.public_key, stealth_pk);
    }

    #[test]
    fn test_different_secrets_different_addresses() {
        let spending_pk = scalar(1).public_point();
        let (a, _) = derive_stealth_address(&spending_pk, &scalar(2).public_point()).unwrap();
        let (b, _) = derive_stealth_address(&spending_pk, &scalar(3).public_point()).unwrap();
        assert_ne!(a, b);
    }
}
