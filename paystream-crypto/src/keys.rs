//! Deterministic key derivation from a wallet signature.
//!
//! The recipient signs a fixed message once per session; the signature is the
//! only secret input, so the same wallet always re-derives the same keys and
//! nothing has to be stored.
//!
//! Each key hashes the UTF-8 text `0x<signature hex>:<label>:<domain>`, the
//! same input the web client uses, so both sides derive identical keys:
//!
//! ```text
//! k = Keccak256("0x…:spending:" ‖ domain) mod n
//! v = Keccak256("0x…:viewing:"  ‖ domain) mod n
//! ```
//!
//! The signature is always 65 bytes and neither label is a prefix of the
//! other, so distinct `(label, domain)` pairs never share a hash input.

use zeroize::Zeroizing;

use paystream_core::constants::{
    KEY_DERIVATION_APP_NAME, LABEL_SPENDING, LABEL_VIEWING, SIGNATURE_SIZE,
};
use paystream_core::error::{PaystreamError, Result};
use paystream_core::types::{DerivedKeys, EthAddress, SecretScalar};

use crate::curve::hash_to_scalar;
use crate::hash::keccak256;

/// Derives the spending and viewing keys from a 65-byte `r || s || v` signature.
///
/// # Errors
///
/// `InvalidSignature` if the signature has the wrong length, `r` or `s` is
/// not a valid scalar, or the recovery byte is not one of 0, 1, 27, 28.
///
/// # Example
///
/// ```rust
/// use paystream_crypto::derive_keys;
///
/// let mut signature = [0x11u8; 65];
/// signature[64] = 27;
///
/// let a = derive_keys(&signature, "stealth-keys").unwrap();
/// let b = derive_keys(&signature, "stealth-keys").unwrap();
/// assert_eq!(a.meta_address(), b.meta_address());
/// ```
pub fn derive_keys(signature: &[u8], domain: &str) -> Result<DerivedKeys> {
    validate_signature(signature)?;

    let spending = derive_scalar(signature, LABEL_SPENDING, domain)?;
    let viewing = derive_scalar(signature, LABEL_VIEWING, domain)?;

    Ok(DerivedKeys::new(spending, viewing))
}

/// Derives keys from a hex-encoded signature (with or without `0x`).
pub fn derive_keys_from_hex(signature_hex: &str, domain: &str) -> Result<DerivedKeys> {
    let s = signature_hex.strip_prefix("0x").unwrap_or(signature_hex);
    let bytes = Zeroizing::new(
        hex::decode(s).map_err(|e| PaystreamError::InvalidSignature(format!("bad hex: {}", e)))?,
    );
    derive_keys(&bytes, domain)
}

/// The message the wallet is asked to sign for key derivation.
pub fn key_derivation_message(domain: &str, account: &EthAddress) -> String {
    format!(
        "{} Key Derivation\n\nDomain: {}\nAddress: {}\n\n\
         This signature allows the app to derive your stealth viewing keys. \
         These keys are only stored in memory and never leave your device.",
        KEY_DERIVATION_APP_NAME, domain, account
    )
}

fn validate_signature(signature: &[u8]) -> Result<()> {
    if signature.len() != SIGNATURE_SIZE {
        return Err(PaystreamError::InvalidSignature(format!(
            "expected {} bytes, got {}",
            SIGNATURE_SIZE,
            signature.len()
        )));
    }

    k256::ecdsa::Signature::from_slice(&signature[..64])
        .map_err(|_| PaystreamError::InvalidSignature("r or s is not a valid scalar".into()))?;

    match signature[64] {
        0 | 1 | 27 | 28 => Ok(()),
        v => Err(PaystreamError::InvalidSignature(format!(
            "unexpected recovery byte {}",
            v
        ))),
    }
}

fn derive_scalar(signature: &[u8], label: &str, domain: &str) -> Result<SecretScalar> {
    let input = Zeroizing::new(format!("0x{}:{}:{}", hex::encode(signature), label, domain));
    let entropy = Zeroizing::new(keccak256(input.as_bytes()));
    hash_to_scalar(&entropy)
}
