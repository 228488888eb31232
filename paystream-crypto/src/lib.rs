//! # PayStream Cryptography
//!
//! secp256k1 primitives for ERC-5564 stealth payments.
//!
//! This crate provides:
//!
//! - **Curve**: Validated scalar multiplication, point and scalar addition
//! - **Hash**: Keccak-256, with length-prefixed multi-part input
//! - **Keys**: Deterministic spending/viewing key derivation from a wallet signature
//! - **View Tags**: One-byte scan filter derived from the shared secret
//! - **Derivation**: Stealth public/private keys and account addresses
//!
//! ## Security Properties
//!
//! - Secret scalars are zeroized on drop and never printed
//! - Scalar multiplication is delegated to `k256` (no branching on secret bits)
//! - The identity point and zero scalar are rejected everywhere
//!
//! ## Example
//!
//! ```rust
//! use paystream_crypto::{derive_keys, derive_stealth_address, derive_stealth_keys, shared_secret};
//! use paystream_core::SecretScalar;
//!
//! let mut signature = [0x42u8; 65];
//! signature[64] = 27;
//! let recipient = derive_keys(&signature, "stealth-keys").unwrap();
//!
//! // Payer side
//! let ephemeral = SecretScalar::random(&mut rand::thread_rng());
//! let s = shared_secret(&ephemeral, recipient.viewing_public_key()).unwrap();
//! let (address, _) = derive_stealth_address(recipient.spending_public_key(), &s).unwrap();
//!
//! // Recipient side
//! let s = shared_secret(recipient.viewing_private_key(), &ephemeral.public_point()).unwrap();
//! let keys = derive_stealth_keys(recipient.spending_private_key(), &s).unwrap();
//! assert_eq!(keys.address, address);
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms)]

pub mod curve;
pub mod derive;
pub mod hash;
pub mod keys;
pub mod view_tag;

// Re-export main functions at crate root
pub use curve::{add, hash_to_scalar, mul_generator, scalar_add, scalar_mul, shared_secret};
pub use derive::{
    addresses_match, derive_eth_address, derive_stealth_address, derive_stealth_keys,
    derive_stealth_keys_from_hash, StealthKeys,
};
pub use hash::{keccak256, keccak256_multi};
pub use keys::{derive_keys, derive_keys_from_hex, key_derivation_message};
pub use view_tag::{compute_view_tag, hash_shared_secret, verify_view_tag, ViewTagStats};
