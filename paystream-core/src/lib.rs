//! # PayStream Core
//!
//! Core types, errors, and traits for PayStream's ERC-5564 stealth payment flow.
//!
//! This crate provides the foundational building blocks used by all other PayStream crates:
//!
//! - **Types**: Curve points, secret scalars, meta-addresses, announcements, scan results
//! - **Errors**: One error taxonomy shared by derivation, scanning, matching, and sweeping
//! - **Constants**: Encoding sizes, scheme identifiers, network defaults
//! - **Traits**: Interfaces for the external ledger, wallet signer, and transaction submitter
//!
//! ## Example
//!
//! ```rust
//! use paystream_core::{MetaAddress, PaystreamError};
//!
//! // Meta-addresses shorter than 129 bytes are rejected
//! let err = MetaAddress::from_bytes(&[0x04; 128]).unwrap_err();
//! assert!(matches!(err, PaystreamError::InvalidMetaAddress(_)));
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, clippy::all)]

pub mod constants;
pub mod error;
pub mod traits;
pub mod types;

// Re-export commonly used items at crate root
pub use constants::*;
pub use error::{PaystreamError, Result};
pub use traits::*;
pub use types::*;
