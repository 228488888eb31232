//! # PayStream Stealth Payments
//!
//! High-level API for paying to and collecting from stealth addresses.
//!
//! This crate provides:
//!
//! - **Payment Generation**: One-time addresses and announcement data for a payer
//! - **Matching**: Recovering payments from announcements across key epochs
//! - **Key Session**: One wallet signature per session, keys kept in memory only
//! - **Sweeping**: Moving recovered funds to a payout address
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use paystream_stealth::{generate, KeySession, StealthMatcher, SweepCoordinator};
//!
//! // Recipient: derive keys from one wallet signature, publish the meta-address
//! let session = KeySession::new(wallet);
//! let keys = session.unlock().await?;
//! let meta = keys.meta_address();
//!
//! // Payer: pay a fresh address, then announce it
//! let payment = generate(&meta)?;
//! let announcement = payment.to_announcement(payer)?;
//!
//! // Recipient: find the payment and sweep it
//! let report = StealthMatcher::new(keys).match_announcements(&[announcement]);
//! let outcomes = sweeper.sweep_all(&report.results, payout).await;
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms)]

pub mod discovery;
pub mod payment;
pub mod session;
pub mod sweep;

pub use discovery::{
    match_announcement, match_announcements, MatchFailure, MatchOutcome, MatchReport, ScanStats,
    StealthMatcher,
};
pub use payment::{generate, generate_with_rng, verify_payment, StealthPayment, StealthPaymentBuilder};
pub use session::KeySession;
pub use sweep::{SweepConfig, SweepCoordinator, SweepOutcome};
