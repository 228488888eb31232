//! # PayStream Ledger
//!
//! An in-process stand-in for an EVM node.
//!
//! [`MemoryLedger`] implements both [`LedgerReader`] and
//! [`TransactionSubmitter`], so the scanner and the sweep coordinator can run
//! end to end without a network:
//!
//! - **Logs**: announcements per announcer contract, positioned by block
//! - **Balances**: native coin and ERC-20 tokens
//! - **Submission**: fee quotes, balance checks, nonces, recorded transfers
//! - **Fault injection**: log-range caps, transport failures, latency
//!
//! ## Example
//!
//! ```rust,ignore
//! use paystream_ledger::MemoryLedger;
//!
//! let ledger = MemoryLedger::new().with_max_block_range(1_000);
//! let stored = ledger.announce(announcement);
//! ledger.credit_native(stored.stealth_address, 10u128.pow(18));
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms)]

mod memory;

pub use memory::MemoryLedger;

// Re-export the traits from core
pub use paystream_core::traits::{LedgerReader, TransactionSubmitter};
