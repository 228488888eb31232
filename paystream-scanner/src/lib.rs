//! # PayStream Scanner
//!
//! Block-range scanning of ERC-5564 announcements to discover payments.
//!
//! ## Features
//!
//! - **Chunked Queries**: Ranges are split to respect the ledger's log-range limit
//! - **Bisection**: A sub-range the ledger still refuses is halved and retried
//! - **Bounded Concurrency**: Sub-ranges are fetched in parallel up to a limit
//! - **Partial Results**: Failed sub-ranges and malformed logs are reported, not fatal
//! - **Resumable Scans**: A block watermark is returned after every scan
//! - **Progress Reporting**: Callbacks for UI progress updates
//!
//! ## Example
//!
//! ```rust,ignore
//! use paystream_scanner::{Scanner, ScannerConfig};
//!
//! let scanner = Scanner::new(ledger, keys, ScannerConfig::default());
//!
//! let report = scanner.scan_for_recipient(start_block, None).await?;
//! for payment in &report.results {
//!     println!("{} holds {}", payment.stealth_address(), payment.balance);
//! }
//!
//! // Later: continue from where the last scan stopped
//! let report = scanner.resume().await?;
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms)]

pub mod config;
pub mod progress;
pub mod scanner;
pub mod source;

pub use config::ScannerConfig;
pub use progress::{ProgressCallback, ScanPosition, ScanProgress, ScanSummary};
pub use scanner::{BalanceFailure, RangeFailure, ScanReport, Scanner};
pub use source::{AnnouncementScanner, RangeBatch};
