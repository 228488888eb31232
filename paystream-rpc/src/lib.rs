//! # PayStream RPC
//!
//! JSON-RPC implementations of the PayStream collaborators, plus contract
//! bindings for the merchant and invoice registries.
//!
//! - [`RpcLedger`]: `eth_getLogs` announcement queries, native and ERC-20 balances
//! - [`RpcSubmitter`]: gas quotes and locally signed EIP-155 sweeps
//! - [`RegistryClient`]: username resolution, invoices, and calldata for registry writes
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use paystream_rpc::{JsonRpcClient, RegistryClient, RpcConfig};
//!
//! # async fn example() -> paystream_core::Result<()> {
//! let config = RpcConfig::from_env()?;
//! let client = Arc::new(JsonRpcClient::new(&config)?);
//! let registry = RegistryClient::new(client, &config);
//!
//! if let Some(merchant) = registry.resolve("acme").await? {
//!     println!("pay {} via {}", merchant.merchant_id, merchant.meta_address);
//! }
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms)]

pub mod client;
pub mod config;
pub mod contracts;
pub mod ledger;
pub mod submitter;

pub use client::{is_range_limit, JsonRpcClient};
pub use config::RpcConfig;
pub use contracts::{
    announce_call, ContractCall, Invoice, InvoiceStatus, Merchant, RegistryClient,
    ResolvedMerchant,
};
pub use ledger::RpcLedger;
pub use submitter::RpcSubmitter;
