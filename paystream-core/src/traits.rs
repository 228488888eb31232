//! Collaborator traits for PayStream.
//!
//! The core never talks to a wallet or a node directly. These traits are the
//! seams: the RPC crate implements them against a JSON-RPC endpoint, the
//! ledger crate implements them in memory for development and tests.

use async_trait::async_trait;

use crate::error::Result;
use crate::types::{
    Amount, Announcement, BlockRange, EthAddress, FeeQuote, SecretScalar, TransactionHandle,
    TransferRequest,
};

// ═══════════════════════════════════════════════════════════════════════════════
// LEDGER ACCESS
// ═══════════════════════════════════════════════════════════════════════════════

/// Read-only access to the ledger.
///
/// Implementations might use:
/// - A JSON-RPC node (`eth_getLogs`, `eth_getBalance`, `eth_call`)
/// - In-memory state (for testing/development)
#[async_trait]
pub trait LedgerReader: Send + Sync {
    /// Returns the latest block number.
    async fn block_number(&self) -> Result<u64>;

    /// Returns the announcement logs emitted by `announcer` inside `range`.
    ///
    /// When `scheme_id` is set, only that scheme is returned. Fails with
    /// `RangeTooLarge` if the ledger refuses the range width and with
    /// `TransportError` if the ledger cannot be reached.
    async fn announcements(
        &self,
        announcer: EthAddress,
        range: BlockRange,
        scheme_id: Option<u64>,
    ) -> Result<Vec<Announcement>>;

    /// Native-coin balance of `address`.
    async fn native_balance(&self, address: EthAddress) -> Result<Amount>;

    /// ERC-20 balance of `owner` in `token`.
    async fn token_balance(&self, token: EthAddress, owner: EthAddress) -> Result<Amount>;
}

// ═══════════════════════════════════════════════════════════════════════════════
// WALLET SIGNER
// ═══════════════════════════════════════════════════════════════════════════════

/// The user's connected wallet, passed in as an explicit capability.
///
/// Signing is user-interactive. A refusal is reported as
/// `PaystreamError::SigningDeclined`.
#[async_trait]
pub trait WalletSigner: Send + Sync {
    /// Account the wallet signs for.
    fn address(&self) -> EthAddress;

    /// Requests a `personal_sign` signature (65 bytes, `r || s || v`) over `message`.
    async fn sign_message(&self, message: &str) -> Result<Vec<u8>>;
}

// ═══════════════════════════════════════════════════════════════════════════════
// TRANSACTION SUBMISSION
// ═══════════════════════════════════════════════════════════════════════════════

/// Signs and broadcasts transfers from a stealth address.
#[async_trait]
pub trait TransactionSubmitter: Send + Sync {
    /// Quotes gas for `request`.
    async fn estimate_fee(&self, request: &TransferRequest) -> Result<FeeQuote>;

    /// Signs `request` with `key` and broadcasts it.
    ///
    /// `key` must control `request.from`.
    async fn submit(
        &self,
        key: &SecretScalar,
        request: &TransferRequest,
        fee: FeeQuote,
    ) -> Result<TransactionHandle>;
}
