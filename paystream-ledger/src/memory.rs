//! In-memory ledger.
//!
//! Thread-safe storage of announcement logs and balances, plus a transfer
//! executor that checks gas and balances the way a node would.

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::RwLock;
use tracing::{debug, instrument, warn};

use paystream_core::constants::{ERC20_TRANSFER_GAS, NATIVE_TRANSFER_GAS};
use paystream_core::error::{PaystreamError, Result};
use paystream_core::traits::{LedgerReader, TransactionSubmitter};
use paystream_core::types::{
    Amount, Announcement, AnnouncementStats, Asset, BlockRange, EthAddress, FeeQuote,
    SecretScalar, TransactionHandle, TransferRequest, TxHash,
};
use paystream_crypto::{derive_eth_address, keccak256_multi};

/// Default gas price: 30 gwei.
const DEFAULT_GAS_PRICE: u128 = 30_000_000_000;

#[derive(Debug, Clone)]
struct LogEntry {
    announcer: EthAddress,
    announcement: Announcement,
}

/// In-memory ledger.
///
/// # Storage
///
/// - Logs: append-only, each tagged with the announcer contract that emitted it
/// - Native balances: address → amount
/// - Token balances: (token, owner) → amount
/// - Nonces: sender → next nonce
///
/// # Fault injection
///
/// - [`with_max_block_range`](Self::with_max_block_range): wider log queries
///   fail with `RangeTooLarge`
/// - [`fail_next`](Self::fail_next): the next `n` reads fail with `TransportError`
/// - [`with_latency`](Self::with_latency): every submission waits before executing
#[derive(Debug)]
pub struct MemoryLedger {
    logs: RwLock<Vec<LogEntry>>,
    native: DashMap<EthAddress, Amount>,
    tokens: DashMap<(EthAddress, EthAddress), Amount>,
    nonces: DashMap<EthAddress, u64>,
    submitted: RwLock<Vec<TransactionHandle>>,
    head: AtomicU64,
    pending_failures: AtomicU32,
    log_queries: AtomicU64,
    stats: RwLock<AnnouncementStats>,
    max_block_range: Option<u64>,
    gas_price: u128,
    latency: Option<Duration>,
}

impl MemoryLedger {
    /// Creates an empty ledger at block 0.
    pub fn new() -> Self {
        Self {
            logs: RwLock::new(Vec::new()),
            native: DashMap::new(),
            tokens: DashMap::new(),
            nonces: DashMap::new(),
            submitted: RwLock::new(Vec::new()),
            head: AtomicU64::new(0),
            pending_failures: AtomicU32::new(0),
            log_queries: AtomicU64::new(0),
            stats: RwLock::new(AnnouncementStats::new()),
            max_block_range: None,
            gas_price: DEFAULT_GAS_PRICE,
            latency: None,
        }
    }

    /// Rejects log queries spanning more than `max` blocks.
    pub fn with_max_block_range(mut self, max: u64) -> Self {
        self.max_block_range = Some(max.max(1));
        self
    }

    /// Sets the quoted gas price in wei.
    pub fn with_gas_price(mut self, gas_price: u128) -> Self {
        self.gas_price = gas_price;
        self
    }

    /// Delays every submission by `latency`.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    // ═══════════════════════════════════════════════════════════════════════
    // WRITES
    // ═══════════════════════════════════════════════════════════════════════

    /// Mines a new block holding one announcement log from `announcer`.
    ///
    /// Returns the stored log with its block number, transaction hash, and
    /// log index filled in. The announcement is stored as given; malformed
    /// logs are kept so readers see them exactly as a node would.
    pub fn announce(&self, announcer: EthAddress, announcement: Announcement) -> Announcement {
        let block = self.head.fetch_add(1, Ordering::SeqCst) + 1;
        self.announce_at(announcer, block, announcement)
    }

    /// Appends an announcement log at `block`, advancing the head if needed.
    pub fn announce_at(
        &self,
        announcer: EthAddress,
        block: u64,
        mut announcement: Announcement,
    ) -> Announcement {
        self.head.fetch_max(block, Ordering::SeqCst);

        let mut logs = self.logs.write();
        let log_index = logs
            .iter()
            .filter(|entry| entry.announcement.block_number == block)
            .count() as u64;

        announcement.block_number = block;
        announcement.log_index = log_index;
        announcement.transaction_hash = TxHash::from_array(keccak256_multi(&[
            b"announce",
            &block.to_be_bytes(),
            &log_index.to_be_bytes(),
        ]));

        debug!(block, log_index, stealth = %announcement.stealth_address, "recorded announcement");

        self.stats.write().add(&announcement);
        logs.push(LogEntry {
            announcer,
            announcement: announcement.clone(),
        });
        announcement
    }

    /// Advances the head by `blocks` empty blocks.
    pub fn mine(&self, blocks: u64) -> u64 {
        self.head.fetch_add(blocks, Ordering::SeqCst) + blocks
    }

    /// Adds native coin to `address`.
    pub fn credit_native(&self, address: EthAddress, amount: Amount) {
        let mut balance = self.native.entry(address).or_insert(0);
        *balance = balance.saturating_add(amount);
    }

    /// Adds `token` units to `owner`.
    pub fn credit_token(&self, token: EthAddress, owner: EthAddress, amount: Amount) {
        let mut balance = self.tokens.entry((token, owner)).or_insert(0);
        *balance = balance.saturating_add(amount);
    }

    /// Makes the next `count` ledger reads fail with `TransportError`.
    pub fn fail_next(&self, count: u32) {
        self.pending_failures.store(count, Ordering::SeqCst);
    }

    // ═══════════════════════════════════════════════════════════════════════
    // INSPECTION
    // ═══════════════════════════════════════════════════════════════════════

    /// Current head block.
    pub fn head(&self) -> u64 {
        self.head.load(Ordering::SeqCst)
    }

    /// Number of stored logs.
    pub fn len(&self) -> usize {
        self.logs.read().len()
    }

    /// Returns true if no logs are stored.
    pub fn is_empty(&self) -> bool {
        self.logs.read().is_empty()
    }

    /// Number of log queries served or rejected so far.
    pub fn log_queries(&self) -> u64 {
        self.log_queries.load(Ordering::SeqCst)
    }

    /// Transfers executed so far, in submission order.
    pub fn submitted(&self) -> Vec<TransactionHandle> {
        self.submitted.read().clone()
    }

    /// Statistics over all stored logs.
    pub fn stats(&self) -> AnnouncementStats {
        self.stats.read().clone()
    }

    /// Next nonce for `sender`.
    pub fn nonce(&self, sender: &EthAddress) -> u64 {
        self.nonces.get(sender).map(|n| *n).unwrap_or(0)
    }

    fn take_failure(&self) -> Result<()> {
        let injected = self
            .pending_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if injected {
            warn!("injected transport failure");
            return Err(PaystreamError::TransportError(
                "connection reset by peer".into(),
            ));
        }
        Ok(())
    }

    fn native_of(&self, address: &EthAddress) -> Amount {
        self.native.get(address).map(|b| *b).unwrap_or(0)
    }

    fn token_of(&self, token: &EthAddress, owner: &EthAddress) -> Amount {
        self.tokens.get(&(*token, *owner)).map(|b| *b).unwrap_or(0)
    }

    fn debit_native(&self, address: EthAddress, amount: Amount) {
        let mut balance = self.native.entry(address).or_insert(0);
        *balance = balance.saturating_sub(amount);
    }

    fn debit_token(&self, token: EthAddress, owner: EthAddress, amount: Amount) {
        let mut balance = self.tokens.entry((token, owner)).or_insert(0);
        *balance = balance.saturating_sub(amount);
    }
}

impl Default for MemoryLedger {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LedgerReader for MemoryLedger {
    async fn block_number(&self) -> Result<u64> {
        self.take_failure()?;
        Ok(self.head())
    }

    #[instrument(skip(self), fields(range = %range))]
    async fn announcements(
        &self,
        announcer: EthAddress,
        range: BlockRange,
        scheme_id: Option<u64>,
    ) -> Result<Vec<Announcement>> {
        self.log_queries.fetch_add(1, Ordering::SeqCst);
        self.take_failure()?;

        if let Some(max) = self.max_block_range {
            if range.len() > max {
                return Err(PaystreamError::RangeTooLarge {
                    from_block: range.from,
                    to_block: range.to,
                });
            }
        }

        let found: Vec<Announcement> = self
            .logs
            .read()
            .iter()
            .filter(|entry| entry.announcer == announcer)
            .filter(|entry| range.contains(entry.announcement.block_number))
            .filter(|entry| scheme_id.map_or(true, |id| entry.announcement.scheme_id == id))
            .map(|entry| entry.announcement.clone())
            .collect();

        debug!(count = found.len(), "served log query");
        Ok(found)
    }

    async fn native_balance(&self, address: EthAddress) -> Result<Amount> {
        self.take_failure()?;
        Ok(self.native_of(&address))
    }

    async fn token_balance(&self, token: EthAddress, owner: EthAddress) -> Result<Amount> {
        self.take_failure()?;
        Ok(self.token_of(&token, &owner))
    }
}

#[async_trait]
impl TransactionSubmitter for MemoryLedger {
    async fn estimate_fee(&self, request: &TransferRequest) -> Result<FeeQuote> {
        let gas_limit = match request.asset {
            Asset::Native => NATIVE_TRANSFER_GAS,
            Asset::Token(_) => ERC20_TRANSFER_GAS,
        };
        Ok(FeeQuote::new(gas_limit, self.gas_price))
    }

    #[instrument(skip(self, key, request), fields(from = %request.from, asset = %request.asset))]
    async fn submit(
        &self,
        key: &SecretScalar,
        request: &TransferRequest,
        fee: FeeQuote,
    ) -> Result<TransactionHandle> {
        if derive_eth_address(&key.public_point()) != request.from {
            return Err(PaystreamError::InvalidKeyMaterial(
                "signing key does not control the sender".into(),
            ));
        }

        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }

        let gas_cost = fee.total();
        let native = self.native_of(&request.from);

        match request.asset {
            Asset::Native => {
                let required = request.amount.saturating_add(gas_cost);
                if native < required {
                    return Err(PaystreamError::InsufficientGas {
                        required,
                        available: native,
                    });
                }
                self.debit_native(request.from, required);
                self.credit_native(request.to, request.amount);
            }
            Asset::Token(token) => {
                if native < gas_cost {
                    return Err(PaystreamError::InsufficientGas {
                        required: gas_cost,
                        available: native,
                    });
                }
                let held = self.token_of(&token, &request.from);
                if held < request.amount {
                    return Err(PaystreamError::ValidationError(format!(
                        "transfer amount {} exceeds token balance {}",
                        request.amount, held
                    )));
                }
                self.debit_native(request.from, gas_cost);
                self.debit_token(token, request.from, request.amount);
                self.credit_token(token, request.to, request.amount);
            }
        }

        let nonce = {
            let mut next = self.nonces.entry(request.from).or_insert(0);
            let current = *next;
            *next += 1;
            current
        };

        let tx_hash = TxHash::from_array(keccak256_multi(&[
            b"transfer",
            request.from.as_bytes(),
            &nonce.to_be_bytes(),
        ]));

        let handle = TransactionHandle {
            tx_hash,
            from: request.from,
            to: request.to,
            asset: request.asset,
            amount: request.amount,
            fee,
        };

        debug!(tx = %tx_hash, nonce, amount = request.amount, "executed transfer");
        self.submitted.write().push(handle.clone());
        Ok(handle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use paystream_core::types::AnnouncementBuilder;
    use tokio_test::{assert_err, assert_ok, block_on};

    fn announcer() -> EthAddress {
        EthAddress::from_array([0x55; 20])
    }

    fn make_announcement(tag: u8, scheme_id: u64) -> Announcement {
        AnnouncementBuilder::new()
            .scheme_id(scheme_id)
            .stealth_address(EthAddress::from_array([tag.max(1); 20]))
            .ephemeral_pub_key(vec![0x02; 33])
            .metadata(vec![tag])
            .build()
            .unwrap()
    }

    fn key() -> SecretScalar {
        SecretScalar::from_bytes(&[0x11; 32]).unwrap()
    }

    #[tokio::test]
    async fn test_announce_assigns_positions() {
        let ledger = MemoryLedger::new();

        let a = ledger.announce(announcer(), make_announcement(1, 1));
        let b = ledger.announce(announcer(), make_announcement(2, 1));
        let c = ledger.announce_at(announcer(), 2, make_announcement(3, 1));

        assert_eq!((a.block_number, a.log_index), (1, 0));
        assert_eq!((b.block_number, b.log_index), (2, 0));
        assert_eq!((c.block_number, c.log_index), (2, 1));
        assert_ne!(b.transaction_hash, c.transaction_hash);
        assert_eq!(ledger.block_number().await.unwrap(), 2);
        assert_eq!(ledger.len(), 3);
    }

    #[tokio::test]
    async fn test_query_filters_range_announcer_and_scheme() {
        let ledger = MemoryLedger::new();
        ledger.announce(announcer(), make_announcement(1, 1));
        ledger.announce(announcer(), make_announcement(2, 2));
        ledger.announce(EthAddress::from_array([0x66; 20]), make_announcement(3, 1));
        ledger.announce(announcer(), make_announcement(4, 1));

        let all = ledger
            .announcements(announcer(), BlockRange::new(1, 4).unwrap(), None)
            .await
            .unwrap();
        assert_eq!(all.len(), 3);

        let scheme_one = ledger
            .announcements(announcer(), BlockRange::new(1, 4).unwrap(), Some(1))
            .await
            .unwrap();
        assert_eq!(scheme_one.len(), 2);

        let early = ledger
            .announcements(announcer(), BlockRange::new(1, 2).unwrap(), None)
            .await
            .unwrap();
        assert_eq!(early.len(), 2);
        assert_eq!(ledger.stats().unsupported_scheme_count, 1);
    }

    #[tokio::test]
    async fn test_range_limit() {
        let ledger = MemoryLedger::new().with_max_block_range(10);

        let err = ledger
            .announcements(announcer(), BlockRange::new(0, 10).unwrap(), None)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            PaystreamError::RangeTooLarge {
                from_block: 0,
                to_block: 10
            }
        ));

        assert!(ledger
            .announcements(announcer(), BlockRange::new(0, 9).unwrap(), None)
            .await
            .is_ok());
        assert_eq!(ledger.log_queries(), 2);
    }

    #[test]
    fn test_injected_failures() {
        let ledger = MemoryLedger::new();
        ledger.fail_next(2);

        assert!(matches!(
            block_on(ledger.block_number()),
            Err(PaystreamError::TransportError(_))
        ));
        assert_err!(block_on(ledger.native_balance(announcer())));
        assert_eq!(assert_ok!(block_on(ledger.block_number())), 0);
    }

    #[tokio::test]
    async fn test_native_transfer() {
        let ledger = MemoryLedger::new().with_gas_price(1);
        let from = derive_eth_address(&key().public_point());
        let to = EthAddress::from_array([0x77; 20]);
        ledger.credit_native(from, 100_000);

        let request = TransferRequest {
            from,
            to,
            asset: Asset::Native,
            amount: 79_000,
        };
        let fee = ledger.estimate_fee(&request).await.unwrap();
        assert_eq!(fee.gas_limit, NATIVE_TRANSFER_GAS);

        let handle = ledger.submit(&key(), &request, fee).await.unwrap();
        assert_eq!(handle.amount, 79_000);
        assert_eq!(ledger.native_balance(from).await.unwrap(), 0);
        assert_eq!(ledger.native_balance(to).await.unwrap(), 79_000);
        assert_eq!(ledger.nonce(&from), 1);
        assert_eq!(ledger.submitted().len(), 1);
    }

    #[tokio::test]
    async fn test_native_transfer_insufficient_gas() {
        let ledger = MemoryLedger::new().with_gas_price(1);
        let from = derive_eth_address(&key().public_point());
        ledger.credit_native(from, 21_000);

        let request = TransferRequest {
            from,
            to: announcer(),
            asset: Asset::Native,
            amount: 1,
        };
        let fee = ledger.estimate_fee(&request).await.unwrap();
        let err = ledger.submit(&key(), &request, fee).await.unwrap_err();
        assert!(matches!(
            err,
            PaystreamError::InsufficientGas {
                required: 21_001,
                available: 21_000
            }
        ));
        assert!(ledger.submitted().is_empty());
    }

    #[tokio::test]
    async fn test_token_transfer() {
        let ledger = MemoryLedger::new().with_gas_price(2);
        let token = EthAddress::from_array([0x3c; 20]);
        let from = derive_eth_address(&key().public_point());
        let to = EthAddress::from_array([0x77; 20]);
        ledger.credit_token(token, from, 5_000_000);
        ledger.credit_native(from, 2 * ERC20_TRANSFER_GAS as u128);

        let request = TransferRequest {
            from,
            to,
            asset: Asset::Token(token),
            amount: 5_000_000,
        };
        let fee = ledger.estimate_fee(&request).await.unwrap();
        ledger.submit(&key(), &request, fee).await.unwrap();

        assert_eq!(ledger.token_balance(token, from).await.unwrap(), 0);
        assert_eq!(ledger.token_balance(token, to).await.unwrap(), 5_000_000);
        assert_eq!(ledger.native_balance(from).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_submit_rejects_wrong_key() {
        let ledger = MemoryLedger::new();
        let request = TransferRequest {
            from: EthAddress::from_array([0x01; 20]),
            to: announcer(),
            asset: Asset::Native,
            amount: 1,
        };
        let err = ledger
            .submit(&key(), &request, FeeQuote::new(21_000, 1))
            .await
            .unwrap_err();
        assert!(err.is_crypto_error());
    }
}
