//! Moving funds out of recovered stealth addresses.
//!
//! The coordinator is thin: it reads the balance, quotes gas, and hands the
//! transfer to a [`TransactionSubmitter`] signed with the recovered one-time
//! key. At most one sweep per stealth address is in flight at any time.

use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tracing::{debug, info, instrument, warn};

use paystream_core::error::{PaystreamError, Result};
use paystream_core::traits::{LedgerReader, TransactionSubmitter};
use paystream_core::types::{
    Amount, Asset, EthAddress, FeeQuote, ScanResult, TransactionHandle, TransferRequest,
};
use paystream_crypto::derive_eth_address;

/// Sweep settings.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SweepConfig {
    /// Asset moved out of each stealth address
    pub asset: Asset,
    /// Overrides the submitter's gas limit estimate
    pub gas_limit: Option<u64>,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            asset: Asset::Native,
            gas_limit: None,
        }
    }
}

impl SweepConfig {
    /// Sweeps `asset` with estimated gas.
    pub fn new(asset: Asset) -> Self {
        Self {
            asset,
            gas_limit: None,
        }
    }

    /// Pins the gas limit.
    pub fn with_gas_limit(mut self, gas_limit: u64) -> Self {
        self.gas_limit = Some(gas_limit);
        self
    }
}

/// Outcome of one sweep in a batch.
#[derive(Debug)]
pub struct SweepOutcome {
    /// The stealth address that was swept
    pub stealth_address: EthAddress,
    /// The submitted transaction, or why it was not submitted
    pub result: Result<TransactionHandle>,
}

impl SweepOutcome {
    /// Returns true if a transaction was submitted.
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }
}

/// Releases the in-flight slot for an address when dropped.
struct InFlightGuard<'a> {
    slots: &'a DashMap<EthAddress, ()>,
    address: EthAddress,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.slots.remove(&self.address);
    }
}

/// Submits sweeps from recovered stealth addresses to a payout address.
pub struct SweepCoordinator {
    ledger: Arc<dyn LedgerReader>,
    submitter: Arc<dyn TransactionSubmitter>,
    config: SweepConfig,
    in_flight: DashMap<EthAddress, ()>,
}

impl SweepCoordinator {
    /// Creates a coordinator.
    pub fn new(
        ledger: Arc<dyn LedgerReader>,
        submitter: Arc<dyn TransactionSubmitter>,
        config: SweepConfig,
    ) -> Self {
        Self {
            ledger,
            submitter,
            config,
            in_flight: DashMap::new(),
        }
    }

    /// The sweep settings.
    pub fn config(&self) -> &SweepConfig {
        &self.config
    }

    /// Returns true while a sweep of `address` is being submitted.
    pub fn is_in_flight(&self, address: &EthAddress) -> bool {
        self.in_flight.contains_key(address)
    }

    /// Transfers the full balance of the stealth address in `result` to `payout`.
    ///
    /// For the native coin the transferred amount is the balance minus the
    /// gas cost. For a token the whole token balance moves and the gas is
    /// paid from the native balance of the stealth address.
    ///
    /// # Errors
    ///
    /// - `SweepInProgress` if another sweep of the same address has not finished
    /// - `NothingToSweep` if the balance is zero
    /// - `InsufficientGas` if the native balance cannot pay for the transaction
    /// - `InvalidKeyMaterial` if the recovered key does not control the address
    #[instrument(skip(self, result), fields(stealth = %result.stealth_address(), asset = %self.config.asset))]
    pub async fn sweep(&self, result: &ScanResult, payout: EthAddress) -> Result<TransactionHandle> {
        let stealth = result.stealth_address();

        if payout.is_zero() {
            return Err(PaystreamError::InvalidAddress(
                "payout address is the zero address".into(),
            ));
        }

        if derive_eth_address(&result.recovered_private_key.public_point()) != stealth {
            return Err(PaystreamError::InvalidKeyMaterial(
                "recovered key does not control the stealth address".into(),
            ));
        }

        let _guard = self.acquire(stealth)?;

        let native = self.ledger.native_balance(stealth).await?;
        let mut request = TransferRequest {
            from: stealth,
            to: payout,
            asset: self.config.asset,
            amount: 0,
        };

        let fee = match self.config.asset {
            Asset::Native => {
                if native == 0 {
                    return Err(PaystreamError::NothingToSweep(stealth.to_string()));
                }
                request.amount = native;
                let fee = self.quote(&request).await?;
                request.amount = Self::after_gas(native, &fee)?;
                fee
            }
            Asset::Token(token) => {
                let held = self.ledger.token_balance(token, stealth).await?;
                if held == 0 {
                    return Err(PaystreamError::NothingToSweep(stealth.to_string()));
                }
                request.amount = held;
                let fee = self.quote(&request).await?;
                if native < fee.total() {
                    return Err(PaystreamError::InsufficientGas {
                        required: fee.total(),
                        available: native,
                    });
                }
                fee
            }
        };

        debug!(amount = request.amount, gas_limit = fee.gas_limit, "submitting sweep");
        let handle = self
            .submitter
            .submit(&result.recovered_private_key, &request, fee)
            .await?;

        info!(tx = %handle.tx_hash, amount = handle.amount, "sweep submitted");
        Ok(handle)
    }

    /// Sweeps every result in order, one submission at a time.
    ///
    /// A failure on one address does not stop the batch.
    #[instrument(skip(self, results), fields(count = results.len()))]
    pub async fn sweep_all(&self, results: &[ScanResult], payout: EthAddress) -> Vec<SweepOutcome> {
        let mut outcomes = Vec::with_capacity(results.len());

        for result in results {
            let outcome = self.sweep(result, payout).await;
            if let Err(e) = &outcome {
                warn!(stealth = %result.stealth_address(), error = %e, "sweep failed");
            }
            outcomes.push(SweepOutcome {
                stealth_address: result.stealth_address(),
                result: outcome,
            });
        }

        let swept = outcomes.iter().filter(|o| o.is_success()).count();
        info!(swept, failed = outcomes.len() - swept, "batch sweep complete");
        outcomes
    }

    fn acquire(&self, address: EthAddress) -> Result<InFlightGuard<'_>> {
        match self.in_flight.entry(address) {
            Entry::Occupied(_) => Err(PaystreamError::SweepInProgress(address.to_string())),
            Entry::Vacant(slot) => {
                slot.insert(());
                Ok(InFlightGuard {
                    slots: &self.in_flight,
                    address,
                })
            }
        }
    }

    async fn quote(&self, request: &TransferRequest) -> Result<FeeQuote> {
        let mut fee = self.submitter.estimate_fee(request).await?;
        if let Some(gas_limit) = self.config.gas_limit {
            fee.gas_limit = gas_limit;
        }
        Ok(fee)
    }

    fn after_gas(balance: Amount, fee: &FeeQuote) -> Result<Amount> {
        let cost = fee.total();
        if balance <= cost {
            return Err(PaystreamError::InsufficientGas {
                required: cost,
                available: balance,
            });
        }
        Ok(balance - cost)
    }
}
