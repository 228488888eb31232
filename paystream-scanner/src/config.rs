//! Scanner configuration.

use std::time::Duration;

use paystream_core::constants::{
    DEFAULT_MAX_BLOCK_RANGE, DEFAULT_MAX_RETRIES, DEFAULT_RETRY_BACKOFF_MS,
    DEFAULT_SCAN_CONCURRENCY, ERC5564_ANNOUNCER_BYTES,
};
use paystream_core::error::{PaystreamError, Result};
use paystream_core::types::{Asset, EthAddress};

/// Scanner configuration.
#[derive(Clone, Debug)]
pub struct ScannerConfig {
    /// Contract whose `Announcement` events are scanned
    pub announcer: EthAddress,
    /// First block a fresh scanner resumes from (announcer deployment)
    pub start_block: u64,
    /// Widest block range requested in one log query
    pub max_block_range: u64,
    /// Sub-range queries in flight at once
    pub concurrency: usize,
    /// Retries for a transport failure on one sub-range
    pub max_retries: u32,
    /// Backoff before the first retry; doubles on each further retry
    pub retry_backoff: Duration,
    /// Restrict the log query to one scheme id (None = every scheme)
    pub scheme_filter: Option<u64>,
    /// Asset whose balance is filled into each result (None = skip balances)
    pub balance_asset: Option<Asset>,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            announcer: EthAddress::from_array(ERC5564_ANNOUNCER_BYTES),
            start_block: 0,
            max_block_range: DEFAULT_MAX_BLOCK_RANGE,
            concurrency: DEFAULT_SCAN_CONCURRENCY,
            max_retries: DEFAULT_MAX_RETRIES,
            retry_backoff: Duration::from_millis(DEFAULT_RETRY_BACKOFF_MS),
            scheme_filter: None,
            balance_asset: Some(Asset::Native),
        }
    }
}

impl ScannerConfig {
    /// Creates a new default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the announcer contract.
    pub fn announcer(mut self, announcer: EthAddress) -> Self {
        self.announcer = announcer;
        self
    }

    /// Sets the block a fresh scanner starts from.
    pub fn start_block(mut self, block: u64) -> Self {
        self.start_block = block;
        self
    }

    /// Sets the widest block range per log query.
    pub fn max_block_range(mut self, blocks: u64) -> Self {
        self.max_block_range = blocks;
        self
    }

    /// Sets the number of concurrent sub-range queries.
    pub fn concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    /// Sets the retry policy for transport failures.
    pub fn retries(mut self, max_retries: u32, backoff: Duration) -> Self {
        self.max_retries = max_retries;
        self.retry_backoff = backoff;
        self
    }

    /// Only fetch announcements of `scheme_id`.
    pub fn scheme_filter(mut self, scheme_id: u64) -> Self {
        self.scheme_filter = Some(scheme_id);
        self
    }

    /// Fill balances of `asset` into discovered results.
    pub fn balance_asset(mut self, asset: Asset) -> Self {
        self.balance_asset = Some(asset);
        self
    }

    /// Leave result balances at zero.
    pub fn without_balances(mut self) -> Self {
        self.balance_asset = None;
        self
    }

    /// Rejects limits that would stall the scan.
    pub fn validate(&self) -> Result<()> {
        if self.max_block_range == 0 {
            return Err(PaystreamError::ConfigError(
                "max_block_range must be at least 1".into(),
            ));
        }
        if self.concurrency == 0 {
            return Err(PaystreamError::ConfigError(
                "concurrency must be at least 1".into(),
            ));
        }
        Ok(())
    }
}
