//! RPC endpoint and contract configuration.

use serde::{Deserialize, Serialize};
use tracing::debug;

use paystream_core::constants::{
    DEFAULT_MAX_BLOCK_RANGE, DEFAULT_RPC_TIMEOUT_SECS, DEFAULT_RPC_URL, ERC5564_ANNOUNCER_BYTES,
    POLYGON_CHAIN_ID, USDC_POLYGON_BYTES,
};
use paystream_core::error::{PaystreamError, Result};
use paystream_core::types::{Asset, EthAddress};
use paystream_scanner::ScannerConfig;

/// Environment variable names read by [`RpcConfig::from_env`].
pub mod env {
    /// JSON-RPC endpoint URL
    pub const RPC_URL: &str = "PAYSTREAM_RPC_URL";
    /// EIP-155 chain id
    pub const CHAIN_ID: &str = "PAYSTREAM_CHAIN_ID";
    /// ERC-5564 announcer contract
    pub const ANNOUNCER_ADDRESS: &str = "PAYSTREAM_ANNOUNCER_ADDRESS";
    /// Settlement token contract
    pub const TOKEN_ADDRESS: &str = "PAYSTREAM_TOKEN_ADDRESS";
    /// Merchant registry contract
    pub const MERCHANT_REGISTRY: &str = "PAYSTREAM_MERCHANT_REGISTRY";
    /// Invoice registry contract
    pub const INVOICE_REGISTRY: &str = "PAYSTREAM_INVOICE_REGISTRY";
    /// First block worth scanning
    pub const START_BLOCK: &str = "PAYSTREAM_START_BLOCK";
    /// Widest `eth_getLogs` range
    pub const MAX_BLOCK_RANGE: &str = "PAYSTREAM_MAX_BLOCK_RANGE";
    /// Request timeout in seconds
    pub const RPC_TIMEOUT_SECS: &str = "PAYSTREAM_RPC_TIMEOUT_SECS";
}

/// Connection and contract settings for one EVM chain.
///
/// Defaults target Polygon PoS.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RpcConfig {
    /// JSON-RPC endpoint URL
    pub rpc_url: String,
    /// EIP-155 chain id used when signing
    pub chain_id: u64,
    /// ERC-5564 announcer contract
    pub announcer: EthAddress,
    /// Settlement token (ERC-20)
    pub token: EthAddress,
    /// Merchant registry contract, if deployed
    pub merchant_registry: Option<EthAddress>,
    /// Invoice registry contract, if deployed
    pub invoice_registry: Option<EthAddress>,
    /// First block worth scanning (announcer deployment)
    pub start_block: u64,
    /// Widest block range the endpoint accepts for `eth_getLogs`
    pub max_block_range: u64,
    /// Request timeout in seconds
    pub timeout_seconds: u64,
}

impl Default for RpcConfig {
    fn default() -> Self {
        Self {
            rpc_url: DEFAULT_RPC_URL.into(),
            chain_id: POLYGON_CHAIN_ID,
            announcer: EthAddress::from_array(ERC5564_ANNOUNCER_BYTES),
            token: EthAddress::from_array(USDC_POLYGON_BYTES),
            merchant_registry: None,
            invoice_registry: None,
            start_block: 0,
            max_block_range: DEFAULT_MAX_BLOCK_RANGE,
            timeout_seconds: DEFAULT_RPC_TIMEOUT_SECS,
        }
    }
}

impl RpcConfig {
    /// Creates a configuration for the given endpoint, other fields default.
    pub fn new(rpc_url: impl Into<String>) -> Self {
        Self {
            rpc_url: rpc_url.into(),
            ..Default::default()
        }
    }

    /// Loads `.env` (if present) and reads `PAYSTREAM_*` variables over the defaults.
    pub fn from_env() -> Result<Self> {
        if let Ok(path) = dotenvy::dotenv() {
            debug!(path = %path.display(), "loaded .env");
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds a configuration from an arbitrary variable source.
    ///
    /// Unset or empty variables keep their default.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let mut config = Self::default();

        if let Some(url) = get(env::RPC_URL) {
            config.rpc_url = url.trim().to_string();
        }
        if let Some(v) = get(env::CHAIN_ID) {
            config.chain_id = parse_number(env::CHAIN_ID, &v)?;
        }
        if let Some(v) = get(env::ANNOUNCER_ADDRESS) {
            config.announcer = parse_address(env::ANNOUNCER_ADDRESS, &v)?;
        }
        if let Some(v) = get(env::TOKEN_ADDRESS) {
            config.token = parse_address(env::TOKEN_ADDRESS, &v)?;
        }
        if let Some(v) = get(env::MERCHANT_REGISTRY) {
            config.merchant_registry = Some(parse_address(env::MERCHANT_REGISTRY, &v)?);
        }
        if let Some(v) = get(env::INVOICE_REGISTRY) {
            config.invoice_registry = Some(parse_address(env::INVOICE_REGISTRY, &v)?);
        }
        if let Some(v) = get(env::START_BLOCK) {
            config.start_block = parse_number(env::START_BLOCK, &v)?;
        }
        if let Some(v) = get(env::MAX_BLOCK_RANGE) {
            config.max_block_range = parse_number(env::MAX_BLOCK_RANGE, &v)?;
        }
        if let Some(v) = get(env::RPC_TIMEOUT_SECS) {
            config.timeout_seconds = parse_number(env::RPC_TIMEOUT_SECS, &v)?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Sets the chain id.
    pub fn chain_id(mut self, chain_id: u64) -> Self {
        self.chain_id = chain_id;
        self
    }

    /// Sets the announcer contract.
    pub fn announcer(mut self, announcer: EthAddress) -> Self {
        self.announcer = announcer;
        self
    }

    /// Sets the settlement token.
    pub fn token(mut self, token: EthAddress) -> Self {
        self.token = token;
        self
    }

    /// Sets both registry contracts.
    pub fn registries(mut self, merchant: EthAddress, invoice: EthAddress) -> Self {
        self.merchant_registry = Some(merchant);
        self.invoice_registry = Some(invoice);
        self
    }

    /// Sets the widest `eth_getLogs` range.
    pub fn max_block_range(mut self, blocks: u64) -> Self {
        self.max_block_range = blocks;
        self
    }

    /// Sets the request timeout.
    pub fn timeout_seconds(mut self, seconds: u64) -> Self {
        self.timeout_seconds = seconds;
        self
    }

    /// Sets the first block worth scanning.
    pub fn start_block(mut self, block: u64) -> Self {
        self.start_block = block;
        self
    }

    /// Scanner settings for this chain: announcer, log-range limit, start
    /// block, and balances priced in the settlement token.
    pub fn scanner_config(&self) -> ScannerConfig {
        ScannerConfig::new()
            .announcer(self.announcer)
            .start_block(self.start_block)
            .max_block_range(self.max_block_range)
            .balance_asset(Asset::Token(self.token))
    }

    /// Checks the URL and limits.
    pub fn validate(&self) -> Result<()> {
        let url = url::Url::parse(&self.rpc_url)
            .map_err(|e| PaystreamError::ConfigError(format!("invalid RPC URL: {}", e)))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(PaystreamError::ConfigError(format!(
                "RPC URL must be http(s), got {}",
                url.scheme()
            )));
        }
        if self.chain_id == 0 {
            return Err(PaystreamError::ConfigError("chain id must be non-zero".into()));
        }
        if self.max_block_range == 0 {
            return Err(PaystreamError::ConfigError(
                "max block range must be at least 1".into(),
            ));
        }
        if self.timeout_seconds == 0 {
            return Err(PaystreamError::ConfigError("timeout must be non-zero".into()));
        }
        Ok(())
    }
}

fn parse_number(key: &str, value: &str) -> Result<u64> {
    value
        .trim()
        .parse()
        .map_err(|e| PaystreamError::ConfigError(format!("{}: {}", key, e)))
}

fn parse_address(key: &str, value: &str) -> Result<EthAddress> {
    EthAddress::from_hex(value.trim())
        .map_err(|e| PaystreamError::ConfigError(format!("{}: {}", key, e)))
}
