//! Transfer types used when sweeping funds out of a stealth address.

use serde::{Deserialize, Serialize};

use super::{EthAddress, TxHash};

/// Amount in an asset's smallest unit (wei, or token base units).
pub type Amount = u128;

/// An asset that can be held at a stealth address.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "address")]
pub enum Asset {
    /// The chain's native coin (pays gas)
    Native,
    /// An ERC-20 token at the given contract address
    Token(EthAddress),
}

impl Asset {
    /// Returns true for the gas-paying native coin.
    pub fn is_native(&self) -> bool {
        matches!(self, Asset::Native)
    }
}

impl std::fmt::Display for Asset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Asset::Native => write!(f, "native"),
            Asset::Token(addr) => write!(f, "token:{}", addr),
        }
    }
}

/// A fully-determined transfer, ready to be signed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferRequest {
    /// Account the funds leave from (the stealth address)
    pub from: EthAddress,
    /// Destination (the recipient's payout address)
    pub to: EthAddress,
    /// What is moved
    pub asset: Asset,
    /// How much is moved
    pub amount: Amount,
}

/// Gas parameters for one transaction.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeQuote {
    /// Gas limit
    pub gas_limit: u64,
    /// Gas price in wei
    pub gas_price: u128,
}

impl FeeQuote {
    /// Creates a quote.
    pub fn new(gas_limit: u64, gas_price: u128) -> Self {
        Self {
            gas_limit,
            gas_price,
        }
    }

    /// Maximum native-coin cost of the transaction.
    pub fn total(&self) -> Amount {
        (self.gas_limit as u128).saturating_mul(self.gas_price)
    }
}

/// Handle for a submitted transaction.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionHandle {
    /// Hash of the broadcast transaction
    pub tx_hash: TxHash,
    /// Source account
    pub from: EthAddress,
    /// Destination account
    pub to: EthAddress,
    /// Asset moved
    pub asset: Asset,
    /// Amount moved
    pub amount: Amount,
    /// Fee parameters used
    pub fee: FeeQuote,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fee_total() {
        let fee = FeeQuote::new(21_000, 30_000_000_000);
        assert_eq!(fee.total(), 630_000_000_000_000);
        assert_eq!(FeeQuote::new(u64::MAX, u128::MAX).total(), u128::MAX);
    }

    #[test]
    fn test_asset_serde() {
        let token = Asset::Token(EthAddress::from_array([0xab; 20]));
        let json = serde_json::to_string(&token).unwrap();
        assert!(json.contains("\"kind\":\"token\""));
        assert_eq!(serde_json::from_str::<Asset>(&json).unwrap(), token);

        let native = serde_json::to_string(&Asset::Native).unwrap();
        assert_eq!(serde_json::from_str::<Asset>(&native).unwrap(), Asset::Native);
        assert!(Asset::Native.is_native());
    }
}
