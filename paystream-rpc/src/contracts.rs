//! Contract bindings: ERC-5564 announcer, ERC-20, merchant and invoice registries.
//!
//! Reads go through `eth_call`. Writes are returned as [`ContractCall`]s for
//! the user's wallet to sign and send; this crate never holds a merchant's
//! wallet key.

use std::sync::Arc;

use alloy::primitives::{Address, Bytes, FixedBytes, U256};
use alloy::sol_types::SolCall;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use paystream_core::error::{PaystreamError, Result};
use paystream_core::types::{Amount, Announcement, EthAddress, MetaAddress, TxHash};

use crate::client::JsonRpcClient;
use crate::config::RpcConfig;

/// Solidity interfaces.
#[allow(missing_docs)]
pub mod abi {
    alloy::sol! {
        interface IERC5564Announcer {
            event Announcement(
                uint256 indexed schemeId,
                address indexed stealthAddress,
                address indexed caller,
                bytes ephemeralPubKey,
                bytes metadata
            );

            function announce(
                uint256 schemeId,
                address stealthAddress,
                bytes ephemeralPubKey,
                bytes metadata
            ) external;
        }

        interface IERC20 {
            function balanceOf(address owner) external view returns (uint256);
            function transfer(address to, uint256 amount) external returns (bool);
        }

        interface IMerchantRegistry {
            struct Merchant {
                uint256 id;
                string username;
                address payoutAddress;
                bytes stealthMetaAddress;
                bool active;
                uint256 registeredAt;
            }

            function registerMerchant(
                string username,
                address payoutAddress,
                bytes stealthMetaAddress
            ) external returns (uint256 merchantId);
            function updateMerchant(address newPayoutAddress, bytes newStealthMetaAddress) external;
            function resolve(string username)
                external
                view
                returns (uint256 merchantId, address payoutAddress, bytes stealthMetaAddress);
            function getMerchant(uint256 merchantId) external view returns (Merchant memory);
            function getMerchantIdByAddress(address addr) external view returns (uint256);
            function isUsernameAvailable(string username) external view returns (bool);
        }

        interface IInvoiceRegistry {
            struct Invoice {
                uint256 id;
                uint256 merchantId;
                address token;
                uint256 amount;
                uint256 expiry;
                uint8 status;
                string encryptedDetailsPointer;
                uint256 createdAt;
                address payer;
                uint256 paidAmount;
                bytes32 paymentTxHash;
            }

            function createInvoice(
                uint256 merchantId,
                address token,
                uint256 amount,
                uint256 expiry,
                string encryptedDetailsPointer
            ) external returns (uint256 invoiceId);
            function markPaid(
                uint256 invoiceId,
                bytes32 paymentTxHash,
                address payer,
                uint256 paidAmount
            ) external;
            function getInvoice(uint256 invoiceId) external view returns (Invoice memory);
            function getMerchantInvoices(uint256 merchantId) external view returns (uint256[] memory);
            function getInvoiceCount() external view returns (uint256);
        }
    }
}

use abi::{IERC5564Announcer, IInvoiceRegistry, IMerchantRegistry};

// ═══════════════════════════════════════════════════════════════════════════════
// CONVERSIONS
// ═══════════════════════════════════════════════════════════════════════════════

pub(crate) fn to_alloy(address: &EthAddress) -> Address {
    Address::from(address.to_array())
}

pub(crate) fn from_alloy(address: Address) -> EthAddress {
    EthAddress::from_array(address.0 .0)
}

pub(crate) fn u256_to_amount(value: U256) -> Result<Amount> {
    u128::try_from(value)
        .map_err(|_| PaystreamError::AbiError(format!("value overflows u128: {}", value)))
}

pub(crate) fn u256_to_u64(value: U256) -> Result<u64> {
    u64::try_from(value)
        .map_err(|_| PaystreamError::AbiError(format!("value overflows u64: {}", value)))
}

fn optional_address(address: Address) -> Option<EthAddress> {
    let address = from_alloy(address);
    (!address.is_zero()).then_some(address)
}

fn abi_error(e: alloy::sol_types::Error) -> PaystreamError {
    PaystreamError::AbiError(e.to_string())
}

fn is_revert(err: &PaystreamError) -> bool {
    matches!(err, PaystreamError::RpcError { code, message }
        if *code == 3 || message.to_ascii_lowercase().contains("revert"))
}

// ═══════════════════════════════════════════════════════════════════════════════
// TYPES
// ═══════════════════════════════════════════════════════════════════════════════

/// An unsigned contract call for the user's wallet to send.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractCall {
    /// Contract address
    pub to: EthAddress,
    /// ABI-encoded calldata
    #[serde(with = "hex")]
    pub data: Vec<u8>,
}

/// Result of resolving a merchant username.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedMerchant {
    /// Registry id
    pub merchant_id: u64,
    /// Where swept funds go
    pub payout_address: EthAddress,
    /// Published stealth meta-address
    pub meta_address: MetaAddress,
}

/// A full merchant record.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Merchant {
    /// Registry id
    pub id: u64,
    /// Registered username
    pub username: String,
    /// Where swept funds go
    pub payout_address: EthAddress,
    /// Published stealth meta-address
    pub meta_address: MetaAddress,
    /// Whether the merchant is active
    pub active: bool,
    /// Registration time (unix seconds)
    pub registered_at: u64,
}

impl TryFrom<IMerchantRegistry::Merchant> for Merchant {
    type Error = PaystreamError;

    fn try_from(raw: IMerchantRegistry::Merchant) -> Result<Self> {
        Ok(Self {
            id: u256_to_u64(raw.id)?,
            username: raw.username,
            payout_address: from_alloy(raw.payoutAddress),
            meta_address: MetaAddress::from_bytes(&raw.stealthMetaAddress)?,
            active: raw.active,
            registered_at: u256_to_u64(raw.registeredAt)?,
        })
    }
}

/// Invoice lifecycle state.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvoiceStatus {
    /// Awaiting payment
    Pending,
    /// Marked paid by the merchant
    Paid,
    /// A status code this client does not know
    Unknown(u8),
}

impl From<u8> for InvoiceStatus {
    fn from(code: u8) -> Self {
        match code {
            0 => InvoiceStatus::Pending,
            1 => InvoiceStatus::Paid,
            other => InvoiceStatus::Unknown(other),
        }
    }
}

/// An invoice as stored on-chain.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Invoice {
    /// Invoice id
    pub id: u64,
    /// Issuing merchant
    pub merchant_id: u64,
    /// Settlement token
    pub token: EthAddress,
    /// Amount due in token base units
    pub amount: Amount,
    /// Expiry (unix seconds)
    pub expiry: u64,
    /// Lifecycle state
    pub status: InvoiceStatus,
    /// Off-chain pointer to the encrypted invoice details
    pub encrypted_details_pointer: String,
    /// Creation time (unix seconds)
    pub created_at: u64,
    /// Payer, once paid
    pub payer: Option<EthAddress>,
    /// Amount received
    pub paid_amount: Amount,
    /// Payment transaction, once paid
    pub payment_tx_hash: Option<TxHash>,
}

impl Invoice {
    /// Returns true once the invoice is marked paid.
    pub fn is_paid(&self) -> bool {
        self.status == InvoiceStatus::Paid
    }

    /// Returns true if still pending at `now` (unix seconds) past its expiry.
    pub fn is_expired(&self, now: u64) -> bool {
        self.status == InvoiceStatus::Pending && now > self.expiry
    }
}

impl TryFrom<IInvoiceRegistry::Invoice> for Invoice {
    type Error = PaystreamError;

    fn try_from(raw: IInvoiceRegistry::Invoice) -> Result<Self> {
        Ok(Self {
            id: u256_to_u64(raw.id)?,
            merchant_id: u256_to_u64(raw.merchantId)?,
            token: from_alloy(raw.token),
            amount: u256_to_amount(raw.amount)?,
            expiry: u256_to_u64(raw.expiry)?,
            status: InvoiceStatus::from(raw.status),
            encrypted_details_pointer: raw.encryptedDetailsPointer,
            created_at: u256_to_u64(raw.createdAt)?,
            payer: optional_address(raw.payer),
            paid_amount: u256_to_amount(raw.paidAmount)?,
            payment_tx_hash: (raw.paymentTxHash != FixedBytes::ZERO)
                .then(|| TxHash::from_array(raw.paymentTxHash.0)),
        })
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// CALLDATA BUILDERS
// ═══════════════════════════════════════════════════════════════════════════════

/// `announce(schemeId, stealthAddress, ephemeralPubKey, metadata)` on the announcer.
///
/// Published by the payer alongside the transfer to the stealth address.
pub fn announce_call(announcer: EthAddress, announcement: &Announcement) -> ContractCall {
    let call = IERC5564Announcer::announceCall {
        schemeId: U256::from(announcement.scheme_id),
        stealthAddress: to_alloy(&announcement.stealth_address),
        ephemeralPubKey: Bytes::copy_from_slice(&announcement.ephemeral_pub_key),
        metadata: Bytes::copy_from_slice(&announcement.metadata),
    };
    ContractCall {
        to: announcer,
        data: call.abi_encode(),
    }
}

/// ERC-20 `transfer(to, amount)` calldata.
pub fn erc20_transfer_data(to: &EthAddress, amount: Amount) -> Vec<u8> {
    abi::IERC20::transferCall {
        to: to_alloy(to),
        amount: U256::from(amount),
    }
    .abi_encode()
}

fn normalize_username(username: &str) -> Result<String> {
    let username = username.trim();
    if username.is_empty() {
        return Err(PaystreamError::ValidationError("username is empty".into()));
    }
    Ok(username.to_string())
}

// ═══════════════════════════════════════════════════════════════════════════════
// REGISTRY CLIENT
// ═══════════════════════════════════════════════════════════════════════════════

/// Reads the merchant and invoice registries and prepares writes to them.
pub struct RegistryClient {
    client: Arc<JsonRpcClient>,
    merchant_registry: Option<EthAddress>,
    invoice_registry: Option<EthAddress>,
}

impl RegistryClient {
    /// Creates a client for the registries named in `config`.
    pub fn new(client: Arc<JsonRpcClient>, config: &RpcConfig) -> Self {
        Self {
            client,
            merchant_registry: config.merchant_registry,
            invoice_registry: config.invoice_registry,
        }
    }

    fn merchant_registry(&self) -> Result<EthAddress> {
        self.merchant_registry
            .ok_or_else(|| PaystreamError::ConfigError("merchant registry not configured".into()))
    }

    fn invoice_registry(&self) -> Result<EthAddress> {
        self.invoice_registry
            .ok_or_else(|| PaystreamError::ConfigError("invoice registry not configured".into()))
    }

    /// Looks up a merchant by username.
    ///
    /// Returns `None` for an unregistered username. The returned meta-address
    /// bytes are parsed and validated.
    #[instrument(skip(self))]
    pub async fn resolve(&self, username: &str) -> Result<Option<ResolvedMerchant>> {
        let call = IMerchantRegistry::resolveCall {
            username: normalize_username(username)?,
        };
        let data = match self
            .client
            .eth_call(self.merchant_registry()?, &call.abi_encode())
            .await
        {
            Ok(data) => data,
            Err(e) if is_revert(&e) => {
                debug!(error = %e, "resolve reverted");
                return Ok(None);
            }
            Err(e) => return Err(e),
        };

        let ret = IMerchantRegistry::resolveCall::abi_decode_returns(&data, true)
            .map_err(abi_error)?;
        if ret.merchantId.is_zero() {
            return Ok(None);
        }

        Ok(Some(ResolvedMerchant {
            merchant_id: u256_to_u64(ret.merchantId)?,
            payout_address: from_alloy(ret.payoutAddress),
            meta_address: MetaAddress::from_bytes(&ret.stealthMetaAddress)?,
        }))
    }

    /// Fetches a full merchant record.
    #[instrument(skip(self))]
    pub async fn merchant(&self, merchant_id: u64) -> Result<Merchant> {
        let call = IMerchantRegistry::getMerchantCall {
            merchantId: U256::from(merchant_id),
        };
        let data = self
            .client
            .eth_call(self.merchant_registry()?, &call.abi_encode())
            .await?;
        let ret = IMerchantRegistry::getMerchantCall::abi_decode_returns(&data, true)
            .map_err(abi_error)?;
        Merchant::try_from(ret._0)
    }

    /// Merchant id registered by `owner`, if any.
    #[instrument(skip(self))]
    pub async fn merchant_id_of(&self, owner: EthAddress) -> Result<Option<u64>> {
        let call = IMerchantRegistry::getMerchantIdByAddressCall {
            addr: to_alloy(&owner),
        };
        let data = self
            .client
            .eth_call(self.merchant_registry()?, &call.abi_encode())
            .await?;
        let ret = IMerchantRegistry::getMerchantIdByAddressCall::abi_decode_returns(&data, true)
            .map_err(abi_error)?;
        if ret._0.is_zero() {
            return Ok(None);
        }
        u256_to_u64(ret._0).map(Some)
    }

    /// Whether `username` can still be registered.
    #[instrument(skip(self))]
    pub async fn is_username_available(&self, username: &str) -> Result<bool> {
        let call = IMerchantRegistry::isUsernameAvailableCall {
            username: normalize_username(username)?,
        };
        let data = self
            .client
            .eth_call(self.merchant_registry()?, &call.abi_encode())
            .await?;
        let ret = IMerchantRegistry::isUsernameAvailableCall::abi_decode_returns(&data, true)
            .map_err(abi_error)?;
        Ok(ret._0)
    }

    /// Fetches an invoice.
    #[instrument(skip(self))]
    pub async fn invoice(&self, invoice_id: u64) -> Result<Invoice> {
        let call = IInvoiceRegistry::getInvoiceCall {
            invoiceId: U256::from(invoice_id),
        };
        let data = self
            .client
            .eth_call(self.invoice_registry()?, &call.abi_encode())
            .await?;
        let ret = IInvoiceRegistry::getInvoiceCall::abi_decode_returns(&data, true)
            .map_err(abi_error)?;
        Invoice::try_from(ret._0)
    }

    /// Invoice ids issued by a merchant.
    #[instrument(skip(self))]
    pub async fn merchant_invoices(&self, merchant_id: u64) -> Result<Vec<u64>> {
        let call = IInvoiceRegistry::getMerchantInvoicesCall {
            merchantId: U256::from(merchant_id),
        };
        let data = self
            .client
            .eth_call(self.invoice_registry()?, &call.abi_encode())
            .await?;
        let ret = IInvoiceRegistry::getMerchantInvoicesCall::abi_decode_returns(&data, true)
            .map_err(abi_error)?;
        ret._0.into_iter().map(u256_to_u64).collect()
    }

    /// Number of invoices ever created.
    pub async fn invoice_count(&self) -> Result<u64> {
        let call = IInvoiceRegistry::getInvoiceCountCall {};
        let data = self
            .client
            .eth_call(self.invoice_registry()?, &call.abi_encode())
            .await?;
        let ret = IInvoiceRegistry::getInvoiceCountCall::abi_decode_returns(&data, true)
            .map_err(abi_error)?;
        u256_to_u64(ret._0)
    }

    /// `registerMerchant(username, payoutAddress, stealthMetaAddress)`.
    pub fn register_merchant(
        &self,
        username: &str,
        payout_address: EthAddress,
        meta_address: &MetaAddress,
    ) -> Result<ContractCall> {
        if payout_address.is_zero() {
            return Err(PaystreamError::InvalidAddress("payout address is zero".into()));
        }
        let call = IMerchantRegistry::registerMerchantCall {
            username: normalize_username(username)?,
            payoutAddress: to_alloy(&payout_address),
            stealthMetaAddress: Bytes::copy_from_slice(&meta_address.to_bytes()),
        };
        Ok(ContractCall {
            to: self.merchant_registry()?,
            data: call.abi_encode(),
        })
    }

    /// `updateMerchant(newPayoutAddress, newStealthMetaAddress)`.
    ///
    /// Used after a key rotation to publish the new meta-address.
    pub fn update_merchant(
        &self,
        payout_address: EthAddress,
        meta_address: &MetaAddress,
    ) -> Result<ContractCall> {
        if payout_address.is_zero() {
            return Err(PaystreamError::InvalidAddress("payout address is zero".into()));
        }
        let call = IMerchantRegistry::updateMerchantCall {
            newPayoutAddress: to_alloy(&payout_address),
            newStealthMetaAddress: Bytes::copy_from_slice(&meta_address.to_bytes()),
        };
        Ok(ContractCall {
            to: self.merchant_registry()?,
            data: call.abi_encode(),
        })
    }

    /// `createInvoice(merchantId, token, amount, expiry, encryptedDetailsPointer)`.
    pub fn create_invoice(
        &self,
        merchant_id: u64,
        token: EthAddress,
        amount: Amount,
        expiry: u64,
        encrypted_details_pointer: &str,
    ) -> Result<ContractCall> {
        if amount == 0 {
            return Err(PaystreamError::ValidationError(
                "invoice amount must be non-zero".into(),
            ));
        }
        let call = IInvoiceRegistry::createInvoiceCall {
            merchantId: U256::from(merchant_id),
            token: to_alloy(&token),
            amount: U256::from(amount),
            expiry: U256::from(expiry),
            encryptedDetailsPointer: encrypted_details_pointer.to_string(),
        };
        Ok(ContractCall {
            to: self.invoice_registry()?,
            data: call.abi_encode(),
        })
    }

    /// `markPaid(invoiceId, paymentTxHash, payer, paidAmount)`.
    pub fn mark_paid(
        &self,
        invoice_id: u64,
        payment_tx_hash: TxHash,
        payer: EthAddress,
        paid_amount: Amount,
    ) -> Result<ContractCall> {
        let call = IInvoiceRegistry::markPaidCall {
            invoiceId: U256::from(invoice_id),
            paymentTxHash: FixedBytes::from_slice(payment_tx_hash.as_bytes()),
            payer: to_alloy(&payer),
            paidAmount: U256::from(paid_amount),
        };
        Ok(ContractCall {
            to: self.invoice_registry()?,
            data: call.abi_encode(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::sol_types::SolEvent;
    use paystream_core::constants::ERC20_TRANSFER_SELECTOR;

    fn registry() -> RegistryClient {
        let config = RpcConfig::new("http://127.0.0.1:8545").registries(
            EthAddress::from_array([0x01; 20]),
            EthAddress::from_array([0x02; 20]),
        );
        let client = Arc::new(JsonRpcClient::new(&config).unwrap());
        RegistryClient::new(client, &config)
    }

    #[test]
    fn test_event_and_selectors() {
        assert_eq!(
            hex::encode(IERC5564Announcer::Announcement::SIGNATURE_HASH),
            "5f0eab8057630ba7676c49b4f21a0231414e79474595be8e4c432fbf6bf0f4e7"
        );
        assert_eq!(abi::IERC20::transferCall::SELECTOR, ERC20_TRANSFER_SELECTOR);
    }

    #[test]
    fn test_erc20_transfer_data() {
        let data = erc20_transfer_data(&EthAddress::from_array([0xaa; 20]), 1_000_000);
        assert_eq!(data.len(), 4 + 32 + 32);
        assert_eq!(&data[..4], &ERC20_TRANSFER_SELECTOR);
        assert_eq!(&data[16..36], &[0xaa; 20]);
        assert_eq!(&data[64..68], &1_000_000u32.to_be_bytes());
    }

    #[test]
    fn test_invoice_status_codes() {
        assert_eq!(InvoiceStatus::from(0), InvoiceStatus::Pending);
        assert_eq!(InvoiceStatus::from(1), InvoiceStatus::Paid);
        assert_eq!(InvoiceStatus::from(7), InvoiceStatus::Unknown(7));
    }

    #[test]
    fn test_invoice_conversion() {
        let raw = IInvoiceRegistry::Invoice {
            id: U256::from(4),
            merchantId: U256::from(1),
            token: Address::repeat_byte(0x3c),
            amount: U256::from(25_000_000u64),
            expiry: U256::from(1_700_003_600u64),
            status: 0,
            encryptedDetailsPointer: "ipfs://details".into(),
            createdAt: U256::from(1_700_000_000u64),
            payer: Address::ZERO,
            paidAmount: U256::ZERO,
            paymentTxHash: FixedBytes::ZERO,
        };
        let invoice = Invoice::try_from(raw).unwrap();
        assert_eq!(invoice.id, 4);
        assert_eq!(invoice.amount, 25_000_000);
        assert!(invoice.payer.is_none());
        assert!(invoice.payment_tx_hash.is_none());
        assert!(!invoice.is_paid());
        assert!(invoice.is_expired(1_700_003_601));
        assert!(!invoice.is_expired(1_700_003_600));
    }

    #[test]
    fn test_builders_target_configured_contracts() {
        let registry = registry();
        let meta = test_meta_address();

        let register = registry
            .register_merchant("acme", EthAddress::from_array([0x09; 20]), &meta)
            .unwrap();
        assert_eq!(register.to, EthAddress::from_array([0x01; 20]));
        assert_eq!(&register.data[..4], &IMerchantRegistry::registerMerchantCall::SELECTOR);
        let decoded =
            IMerchantRegistry::registerMerchantCall::abi_decode(&register.data, true).unwrap();
        assert_eq!(decoded.username, "acme");
        assert_eq!(decoded.stealthMetaAddress.len(), 129);

        let invoice = registry
            .create_invoice(1, EthAddress::from_array([0x3c; 20]), 5, 10, "ptr")
            .unwrap();
        assert_eq!(invoice.to, EthAddress::from_array([0x02; 20]));

        let paid = registry
            .mark_paid(1, TxHash::from_array([0x77; 32]), EthAddress::from_array([0x05; 20]), 5)
            .unwrap();
        let decoded = IInvoiceRegistry::markPaidCall::abi_decode(&paid.data, true).unwrap();
        assert_eq!(decoded.paymentTxHash.0, [0x77; 32]);

        assert!(registry.create_invoice(1, EthAddress::zero(), 0, 10, "ptr").is_err());
        assert!(registry
            .register_merchant("  ", EthAddress::from_array([0x09; 20]), &meta)
            .is_err());
        assert!(registry.update_merchant(EthAddress::zero(), &meta).is_err());
    }

    #[test]
    fn test_unconfigured_registry() {
        let config = RpcConfig::new("http://127.0.0.1:8545");
        let client = Arc::new(JsonRpcClient::new(&config).unwrap());
        let registry = RegistryClient::new(client, &config);
        let err = registry
            .mark_paid(1, TxHash::default(), EthAddress::zero(), 1)
            .unwrap_err();
        assert!(matches!(err, PaystreamError::ConfigError(_)));
    }

    fn test_meta_address() -> MetaAddress {
        let mut signature = [0x11u8; 65];
        signature[64] = 27;
        paystream_crypto::derive_keys(&signature, "stealth-keys")
            .unwrap()
            .meta_address()
    }
}
