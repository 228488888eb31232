//! `RegistryClient` reads against a mock node.

mod common;

use std::sync::Arc;

use alloy::primitives::{Address, Bytes, FixedBytes, U256};
use alloy::sol_types::SolCall;
use serde_json::json;
use wiremock::MockServer;

use paystream_core::error::PaystreamError;
use paystream_core::types::{EthAddress, TxHash};
use paystream_rpc::contracts::abi::{IInvoiceRegistry, IMerchantRegistry};
use paystream_rpc::{InvoiceStatus, JsonRpcClient, RegistryClient};

use common::*;

const MERCHANTS: EthAddress = EthAddress::from_array([0x0a; 20]);
const INVOICES: EthAddress = EthAddress::from_array([0x0b; 20]);

fn registry(server: &MockServer) -> RegistryClient {
    init_tracing();
    let config = config(server).registries(MERCHANTS, INVOICES);
    RegistryClient::new(Arc::new(JsonRpcClient::new(&config).unwrap()), &config)
}

fn hex_result(data: Vec<u8>) -> wiremock::ResponseTemplate {
    rpc_result(json!(format!("0x{}", hex::encode(data))))
}

#[tokio::test]
async fn test_resolve_parses_meta_address() {
    let server = MockServer::start().await;
    let meta = keys(0x31).meta_address();
    let payout = Address::repeat_byte(0x09);
    mount(
        &server,
        "eth_call",
        hex_result(IMerchantRegistry::resolveCall::abi_encode_returns(&(
            U256::from(7),
            payout,
            Bytes::copy_from_slice(&meta.to_bytes()),
        ))),
    )
    .await;

    let merchant = registry(&server).resolve(" acme ").await.unwrap().unwrap();
    assert_eq!(merchant.merchant_id, 7);
    assert_eq!(merchant.payout_address, EthAddress::from_array([0x09; 20]));
    assert_eq!(merchant.meta_address, meta);

    let calls = requests_for(&server, "eth_call").await;
    assert_eq!(
        calls[0]["params"][0]["to"],
        "0x0a0a0a0a0a0a0a0a0a0a0a0a0a0a0a0a0a0a0a0a"
    );
    let data = hex::decode(
        calls[0]["params"][0]["data"]
            .as_str()
            .unwrap()
            .trim_start_matches("0x"),
    )
    .unwrap();
    let decoded = IMerchantRegistry::resolveCall::abi_decode(&data, true).unwrap();
    assert_eq!(decoded.username, "acme");
}

#[tokio::test]
async fn test_resolve_unknown_username() {
    let server = MockServer::start().await;
    mount(
        &server,
        "eth_call",
        hex_result(IMerchantRegistry::resolveCall::abi_encode_returns(&(
            U256::ZERO,
            Address::ZERO,
            Bytes::new(),
        ))),
    )
    .await;
    assert!(registry(&server).resolve("nobody").await.unwrap().is_none());

    let reverting = MockServer::start().await;
    mount(&reverting, "eth_call", rpc_error(3, "execution reverted: Not found")).await;
    assert!(registry(&reverting).resolve("nobody").await.unwrap().is_none());
}

#[tokio::test]
async fn test_resolve_rejects_malformed_meta_address() {
    let server = MockServer::start().await;
    mount(
        &server,
        "eth_call",
        hex_result(IMerchantRegistry::resolveCall::abi_encode_returns(&(
            U256::from(1),
            Address::repeat_byte(0x09),
            Bytes::from(vec![0x04; 64]),
        ))),
    )
    .await;

    let err = registry(&server).resolve("acme").await.unwrap_err();
    assert!(matches!(err, PaystreamError::InvalidMetaAddress(_)));
}

#[tokio::test]
async fn test_username_availability() {
    let server = MockServer::start().await;
    mount(
        &server,
        "eth_call",
        hex_result(IMerchantRegistry::isUsernameAvailableCall::abi_encode_returns(&(true,))),
    )
    .await;

    assert!(registry(&server).is_username_available("fresh").await.unwrap());
    assert!(matches!(
        registry(&server).is_username_available("").await,
        Err(PaystreamError::ValidationError(_))
    ));
}

#[tokio::test]
async fn test_get_paid_invoice() {
    let server = MockServer::start().await;
    let invoice = IInvoiceRegistry::Invoice {
        id: U256::from(12),
        merchantId: U256::from(7),
        token: Address::repeat_byte(0x3c),
        amount: U256::from(25_000_000u64),
        expiry: U256::from(1_700_003_600u64),
        status: 1,
        encryptedDetailsPointer: "ipfs://bafy".into(),
        createdAt: U256::from(1_700_000_000u64),
        payer: Address::repeat_byte(0x44),
        paidAmount: U256::from(25_000_000u64),
        paymentTxHash: FixedBytes::repeat_byte(0x77),
    };
    mount(
        &server,
        "eth_call",
        hex_result(IInvoiceRegistry::getInvoiceCall::abi_encode_returns(&(invoice,))),
    )
    .await;

    let invoice = registry(&server).invoice(12).await.unwrap();
    assert_eq!(invoice.id, 12);
    assert_eq!(invoice.merchant_id, 7);
    assert_eq!(invoice.status, InvoiceStatus::Paid);
    assert!(invoice.is_paid());
    assert!(!invoice.is_expired(u64::MAX));
    assert_eq!(invoice.payer, Some(EthAddress::from_array([0x44; 20])));
    assert_eq!(invoice.payment_tx_hash, Some(TxHash::from_array([0x77; 32])));
    assert_eq!(invoice.encrypted_details_pointer, "ipfs://bafy");

    let calls = requests_for(&server, "eth_call").await;
    assert_eq!(
        calls[0]["params"][0]["to"],
        "0x0b0b0b0b0b0b0b0b0b0b0b0b0b0b0b0b0b0b0b0b"
    );
}

#[tokio::test]
async fn test_merchant_invoices() {
    let server = MockServer::start().await;
    mount(
        &server,
        "eth_call",
        hex_result(IInvoiceRegistry::getMerchantInvoicesCall::abi_encode_returns(&(vec![
            U256::from(1),
            U256::from(4),
        ],))),
    )
    .await;

    assert_eq!(registry(&server).merchant_invoices(7).await.unwrap(), vec![1, 4]);
}
