//! Shared wiremock fixtures for the JSON-RPC tests.

#![allow(dead_code)]

use alloy::primitives::{Address, Bytes, B256, U256};
use alloy::sol_types::SolEvent;
use serde_json::{json, Value};
use wiremock::matchers::{body_partial_json, method as http_method};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

use paystream_core::types::{Announcement, DerivedKeys, EthAddress};
use paystream_rpc::contracts::abi::IERC5564Announcer;
use paystream_rpc::RpcConfig;

pub const ANNOUNCER: EthAddress = EthAddress::from_array([0x55; 20]);

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn config(server: &MockServer) -> RpcConfig {
    RpcConfig::new(server.uri())
        .announcer(ANNOUNCER)
        .timeout_seconds(5)
}

pub fn keys(seed: u8) -> DerivedKeys {
    let mut signature = [seed; 65];
    signature[64] = 27;
    paystream_crypto::derive_keys(&signature, "stealth-keys").unwrap()
}

pub fn rpc_result(result: Value) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({ "jsonrpc": "2.0", "id": 1, "result": result }))
}

pub fn rpc_error(code: i64, message: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "jsonrpc": "2.0",
        "id": 1,
        "error": { "code": code, "message": message }
    }))
}

/// Answers every call to `rpc_method` with `response`.
pub async fn mount(server: &MockServer, rpc_method: &str, response: impl Respond + 'static) {
    Mock::given(http_method("POST"))
        .and(body_partial_json(json!({ "method": rpc_method })))
        .respond_with(response)
        .mount(server)
        .await;
}

/// Bodies of every request received for `rpc_method`.
pub async fn requests_for(server: &MockServer, rpc_method: &str) -> Vec<Value> {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .map(|r: &Request| serde_json::from_slice::<Value>(&r.body).unwrap())
        .filter(|body| body["method"] == rpc_method)
        .collect()
}

fn hex0x(bytes: &[u8]) -> String {
    format!("0x{}", hex::encode(bytes))
}

/// The `eth_getLogs` JSON a node would return for `announcement`.
pub fn log_json(emitter: EthAddress, announcement: &Announcement) -> Value {
    let event = IERC5564Announcer::Announcement {
        schemeId: U256::from(announcement.scheme_id),
        stealthAddress: Address::from(announcement.stealth_address.to_array()),
        caller: Address::from(announcement.caller.to_array()),
        ephemeralPubKey: Bytes::copy_from_slice(&announcement.ephemeral_pub_key),
        metadata: Bytes::copy_from_slice(&announcement.metadata),
    };
    let topics: Vec<String> = [
        IERC5564Announcer::Announcement::SIGNATURE_HASH,
        B256::from(U256::from(announcement.scheme_id).to_be_bytes::<32>()),
        Address::from(announcement.stealth_address.to_array()).into_word(),
        Address::from(announcement.caller.to_array()).into_word(),
    ]
    .iter()
    .map(|t| hex0x(t.as_slice()))
    .collect();

    json!({
        "address": hex0x(emitter.as_bytes()),
        "topics": topics,
        "data": hex0x(&event.encode_data()),
        "blockNumber": format!("{:#x}", announcement.block_number),
        "transactionHash": hex0x(announcement.transaction_hash.as_bytes()),
        "transactionIndex": "0x0",
        "blockHash": hex0x(&[0x99; 32]),
        "logIndex": format!("{:#x}", announcement.log_index),
        "removed": false
    })
}
